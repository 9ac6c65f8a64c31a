use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookId, CartItemId, OrderId, StoreId, TransactionId, UserId};
use domain::{
    Book, CartItem, CartLine, Order, OrderStatus, SiteConfig, Transaction, TransactionStatus,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{MarketplaceStore, UnitOfWork},
};

#[derive(Debug, Clone, Default)]
struct MarketState {
    books: HashMap<BookId, Book>,
    carts: HashMap<UserId, Vec<CartItem>>,
    /// Insertion order; listings walk it backwards for newest first.
    orders: Vec<Order>,
    transactions: Vec<Transaction>,
    site_config: Option<SiteConfig>,
}

impl MarketState {
    fn cart_lines(&self, customer_id: UserId) -> Vec<CartLine> {
        self.carts
            .get(&customer_id)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        self.books.get(&item.book_id).map(|book| CartLine {
                            item: item.clone(),
                            store_id: book.store_id,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn order_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == order_id)
    }
}

/// In-memory marketplace store for testing and local runs.
///
/// Units of work hold one store-wide lock and operate on a private copy of the
/// state that replaces the shared state on commit, so they are fully
/// serialised and all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketplaceStore {
    state: Arc<Mutex<MarketState>>,
}

impl InMemoryMarketplaceStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog book.
    pub async fn insert_book(&self, book: Book) {
        self.state.lock().await.books.insert(book.id, book);
    }

    /// Deletes a catalog book, dropping it from every cart.
    ///
    /// Fails if an order item references the book.
    pub async fn remove_book(&self, book_id: BookId) -> Result<bool> {
        let mut state = self.state.lock().await;
        let referenced = state
            .orders
            .iter()
            .any(|o| o.items.iter().any(|i| i.book_id == book_id));
        if referenced {
            return Err(StoreError::BookReferenced(book_id));
        }
        for items in state.carts.values_mut() {
            items.retain(|item| item.book_id != book_id);
        }
        Ok(state.books.remove(&book_id).is_some())
    }

    /// Returns the current stock of a book.
    pub async fn stock_of(&self, book_id: BookId) -> Option<u32> {
        self.state
            .lock()
            .await
            .books
            .get(&book_id)
            .map(|b| b.stock_quantity)
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the total number of transactions stored.
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }
}

#[async_trait]
impl MarketplaceStore for InMemoryMarketplaceStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, working }))
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| o.id == order_id).cloned())
    }

    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn orders_for_store(&self, store_id: StoreId) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| o.store_id == store_id)
            .cloned()
            .collect())
    }

    async fn orders_for_session(&self, session_id: &str) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.payment_session.as_deref() == Some(session_id))
            .cloned()
            .collect())
    }

    async fn transaction(&self, transaction_id: TransactionId) -> Result<Option<Transaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .find(|t| t.id == transaction_id)
            .cloned())
    }

    async fn transaction_for_order(&self, order_id: OrderId) -> Result<Option<Transaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .find(|t| t.order_id == order_id)
            .cloned())
    }

    async fn transactions(&self, store_id: Option<StoreId>) -> Result<Vec<Transaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| store_id.is_none_or(|s| t.store_id == s))
            .cloned()
            .collect())
    }

    async fn book(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.state.lock().await.books.get(&book_id).cloned())
    }

    async fn cart(&self, customer_id: UserId) -> Result<Vec<CartLine>> {
        Ok(self.state.lock().await.cart_lines(customer_id))
    }
}

struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<MarketState>,
    working: MarketState,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn cart_lines(&mut self, customer_id: UserId) -> Result<Vec<CartLine>> {
        Ok(self.working.cart_lines(customer_id))
    }

    async fn add_to_cart(
        &mut self,
        customer_id: UserId,
        book: &Book,
        quantity: u32,
    ) -> Result<CartItem> {
        let cart = self.working.carts.entry(customer_id).or_default();

        if let Some(item) = cart.iter_mut().find(|i| i.book_id == book.id) {
            item.quantity = item
                .quantity
                .checked_add(quantity)
                .ok_or(StoreError::QuantityOutOfRange(book.id))?;
            item.unit_price = book.price;
            return Ok(item.clone());
        }

        let item = CartItem {
            id: CartItemId::new(),
            book_id: book.id,
            quantity,
            unit_price: book.price,
        };
        cart.push(item.clone());
        Ok(item)
    }

    async fn set_cart_quantity(
        &mut self,
        customer_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<bool> {
        let Some(cart) = self.working.carts.get_mut(&customer_id) else {
            return Ok(false);
        };
        let Some(position) = cart.iter().position(|i| i.id == item_id) else {
            return Ok(false);
        };

        if quantity == 0 {
            cart.remove(position);
        } else {
            cart[position].quantity = quantity;
        }
        Ok(true)
    }

    async fn remove_cart_items(
        &mut self,
        customer_id: UserId,
        item_ids: &[CartItemId],
    ) -> Result<u64> {
        let Some(cart) = self.working.carts.get_mut(&customer_id) else {
            return Ok(0);
        };
        let before = cart.len();
        cart.retain(|item| !item_ids.contains(&item.id));
        Ok((before - cart.len()) as u64)
    }

    async fn clear_cart(&mut self, customer_id: UserId) -> Result<u64> {
        Ok(self
            .working
            .carts
            .get_mut(&customer_id)
            .map(|cart| cart.drain(..).count() as u64)
            .unwrap_or(0))
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.working.books.get(&book_id).cloned())
    }

    async fn take_stock(&mut self, book_id: BookId, quantity: u32) -> Result<bool> {
        match self.working.books.get_mut(&book_id) {
            Some(book) if book.has_stock_for(quantity) => {
                book.stock_quantity -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_stock(&mut self, book_id: BookId, quantity: u32) -> Result<()> {
        let book = self
            .working
            .books
            .get_mut(&book_id)
            .ok_or_else(|| StoreError::corrupt("books", format!("book {book_id} is missing")))?;
        book.stock_quantity += quantity;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.working.orders.push(order.clone());
        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        self.working.transactions.push(transaction.clone());
        Ok(())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.order_mut(order_id).map(|o| o.clone()))
    }

    async fn lock_orders_for_session(&mut self, session_id: &str) -> Result<Vec<Order>> {
        Ok(self
            .working
            .orders
            .iter()
            .filter(|o| o.payment_session.as_deref() == Some(session_id))
            .cloned()
            .collect())
    }

    async fn update_order(&mut self, order: &Order, expected: OrderStatus) -> Result<bool> {
        match self.working.order_mut(order.id) {
            Some(stored) if stored.status == expected => {
                stored.status = order.status;
                stored.payment_status = order.payment_status;
                stored.payment_session = order.payment_session.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_transaction_status(
        &mut self,
        order_id: OrderId,
        status: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let transaction = self
            .working
            .transactions
            .iter_mut()
            .find(|t| t.order_id == order_id)
            .ok_or_else(|| {
                StoreError::corrupt("transactions", format!("order {order_id} has no transaction"))
            })?;
        transaction.status = status;
        transaction.updated_at = now;
        Ok(())
    }

    async fn site_config(&mut self) -> Result<SiteConfig> {
        Ok(*self
            .working
            .site_config
            .get_or_insert_with(|| SiteConfig::initial(Utc::now())))
    }

    async fn lock_site_config(&mut self) -> Result<SiteConfig> {
        self.site_config().await
    }

    async fn save_site_config(&mut self, config: &SiteConfig) -> Result<()> {
        self.working.site_config = Some(*config);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
