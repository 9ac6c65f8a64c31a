use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookId, CartItemId, OrderId, StoreId, TransactionId, UserId};
use domain::{
    Book, CartItem, CartLine, Order, OrderStatus, SiteConfig, Transaction, TransactionStatus,
};

use crate::Result;

/// Core trait for marketplace persistence.
///
/// Reads that need no isolation go straight through the store. Everything
/// that mutates state runs inside a [`UnitOfWork`] obtained from
/// [`MarketplaceStore::begin`]. All implementations must be thread-safe.
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    /// Opens a unit of work. Dropping it without committing discards every
    /// change made through it.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    /// Retrieves an order with its items.
    async fn order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Retrieves a customer's orders, newest first.
    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>>;

    /// Retrieves a store's orders, newest first.
    async fn orders_for_store(&self, store_id: StoreId) -> Result<Vec<Order>>;

    /// Retrieves orders carrying a payment session reference.
    async fn orders_for_session(&self, session_id: &str) -> Result<Vec<Order>>;

    /// Retrieves a transaction by id.
    async fn transaction(&self, transaction_id: TransactionId) -> Result<Option<Transaction>>;

    /// Retrieves the transaction paired with an order.
    async fn transaction_for_order(&self, order_id: OrderId) -> Result<Option<Transaction>>;

    /// Retrieves transactions, newest first, optionally restricted to a store.
    async fn transactions(&self, store_id: Option<StoreId>) -> Result<Vec<Transaction>>;

    /// Retrieves a catalog book.
    async fn book(&self, book_id: BookId) -> Result<Option<Book>>;

    /// Retrieves a customer's cart lines in the order they were added.
    async fn cart(&self, customer_id: UserId) -> Result<Vec<CartLine>>;
}

/// An all-or-nothing batch of reads and writes.
///
/// Rows read through the `lock_*` methods stay locked against concurrent
/// units of work until this one commits or is dropped.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Reads a customer's cart lines joined with each book's store.
    async fn cart_lines(&mut self, customer_id: UserId) -> Result<Vec<CartLine>>;

    /// Adds `quantity` of a book to the customer's cart, creating the cart if
    /// needed. An existing line for the book is incremented and its price
    /// snapshot refreshed to the book's current price.
    async fn add_to_cart(
        &mut self,
        customer_id: UserId,
        book: &Book,
        quantity: u32,
    ) -> Result<CartItem>;

    /// Sets the quantity of a cart line; zero removes it.
    ///
    /// Returns false if the line does not belong to the customer's cart.
    async fn set_cart_quantity(
        &mut self,
        customer_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<bool>;

    /// Removes the given lines from the customer's cart, ignoring ids that are
    /// not in it. Returns the number removed.
    async fn remove_cart_items(
        &mut self,
        customer_id: UserId,
        item_ids: &[CartItemId],
    ) -> Result<u64>;

    /// Removes every line from the customer's cart.
    async fn clear_cart(&mut self, customer_id: UserId) -> Result<u64>;

    /// Reads a book and locks its row.
    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>>;

    /// Takes `quantity` units from stock if that many are available.
    ///
    /// Returns false, changing nothing, when stock is insufficient.
    async fn take_stock(&mut self, book_id: BookId, quantity: u32) -> Result<bool>;

    /// Returns `quantity` units to stock.
    async fn restore_stock(&mut self, book_id: BookId, quantity: u32) -> Result<()>;

    /// Persists a new order with its items.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Persists a new transaction.
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<()>;

    /// Reads an order with its items and locks its row.
    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Reads and locks every order carrying a payment session reference.
    async fn lock_orders_for_session(&mut self, session_id: &str) -> Result<Vec<Order>>;

    /// Writes the mutable fields of an order (status, payment status, payment
    /// session) if its persisted status still equals `expected`.
    ///
    /// Returns false, changing nothing, when the status moved underneath.
    async fn update_order(&mut self, order: &Order, expected: OrderStatus) -> Result<bool>;

    /// Sets the status of the transaction paired with an order.
    async fn update_transaction_status(
        &mut self,
        order_id: OrderId,
        status: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Reads the site configuration, creating the default row if absent.
    ///
    /// Plain read; concurrent units of work are not blocked by it.
    async fn site_config(&mut self) -> Result<SiteConfig>;

    /// Reads the site configuration and locks it until commit. Use before
    /// [`UnitOfWork::save_site_config`].
    async fn lock_site_config(&mut self) -> Result<SiteConfig>;

    /// Replaces the site configuration.
    async fn save_site_config(&mut self, config: &SiteConfig) -> Result<()>;

    /// Makes every change of this unit of work durable and visible.
    async fn commit(self: Box<Self>) -> Result<()>;
}
