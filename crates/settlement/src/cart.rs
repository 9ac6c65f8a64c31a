//! Cart maintenance for customers.

use common::{BookId, CartItemId, UserId};
use domain::{CartItem, CartLine};
use store::MarketplaceStore;

use crate::error::{Result, SettlementError};

/// Adds, updates and removes cart lines.
#[derive(Clone)]
pub struct CartService<S: MarketplaceStore> {
    store: S,
}

impl<S: MarketplaceStore> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the customer's cart lines in the order they were added.
    pub async fn cart(&self, customer_id: UserId) -> Result<Vec<CartLine>> {
        Ok(self.store.cart(customer_id).await?)
    }

    /// Returns true if the book is already in the customer's cart.
    pub async fn contains_book(&self, customer_id: UserId, book_id: BookId) -> Result<bool> {
        let lines = self.store.cart(customer_id).await?;
        Ok(lines.iter().any(|line| line.item.book_id == book_id))
    }

    /// Adds a book to the cart. Adding a book already present increases its
    /// quantity and refreshes the captured price.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: UserId,
        book_id: BookId,
        quantity: u32,
    ) -> Result<CartItem> {
        if quantity == 0 {
            return Err(SettlementError::InvalidRequest(
                "quantity must be at least 1".to_string(),
            ));
        }
        check_quantity(quantity)?;

        let mut uow = self.store.begin().await?;
        let book = uow
            .lock_book(book_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Book", book_id))?;
        let existing = uow
            .cart_lines(customer_id)
            .await?
            .iter()
            .find(|line| line.item.book_id == book_id)
            .map_or(0, |line| line.item.quantity);
        check_quantity(existing.saturating_add(quantity))?;
        let item = uow.add_to_cart(customer_id, &book, quantity).await?;
        uow.commit().await?;

        tracing::debug!(cart_item_id = %item.id, quantity = item.quantity, "Cart item saved");
        Ok(item)
    }

    /// Sets a line's quantity; zero removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        customer_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<()> {
        check_quantity(quantity)?;
        let mut uow = self.store.begin().await?;
        if !uow.set_cart_quantity(customer_id, item_id, quantity).await? {
            return Err(SettlementError::not_found("Cart item", item_id));
        }
        uow.commit().await?;
        Ok(())
    }

    /// Removes one line from the cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, customer_id: UserId, item_id: CartItemId) -> Result<()> {
        let mut uow = self.store.begin().await?;
        if uow.remove_cart_items(customer_id, &[item_id]).await? == 0 {
            return Err(SettlementError::not_found("Cart item", item_id));
        }
        uow.commit().await?;
        Ok(())
    }

    /// Empties the cart, returning the number of lines removed.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, customer_id: UserId) -> Result<u64> {
        let mut uow = self.store.begin().await?;
        let removed = uow.clear_cart(customer_id).await?;
        uow.commit().await?;
        Ok(removed)
    }
}

fn check_quantity(quantity: u32) -> Result<()> {
    if quantity > CartItem::MAX_QUANTITY {
        return Err(SettlementError::InvalidRequest(format!(
            "quantity must not exceed {}",
            CartItem::MAX_QUANTITY
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use common::StoreId;
    use domain::{Book, Money};
    use store::InMemoryMarketplaceStore;

    use super::*;

    async fn setup() -> (CartService<InMemoryMarketplaceStore>, Book) {
        let store = InMemoryMarketplaceStore::new();
        let book = Book {
            id: BookId::new(),
            store_id: StoreId::new(),
            title: "Kindred".to_string(),
            price: Money::from_cents(1500),
            stock_quantity: 4,
        };
        store.insert_book(book.clone()).await;
        (CartService::new(store), book)
    }

    #[tokio::test]
    async fn test_add_and_update() {
        let (service, book) = setup().await;
        let customer = UserId::new();

        let item = service.add_item(customer, book.id, 2).await.unwrap();
        assert_eq!(item.unit_price, Money::from_cents(1500));
        assert!(service.contains_book(customer, book.id).await.unwrap());

        service.update_quantity(customer, item.id, 5).await.unwrap();
        assert_eq!(service.cart(customer).await.unwrap()[0].item.quantity, 5);

        service.update_quantity(customer, item.id, 0).await.unwrap();
        assert!(service.cart(customer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_rejects_zero_and_unknown_book() {
        let (service, book) = setup().await;
        let customer = UserId::new();

        let err = service.add_item(customer, book.id, 0).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");

        let err = service
            .add_item(customer, BookId::new(), 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }

    #[tokio::test]
    async fn test_quantity_is_bounded() {
        let (service, book) = setup().await;
        let customer = UserId::new();

        let err = service
            .add_item(customer, book.id, 3_000_000_000)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");

        let item = service
            .add_item(customer, book.id, CartItem::MAX_QUANTITY - 1)
            .await
            .unwrap();
        service.add_item(customer, book.id, 1).await.unwrap();
        let err = service.add_item(customer, book.id, 1).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");
        assert_eq!(
            service.cart(customer).await.unwrap()[0].item.quantity,
            CartItem::MAX_QUANTITY
        );

        let err = service
            .update_quantity(customer, item.id, u32::MAX)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");
    }

    #[tokio::test]
    async fn test_other_customers_lines_are_not_found() {
        let (service, book) = setup().await;
        let owner = UserId::new();
        let item = service.add_item(owner, book.id, 1).await.unwrap();

        let intruder = UserId::new();
        assert_eq!(
            service
                .update_quantity(intruder, item.id, 3)
                .await
                .unwrap_err()
                .kind(),
            "NotFound"
        );
        assert_eq!(
            service.remove_item(intruder, item.id).await.unwrap_err().kind(),
            "NotFound"
        );

        service.remove_item(owner, item.id).await.unwrap();
        assert_eq!(service.clear(owner).await.unwrap(), 0);
    }
}
