//! Identifier types shared by every crate of the marketplace backend.

mod types;

pub use types::{BookId, CartItemId, OrderId, StoreId, TransactionId, UserId};
