//! Checkout inputs, validation and per-store order assembly.

use chrono::{DateTime, Utc};
use common::{CartItemId, StoreId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::CartLine;
use crate::fee::FeeSplit;
use crate::money::FeePercentage;
use crate::order::{Order, OrderItem, PaymentMethod};
use crate::transaction::Transaction;

/// Errors raised while turning a cart into orders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// The customer's cart has no items at all.
    #[error("Cart is empty")]
    EmptyCart,

    /// The requested subset of cart items resolved to nothing.
    #[error("No valid items selected")]
    NoItemsSelected,

    /// Address or phone is missing.
    #[error("Address and phone are required")]
    MissingShippingInfo,

    /// Every selected item lacks sufficient stock.
    #[error("All selected items are out of stock")]
    AllItemsOutOfStock,
}

/// Where an order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub address: String,
    pub phone: String,
}

impl ShippingInfo {
    /// Validates that both fields are present and non-blank.
    pub fn new(
        address: Option<impl AsRef<str>>,
        phone: Option<impl AsRef<str>>,
    ) -> Result<Self, CheckoutError> {
        let address = address
            .map(|a| a.as_ref().trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or(CheckoutError::MissingShippingInfo)?;
        let phone = phone
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or(CheckoutError::MissingShippingInfo)?;
        Ok(Self { address, phone })
    }
}

/// A customer's request to check out their cart.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: UserId,
    /// `None` means the whole cart.
    pub cart_item_ids: Option<Vec<CartItemId>>,
    pub payment_method: PaymentMethod,
    /// Validated into [`ShippingInfo`] once the cart selection is known.
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl CheckoutRequest {
    /// Validates the delivery fields of the request.
    pub fn shipping(&self) -> Result<ShippingInfo, CheckoutError> {
        ShippingInfo::new(self.address.as_deref(), self.phone.as_deref())
    }
}

/// Assembles one store's order and its paired transaction from the lines that
/// survived the stock check.
///
/// Prices come from the cart snapshot, never from the live catalog.
pub fn assemble_store_order(
    customer_id: UserId,
    store_id: StoreId,
    lines: &[CartLine],
    payment_method: PaymentMethod,
    shipping: &ShippingInfo,
    fee: FeePercentage,
    now: DateTime<Utc>,
) -> (Order, Transaction) {
    let items: Vec<OrderItem> = lines
        .iter()
        .map(|line| OrderItem {
            book_id: line.item.book_id,
            quantity: line.item.quantity,
            unit_price: line.item.unit_price,
        })
        .collect();

    let order = Order::place(
        customer_id,
        store_id,
        items,
        payment_method,
        shipping.clone(),
        now,
    );
    let split = FeeSplit::compute(order.total_price, fee);
    let transaction = Transaction::for_order(&order, split, now);

    (order, transaction)
}
