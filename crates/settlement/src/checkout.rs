//! Turns a customer's cart into per-store orders.

use std::time::Instant;

use chrono::Utc;
use common::{BookId, CartItemId};
use domain::{
    CartSelection, CheckoutError, CheckoutRequest, Order, assemble_store_order, group_by_store,
};
use store::MarketplaceStore;

use crate::error::Result;

/// Checkout orchestration.
///
/// One checkout is one unit of work: every book touched is locked, stock is
/// taken conditionally, and all orders, transactions and cart deletions
/// commit together or not at all.
#[derive(Clone)]
pub struct CheckoutService<S: MarketplaceStore> {
    store: S,
}

impl<S: MarketplaceStore> CheckoutService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places one order per store for the selected, in-stock cart lines.
    ///
    /// Lines whose book cannot cover the requested quantity are left in the
    /// cart. Orders are returned sorted by store id.
    #[tracing::instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id, payment_method = %request.payment_method)
    )]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<Vec<Order>> {
        metrics::counter!("checkouts_total").increment(1);
        let started = Instant::now();

        let selection = CartSelection::from_ids(request.cart_item_ids.clone());

        let mut uow = self.store.begin().await?;
        let cart = uow.cart_lines(request.customer_id).await?;
        let selected = selection.apply(cart)?;
        let shipping = request.shipping()?;
        let fee = uow.site_config().await?.admin_fee_percentage;

        // Lock in a fixed order so overlapping checkouts cannot deadlock.
        let mut book_ids: Vec<BookId> = selected.iter().map(|l| l.item.book_id).collect();
        book_ids.sort();
        book_ids.dedup();
        for book_id in &book_ids {
            uow.lock_book(*book_id).await?;
        }

        let mut surviving = Vec::with_capacity(selected.len());
        let mut dropped = 0u64;
        for line in selected {
            if uow.take_stock(line.item.book_id, line.item.quantity).await? {
                surviving.push(line);
            } else {
                tracing::debug!(
                    book_id = %line.item.book_id,
                    "Insufficient stock, item left in cart"
                );
                dropped += 1;
            }
        }
        if dropped > 0 {
            metrics::counter!("items_dropped_out_of_stock_total").increment(dropped);
        }
        if surviving.is_empty() {
            return Err(CheckoutError::AllItemsOutOfStock.into());
        }

        let now = Utc::now();
        let mut orders = Vec::new();
        let mut ordered_items: Vec<CartItemId> = Vec::with_capacity(surviving.len());

        for (store_id, lines) in group_by_store(surviving) {
            let (order, transaction) = assemble_store_order(
                request.customer_id,
                store_id,
                &lines,
                request.payment_method,
                &shipping,
                fee,
                now,
            );
            uow.insert_order(&order).await?;
            uow.insert_transaction(&transaction).await?;

            ordered_items.extend(lines.iter().map(|l| l.item.id));
            orders.push(order);
        }

        uow.remove_cart_items(request.customer_id, &ordered_items)
            .await?;
        uow.commit().await?;

        metrics::counter!("orders_created_total").increment(orders.len() as u64);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            order_count = orders.len(),
            dropped_items = dropped,
            "Checkout completed"
        );

        Ok(orders)
    }
}
