//! Shared application state.

use std::sync::Arc;

use settlement::{
    CartService, CheckoutService, FeePolicy, OrderLifecycle, PaymentGateway, PaymentService,
    PaymentSettings, TransactionLedger, WebhookVerifier,
};
use store::MarketplaceStore;

/// Services reachable from every handler.
pub struct AppState<S: MarketplaceStore> {
    pub cart: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderLifecycle<S>,
    pub payments: PaymentService<S>,
    pub ledger: TransactionLedger<S>,
    pub fees: FeePolicy<S>,
}

impl<S: MarketplaceStore + Clone> AppState<S> {
    /// Wires every service over one store and one gateway.
    pub fn new(
        store: S,
        gateway: Arc<dyn PaymentGateway>,
        verifier: WebhookVerifier,
        payment: PaymentSettings,
    ) -> Self {
        Self {
            cart: CartService::new(store.clone()),
            checkout: CheckoutService::new(store.clone()),
            orders: OrderLifecycle::new(store.clone()),
            payments: PaymentService::new(store.clone(), gateway, verifier, payment),
            ledger: TransactionLedger::new(store.clone()),
            fees: FeePolicy::new(store),
        }
    }
}
