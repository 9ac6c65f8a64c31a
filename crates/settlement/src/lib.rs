//! Settlement services for the marketplace.
//!
//! This crate orchestrates the domain rules over a [`store::MarketplaceStore`]:
//! 1. Cart maintenance and checkout into per-store orders
//! 2. Fee policy over the site configuration
//! 3. The order status machine with its stock and ledger side effects
//! 4. Online payment through an external gateway, with signed callbacks
//!
//! Every mutation runs inside one unit of work, so a failure at any step
//! leaves storage untouched.

pub mod cart;
pub mod checkout;
pub mod error;
pub mod fee_policy;
pub mod gateway;
pub mod ledger;
pub mod lifecycle;
pub mod payments;
pub mod webhook;

pub use cart::CartService;
pub use checkout::CheckoutService;
pub use error::{Result, SettlementError};
pub use fee_policy::FeePolicy;
pub use gateway::{
    CheckoutSession, GatewayError, HttpGatewayConfig, HttpPaymentGateway, InMemoryPaymentGateway,
    PaymentGateway, SessionRequest, SessionStatus,
};
pub use ledger::TransactionLedger;
pub use lifecycle::OrderLifecycle;
pub use payments::{
    CallbackOutcome, CreatedSession, PaymentService, PaymentSettings, Reconciliation,
};
pub use webhook::{SignatureError, WebhookEvent, WebhookVerifier};
