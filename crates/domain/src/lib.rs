//! Domain layer for the marketplace settlement pipeline.
//!
//! This crate holds the pure rules of settlement:
//! - Money and fee percentage value objects, and the fee split
//! - Cart selection and grouping by store
//! - The order aggregate and its status machine with side-effect planning
//! - The transaction record paired with each order
//!
//! Nothing here performs I/O; persistence lives in `store` and orchestration
//! in `settlement`.

pub mod actor;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod fee;
pub mod money;
pub mod order;
pub mod transaction;

pub use actor::{Actor, OrderAccess};
pub use cart::{CartItem, CartLine, CartSelection, group_by_store};
pub use catalog::{Book, SiteConfig};
pub use checkout::{CheckoutError, CheckoutRequest, ShippingInfo, assemble_store_order};
pub use fee::FeeSplit;
pub use money::{FeePercentage, InvalidPercentage, Money};
pub use order::{
    Order, OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, TransitionPlan,
};
pub use transaction::{Transaction, TransactionStatus};
