//! Financial transaction paired 1:1 with each order.

use chrono::{DateTime, Utc};
use common::{OrderId, StoreId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::fee::FeeSplit;
use crate::money::Money;
use crate::order::{Order, OrderError, PaymentMethod};

/// Settlement state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "refunded" => Ok(TransactionStatus::Refunded),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// Gross amount of an order with its fee split, owned by the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub amount: Money,
    pub admin_fee: Money,
    pub store_earnings: Money,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates the pending transaction for a freshly placed order.
    pub fn for_order(order: &Order, split: FeeSplit, now: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId::new(),
            order_id: order.id,
            store_id: order.store_id,
            amount: split.amount,
            admin_fee: split.admin_fee,
            store_earnings: split.store_earnings,
            payment_method: order.payment_method,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the fee split recorded on this transaction.
    pub fn split(&self) -> FeeSplit {
        FeeSplit {
            amount: self.amount,
            admin_fee: self.admin_fee,
            store_earnings: self.store_earnings,
        }
    }
}
