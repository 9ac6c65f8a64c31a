//! The acting user and the capabilities it holds over an order.

use common::{StoreId, UserId};
use serde::{Deserialize, Serialize};

/// An authenticated caller as resolved by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    /// The store owned by this user, if any.
    pub store_id: Option<StoreId>,
    pub is_staff: bool,
}

impl Actor {
    /// A plain customer without a store.
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            store_id: None,
            is_staff: false,
        }
    }

    /// A store owner acting on behalf of `store_id`.
    pub fn vendor(user_id: UserId, store_id: StoreId) -> Self {
        Self {
            user_id,
            store_id: Some(store_id),
            is_staff: false,
        }
    }

    /// A marketplace administrator.
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            store_id: None,
            is_staff: true,
        }
    }

    /// Returns true if this actor owns `store_id`.
    pub fn owns_store(&self, store_id: StoreId) -> bool {
        self.store_id == Some(store_id)
    }

    /// Resolves the capabilities this actor holds over an order placed by
    /// `customer_id` with `store_id`.
    pub fn access_to(&self, customer_id: UserId, store_id: StoreId) -> OrderAccess {
        OrderAccess {
            customer: self.user_id == customer_id,
            vendor: self.owns_store(store_id),
            admin: self.is_staff,
        }
    }
}

/// Capabilities `{customer-of-order, vendor-of-order, admin}` held over one
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderAccess {
    pub customer: bool,
    pub vendor: bool,
    pub admin: bool,
}

impl OrderAccess {
    /// May read the order.
    pub fn can_view(&self) -> bool {
        self.customer || self.vendor || self.admin
    }

    /// May drive forward transitions (processing, shipped, completed, refunded).
    pub fn can_advance(&self) -> bool {
        self.vendor || self.admin
    }

    /// May cancel the order.
    pub fn can_cancel(&self) -> bool {
        self.customer || self.vendor || self.admin
    }
}
