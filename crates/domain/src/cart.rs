//! Cart lines and checkout selection.

use std::collections::{BTreeMap, HashSet};

use common::{BookId, CartItemId, StoreId};
use serde::{Deserialize, Serialize};

use crate::checkout::CheckoutError;
use crate::money::Money;

/// A line in a customer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub book_id: BookId,
    /// Always greater than zero.
    pub quantity: u32,
    /// Book price captured when the line was (last) added.
    pub unit_price: Money,
}

impl CartItem {
    /// Largest quantity one cart line may hold.
    pub const MAX_QUANTITY: u32 = 10_000;

    /// Returns quantity × unit price.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A cart item joined with the store that sells its book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub item: CartItem,
    pub store_id: StoreId,
}

/// Which cart items a checkout covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartSelection {
    /// Every item currently in the cart.
    All,
    /// Only these items; ids that are not in the cart are ignored.
    Only(Vec<CartItemId>),
}

impl CartSelection {
    /// Builds a selection from the optional id list of a checkout request.
    pub fn from_ids(ids: Option<Vec<CartItemId>>) -> Self {
        match ids {
            Some(ids) => CartSelection::Only(ids),
            None => CartSelection::All,
        }
    }

    /// Narrows the cart down to the selected lines.
    ///
    /// Fails with [`CheckoutError::EmptyCart`] if the cart has no lines and
    /// [`CheckoutError::NoItemsSelected`] if the selection resolves to nothing.
    pub fn apply(&self, cart: Vec<CartLine>) -> Result<Vec<CartLine>, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let selected: Vec<CartLine> = match self {
            CartSelection::All => cart,
            CartSelection::Only(ids) => {
                let wanted: HashSet<&CartItemId> = ids.iter().collect();
                cart.into_iter()
                    .filter(|line| wanted.contains(&line.item.id))
                    .collect()
            }
        };

        if selected.is_empty() {
            return Err(CheckoutError::NoItemsSelected);
        }
        Ok(selected)
    }
}

/// Partitions lines by the store that sells them, ordered by store id.
pub fn group_by_store(lines: Vec<CartLine>) -> BTreeMap<StoreId, Vec<CartLine>> {
    let mut groups: BTreeMap<StoreId, Vec<CartLine>> = BTreeMap::new();
    for line in lines {
        groups.entry(line.store_id).or_default().push(line);
    }
    groups
}
