//! Route handlers, grouped by resource.

pub mod admin;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod transactions;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path segment into a typed identifier.
pub(crate) fn parse_id<T: FromStr>(what: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} id: {raw}")))
}
