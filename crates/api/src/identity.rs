//! Acting-user extraction from authenticator headers.
//!
//! Authentication happens upstream. The authenticator forwards who the caller
//! is in three headers, which are trusted as-is.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{StoreId, UserId};
use domain::Actor;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const STORE_ID_HEADER: &str = "x-store-id";
pub const STAFF_HEADER: &str = "x-staff";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub Actor);

impl Identity {
    fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let user_id: UserId = header(headers, USER_ID_HEADER)?
            .ok_or_else(|| ApiError::Unauthenticated(format!("missing {USER_ID_HEADER} header")))?
            .parse()
            .map_err(|_| ApiError::Unauthenticated(format!("malformed {USER_ID_HEADER} header")))?;

        let store_id = header(headers, STORE_ID_HEADER)?
            .map(|raw| raw.parse::<StoreId>())
            .transpose()
            .map_err(|_| ApiError::BadRequest(format!("malformed {STORE_ID_HEADER} header")))?;

        let is_staff = header(headers, STAFF_HEADER)?
            .is_some_and(|raw| raw.eq_ignore_ascii_case("true"));

        Ok(Identity(Actor {
            user_id,
            store_id,
            is_staff,
        }))
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| ApiError::BadRequest(format!("non-ASCII {name} header")))
        })
        .transpose()
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Identity::from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_customer_identity() {
        let user = UserId::new();
        let Identity(actor) =
            Identity::from_headers(&headers(&[(USER_ID_HEADER, &user.to_string())])).unwrap();

        assert_eq!(actor, Actor::customer(user));
    }

    #[test]
    fn test_vendor_and_staff_flags() {
        let user = UserId::new();
        let store = StoreId::new();
        let Identity(actor) = Identity::from_headers(&headers(&[
            (USER_ID_HEADER, &user.to_string()),
            (STORE_ID_HEADER, &store.to_string()),
            (STAFF_HEADER, "TRUE"),
        ]))
        .unwrap();

        assert_eq!(actor.store_id, Some(store));
        assert!(actor.is_staff);
    }

    #[test]
    fn test_missing_or_malformed_user_is_unauthenticated() {
        assert!(matches!(
            Identity::from_headers(&HeaderMap::new()),
            Err(ApiError::Unauthenticated(_))
        ));
        assert!(matches!(
            Identity::from_headers(&headers(&[(USER_ID_HEADER, "bob")])),
            Err(ApiError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_malformed_store_is_bad_request() {
        let result = Identity::from_headers(&headers(&[
            (USER_ID_HEADER, &UserId::new().to_string()),
            (STORE_ID_HEADER, "store-7"),
        ]));
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
