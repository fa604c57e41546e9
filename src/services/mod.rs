//! Domain operations on top of the REST client and the session store.
//!
//! Each submodule is a thin layer: read the token from the [`AuthStore`],
//! shape the payload, call [`ApiClient`](crate::net::api::ApiClient). None of
//! them logs the user out on 401/403; they return
//! [`ServiceError::is_session_expired`] and leave that to the caller.

pub mod driver;
pub mod passenger;
pub mod rides;
pub mod users;
pub mod vehicles;

use crate::net::api::ApiError;
use crate::state::auth::{AuthError, AuthStore};
use crate::state::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("log in first")]
    NotAuthenticated,
    #[error("drivers only")]
    DriverOnly,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    /// True when the server rejected the token (401/403).
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_session_expired())
    }
}

/// Current token, or [`ServiceError::NotAuthenticated`] if there is none.
pub(crate) async fn require_token(store: &AuthStore) -> Result<String, ServiceError> {
    let token = store.token().await;
    if token.is_empty() { Err(ServiceError::NotAuthenticated) } else { Ok(token) }
}
