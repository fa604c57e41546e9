//! REST client for the Velo backend.
//!
//! Every call goes through [`ApiClient::send`], which is the only place that
//! attaches the `Authorization` header ([`authorization_header`]) and maps
//! HTTP status codes onto [`ApiError`].
//!
//! ERROR HANDLING
//! ==============
//! 401 and 403 both surface as [`ApiError::Unauthorized`]. Callers treat that
//! as "session expired" and log the user out; the client itself never touches
//! session state.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{Credentials, LoginResponse, UserProfile};

/// Longest server error body kept in [`ApiError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 200;

pub const LOGIN_PATH: &str = "/usuarios/logar";
pub const REGISTER_PATH: &str = "/usuarios/cadastrar";
pub const UPDATE_USER_PATH: &str = "/usuarios/atualizar";
pub const VEHICLES_PATH: &str = "/categorias";
pub const RIDES_PATH: &str = "/produtos";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("session rejected by server (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// True when the server rejected the bearer token.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

// =============================================================================
// ENDPOINTS
// =============================================================================

#[must_use]
pub fn user_path(user_id: i64) -> String {
    format!("/usuarios/{user_id}")
}

#[must_use]
pub fn vehicle_path(vehicle_id: i64) -> String {
    format!("{VEHICLES_PATH}/{vehicle_id}")
}

#[must_use]
pub fn ride_path(ride_id: i64) -> String {
    format!("{RIDES_PATH}/{ride_id}")
}

#[must_use]
pub fn driver_dashboard_path(driver_id: i64) -> String {
    format!("/motoristas/{driver_id}/dashboard")
}

#[must_use]
pub fn driver_next_trip_path(driver_id: i64) -> String {
    format!("/motoristas/{driver_id}/proxima-viagem")
}

#[must_use]
pub fn driver_status_path(driver_id: i64) -> String {
    format!("/motoristas/{driver_id}/status")
}

#[must_use]
pub fn trip_start_path(trip_id: i64) -> String {
    format!("/viagens/{trip_id}/iniciar")
}

#[must_use]
pub fn trip_cancel_path(trip_id: i64) -> String {
    format!("/viagens/{trip_id}/cancelar")
}

// =============================================================================
// HEADERS AND RESPONSES
// =============================================================================

/// Build the `Authorization` value for a session token.
///
/// Tokens issued by the backend may already carry the `Bearer ` prefix; they
/// are passed through so the prefix never appears twice.
#[must_use]
pub fn authorization_header(token: &str) -> String {
    let token = token.trim();
    let prefixed = token
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "));
    if prefixed {
        token.to_owned()
    } else {
        format!("Bearer {token}")
    }
}

fn check_status(status: u16, body: String) -> Result<String, ApiError> {
    match status {
        200..=299 => Ok(body),
        401 | 403 => Err(ApiError::Unauthorized { status }),
        _ => {
            let body = if body.chars().count() > MAX_ERROR_BODY_CHARS {
                let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
                truncated.push_str("...");
                truncated
            } else {
                body
            };
            Err(ApiError::Status { status, body })
        }
    }
}

/// Decode a JSON body; an empty body decodes as `null`.
fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let body = body.trim();
    let body = if body.is_empty() { "null" } else { body };
    Ok(serde_json::from_str(body)?)
}

// =============================================================================
// CLIENT
// =============================================================================

/// Optional HTTP timeouts; `None` keeps reqwest's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: Option<u64>,
    pub connect_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeouts.request_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = timeouts.connect_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        Ok(Self { http: builder.build()?, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<String, ApiError> {
        let mut request = self.http.request(method.clone(), self.url(path));
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, HeaderValue::from_str(&authorization_header(token))?);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        debug!(%method, path, status, "api request");
        let text = response.text().await?;
        check_status(status, text)
    }

    /// `GET path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses and undecodable bodies.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> Result<T, ApiError> {
        let body = self.send::<()>(Method::GET, path, token, None).await?;
        decode_body(&body)
    }

    /// `POST path` with a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses and undecodable bodies.
    pub async fn post_json<B, T>(&self, path: &str, token: Option<&str>, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(Method::POST, path, token, Some(body)).await?;
        decode_body(&body)
    }

    /// `PUT path` with a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses and undecodable bodies.
    pub async fn put_json<B, T>(&self, path: &str, token: Option<&str>, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(Method::PUT, path, token, Some(body)).await?;
        decode_body(&body)
    }

    /// `PUT path` for endpoints whose response body is irrelevant.
    ///
    /// # Errors
    ///
    /// Transport failures and non-2xx statuses.
    pub async fn put_unit<B: Serialize + ?Sized>(&self, path: &str, token: Option<&str>, body: &B) -> Result<(), ApiError> {
        self.send(Method::PUT, path, token, Some(body)).await?;
        Ok(())
    }

    /// `DELETE path`.
    ///
    /// # Errors
    ///
    /// Transport failures and non-2xx statuses.
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<(), ApiError> {
        self.send::<()>(Method::DELETE, path, token, None).await?;
        Ok(())
    }
}

// =============================================================================
// AUTH SEAM
// =============================================================================

/// The two calls the session store needs. Enables mocking in tests.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a session via `POST /usuarios/logar`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the body is malformed.
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;

    /// Fetch a full profile via `GET /usuarios/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the body is malformed.
    async fn fetch_user(&self, user_id: i64, token: &str) -> Result<UserProfile, ApiError>;
}

#[async_trait::async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        self.post_json(LOGIN_PATH, None, credentials).await
    }

    async fn fetch_user(&self, user_id: i64, token: &str) -> Result<UserProfile, ApiError> {
        self.get_json(&user_path(user_id), Some(token)).await
    }
}
