//! Account registration and profile sync.

#[cfg(test)]
#[path = "users_test.rs"]
mod users_test;

use time::{Date, OffsetDateTime};
use tracing::info;

use super::{ServiceError, require_token};
use crate::net::api::{ApiClient, REGISTER_PATH, UPDATE_USER_PATH};
use crate::net::types::{Role, UserProfile};
use crate::state::auth::AuthStore;
use crate::state::session::{Session, SessionPatch};

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const DEFAULT_SEX: &str = "M";

/// Sign-up form.
#[derive(Clone, Default)]
pub struct Registration {
    pub name: String,
    pub login: String,
    pub password: String,
    pub password_confirmation: String,
    pub photo: String,
    pub sex: Option<String>,
    pub date: Option<String>,
    pub role: Role,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("login", &self.login)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl Registration {
    /// Check the form before anything goes over the wire.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] when the password is shorter than
    /// [`MIN_PASSWORD_CHARS`] or the confirmation does not match.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ServiceError::Validation(format!(
                "password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }
        if self.password != self.password_confirmation {
            return Err(ServiceError::Validation("password confirmation does not match".to_owned()));
        }
        Ok(())
    }

    fn into_profile(self) -> UserProfile {
        UserProfile {
            id: 0,
            name: self.name,
            login: self.login,
            password: self.password,
            photo: self.photo,
            sex: self.sex,
            date: self.date,
            role: self.role,
            rides: Vec::new(),
        }
    }
}

/// Create an account via `POST /usuarios/cadastrar`. Does not log in.
///
/// # Errors
///
/// Validation failures (no request is sent) and API errors.
pub async fn register(api: &ApiClient, registration: Registration) -> Result<UserProfile, ServiceError> {
    registration.validate()?;
    let profile = registration.into_profile();
    let created: UserProfile = api.post_json(REGISTER_PATH, None, &profile).await?;
    info!(user_id = created.id, "account registered");
    Ok(created)
}

/// Full profile body for `PUT /usuarios/atualizar`, with the backend's
/// required fields filled in when the session lacks them.
#[must_use]
pub fn profile_payload(session: &Session, today: Date) -> UserProfile {
    UserProfile {
        id: session.id(),
        name: session.name().to_owned(),
        login: session.login().to_owned(),
        password: String::new(),
        photo: session.photo().to_owned(),
        sex: Some(non_empty(session.sex()).unwrap_or(DEFAULT_SEX).to_owned()),
        date: Some(non_empty(session.date()).map_or_else(|| today.to_string(), ToOwned::to_owned)),
        role: session.role().or(Role::Passenger),
        rides: session.rides().to_vec(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Apply `patch` on the server, then locally.
///
/// # Errors
///
/// [`ServiceError::NotAuthenticated`] without a session; API errors leave the
/// local session untouched.
pub async fn update_profile(api: &ApiClient, store: &AuthStore, patch: &SessionPatch) -> Result<Session, ServiceError> {
    let token = require_token(store).await?;
    let next = store.session().await.merged(patch);
    let payload = profile_payload(&next, OffsetDateTime::now_utc().date());
    api.put_unit(UPDATE_USER_PATH, Some(&token), &payload).await?;
    let session = store.update_profile(patch).await?;
    info!(user_id = session.id(), "profile updated");
    Ok(session)
}
