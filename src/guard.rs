//! Access rules for commands.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every command declares an [`Access`] level and runs [`check`] against the
//! current session before doing anything else, so all of them reject and
//! redirect the same way.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use crate::services::ServiceError;
use crate::state::session::Session;

pub const LOGIN_ROUTE: &str = "/login";
pub const HOME_ROUTE: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    DriverOnly,
}

/// Reject `session` if it does not meet `access`.
///
/// # Errors
///
/// [`ServiceError::NotAuthenticated`] without a token,
/// [`ServiceError::DriverOnly`] for a non-driver on a driver-only command.
pub fn check(access: Access, session: &Session) -> Result<(), ServiceError> {
    match access {
        Access::Public => Ok(()),
        Access::Authenticated if !session.is_authenticated() => Err(ServiceError::NotAuthenticated),
        Access::Authenticated => Ok(()),
        Access::DriverOnly if !session.is_authenticated() => Err(ServiceError::NotAuthenticated),
        Access::DriverOnly if !session.is_driver() => Err(ServiceError::DriverOnly),
        Access::DriverOnly => Ok(()),
    }
}

/// Where a rejected user is sent: the login page when logged out, home
/// otherwise.
#[must_use]
pub fn redirect_for(error: &ServiceError) -> Option<&'static str> {
    match error {
        ServiceError::NotAuthenticated => Some(LOGIN_ROUTE),
        ServiceError::DriverOnly => Some(HOME_ROUTE),
        _ if error.is_session_expired() => Some(LOGIN_ROUTE),
        _ => None,
    }
}
