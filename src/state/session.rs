//! Session value and its persisted snapshot.
//!
//! A [`Session`] is an immutable value from the outside: fields are read
//! through accessors and every change produces a new value ([`Session::merged`],
//! [`Session::with_role`]) that the store persists before committing.
//! The login password never enters a session; it only lives in
//! [`Credentials`](crate::net::types::Credentials).

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use serde::{Deserialize, Serialize};

use crate::net::types::{LoginResponse, Ride, Role};

/// The currently authenticated (or absent) user identity.
///
/// An empty token means "not logged in", whatever the other fields hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    id: i64,
    name: String,
    login: String,
    role: Role,
    photo: String,
    token: String,
    sex: Option<String>,
    date: Option<String>,
    rides: Vec<Ride>,
}

impl Session {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a session from a login response, falling back to the role the
    /// user picked on the login form when the server did not send one.
    #[must_use]
    pub fn from_login(response: LoginResponse, submitted_role: Role) -> Self {
        Self {
            id: response.id,
            name: response.name,
            login: response.login,
            role: response.role.or(submitted_role),
            photo: response.photo,
            token: response.token,
            sex: response.sex,
            date: response.date,
            rides: response.rides,
        }
    }

    /// Rebuild a session from a persisted snapshot and its token.
    #[must_use]
    pub fn from_snapshot(snapshot: PersistedSnapshot, token: String) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name,
            login: snapshot.login,
            role: snapshot.role,
            photo: snapshot.photo,
            token,
            sex: snapshot.sex,
            date: snapshot.date,
            rides: snapshot.rides,
        }
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn photo(&self) -> &str {
        &self.photo
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn sex(&self) -> Option<&str> {
        self.sex.as_deref()
    }

    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    #[must_use]
    pub fn rides(&self) -> &[Ride] {
        &self.rides
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    #[must_use]
    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }

    #[must_use]
    pub fn is_passenger(&self) -> bool {
        self.role == Role::Passenger
    }

    /// Shallow merge: fields present in `patch` replace ours, the rest stay.
    #[must_use]
    pub fn merged(&self, patch: &SessionPatch) -> Self {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name.clone_from(name);
        }
        if let Some(login) = &patch.login {
            next.login.clone_from(login);
        }
        if let Some(role) = patch.role {
            next.role = role;
        }
        if let Some(photo) = &patch.photo {
            next.photo.clone_from(photo);
        }
        if let Some(sex) = &patch.sex {
            next.sex = Some(sex.clone());
        }
        if let Some(date) = &patch.date {
            next.date = Some(date.clone());
        }
        if let Some(rides) = &patch.rides {
            next.rides.clone_from(rides);
        }
        next
    }

    #[must_use]
    pub fn with_role(&self, role: Role) -> Self {
        Self { role, ..self.clone() }
    }

    /// Everything that gets persisted next to the token.
    #[must_use]
    pub fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            id: self.id,
            name: self.name.clone(),
            login: self.login.clone(),
            role: self.role,
            photo: self.photo.clone(),
            sex: self.sex.clone(),
            date: self.date.clone(),
            rides: self.rides.clone(),
        }
    }
}

/// Partial profile update. `None` leaves the field untouched.
///
/// `id` and `token` are deliberately absent: only login and logout change them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionPatch {
    pub name: Option<String>,
    pub login: Option<String>,
    pub role: Option<Role>,
    pub photo: Option<String>,
    pub sex: Option<String>,
    pub date: Option<String>,
    pub rides: Option<Vec<Ride>>,
}

impl SessionPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// JSON stored under the `usuario` key. Never contains the password or the
/// token (the token has its own key).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSnapshot {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "usuario")]
    pub login: String,
    #[serde(rename = "tipoUsuario")]
    pub role: Role,
    #[serde(rename = "foto")]
    pub photo: String,
    #[serde(rename = "sexo", skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "produto")]
    pub rides: Vec<Ride>,
}
