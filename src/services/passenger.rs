//! Passenger home screen: recent destinations and the pending ride request.
//!
//! Purely local. The backend has no endpoint for ride requests yet, so the
//! dashboard lives in the key-value store under a per-user key
//! ([`passenger_key`]). Another account on the same machine never sees it.

#[cfg(test)]
#[path = "passenger_test.rs"]
mod passenger_test;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use super::ServiceError;
use crate::state::storage::{KeyValueStore, load_json, save_json};

pub const PASSENGER_KEY_PREFIX: &str = "passageiro";
pub const CURRENT_LOCATION: &str = "Sua localização atual";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "endereco", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A requested ride waiting for a driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRequest {
    #[serde(rename = "motorista", default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(rename = "origem")]
    pub origin: String,
    #[serde(rename = "destino")]
    pub destination: String,
    #[serde(rename = "horario")]
    pub requested_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassengerDashboard {
    #[serde(rename = "destinosRecentes")]
    pub recent: Vec<Destination>,
    #[serde(rename = "proximaViagem", skip_serializing_if = "Option::is_none")]
    pub trip: Option<TripRequest>,
}

/// Storage key of one user's dashboard, e.g. `passageiro.7`.
#[must_use]
pub fn passenger_key(user_id: i64) -> String {
    format!("{PASSENGER_KEY_PREFIX}.{user_id}")
}

impl PassengerDashboard {
    /// Saved dashboard of `user_id`, or an empty one if nothing (or nothing
    /// readable) is stored.
    #[must_use]
    pub fn load(storage: &dyn KeyValueStore, user_id: i64) -> Self {
        load_json(storage, &passenger_key(user_id)).unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub fn save(&self, storage: &dyn KeyValueStore, user_id: i64) -> Result<(), ServiceError> {
        save_json(storage, &passenger_key(user_id), self)?;
        Ok(())
    }

    /// Request a ride to `destination` from the current location, replacing
    /// any pending request. The destination moves to the front of the recent
    /// list.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] when `destination` is blank.
    pub fn request_ride(&mut self, destination: &str) -> Result<&TripRequest, ServiceError> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(ServiceError::Validation("enter a destination before requesting a ride".to_owned()));
        }

        let requested_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        self.remember(destination);
        info!(destination, "ride requested");
        Ok(&*self.trip.insert(TripRequest {
            driver: None,
            origin: CURRENT_LOCATION.to_owned(),
            destination: destination.to_owned(),
            requested_at,
        }))
    }

    /// Drop the pending request. Returns whether there was one.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.trip.take().is_some();
        if cancelled {
            info!("ride request cancelled");
        }
        cancelled
    }

    /// Move `name` to the front, dropping any older entry with the same name
    /// (its address is kept).
    fn remember(&mut self, name: &str) {
        let address = self.recent.iter().find(|d| d.name == name).and_then(|d| d.address.clone());
        self.recent.retain(|d| d.name != name);
        self.recent.insert(0, Destination { name: name.to_owned(), address });
    }
}
