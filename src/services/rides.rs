//! Ride CRUD (`/produtos`).
//!
//! The backend returns each ride with a partial vehicle; listing joins the
//! full vehicle records in. Outgoing rides are sent as a [`RideDraft`] whose
//! vehicle and owner are references by id only.

#[cfg(test)]
#[path = "rides_test.rs"]
mod rides_test;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::info;

use super::{ServiceError, require_token};
use crate::net::api::{ApiClient, RIDES_PATH, VEHICLES_PATH, ride_path};
use crate::net::types::{Ride, Vehicle};
use crate::state::auth::AuthStore;

/// Ride form as the user fills it in. Travel time is not an input; it is
/// derived from distance and speed.
#[derive(Debug, Clone, PartialEq)]
pub struct RideDraft {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub origin: String,
    pub destination: String,
    pub distance_km: f64,
    pub average_speed_kmh: f64,
    pub active: bool,
    /// RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (UTC) or `YYYY-MM-DD`.
    pub date: String,
    pub same_gender_driver: bool,
    pub vehicle_id: i64,
}

impl Default for RideDraft {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            description: String::new(),
            price: 0.0,
            origin: String::new(),
            destination: String::new(),
            distance_km: 0.0,
            average_speed_kmh: 0.0,
            active: true,
            date: String::new(),
            same_gender_driver: false,
            vehicle_id: 0,
        }
    }
}

impl RideDraft {
    /// Start an edit from an existing ride.
    #[must_use]
    pub fn from_ride(ride: &Ride) -> Self {
        Self {
            id: ride.id,
            title: ride.title.clone(),
            description: ride.description.clone(),
            price: ride.price,
            origin: ride.origin.clone(),
            destination: ride.destination.clone(),
            distance_km: ride.distance_km,
            average_speed_kmh: ride.average_speed_kmh,
            active: ride.active,
            date: ride.date.clone(),
            same_gender_driver: ride.same_gender_driver,
            vehicle_id: ride.vehicle.as_ref().map_or(0, |v| v.id),
        }
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        travel_minutes(self.distance_km, self.average_speed_kmh)
    }

    fn payload(&self, owner_id: i64) -> Result<RidePayload<'_>, ServiceError> {
        Ok(RidePayload {
            id: self.id,
            title: &self.title,
            description: &self.description,
            price: self.price,
            origin: &self.origin,
            destination: &self.destination,
            distance_km: self.distance_km,
            duration_minutes: self.duration_minutes(),
            average_speed_kmh: self.average_speed_kmh,
            active: self.active,
            date: rfc3339_date(&self.date)?,
            same_gender_driver: self.same_gender_driver,
            vehicle: IdRef { id: self.vehicle_id },
            owner: IdRef { id: owner_id },
        })
    }
}

#[derive(Debug, Serialize)]
struct IdRef {
    id: i64,
}

#[derive(Debug, Serialize)]
struct RidePayload<'a> {
    id: i64,
    #[serde(rename = "titulo")]
    title: &'a str,
    #[serde(rename = "descricao")]
    description: &'a str,
    #[serde(rename = "preco")]
    price: f64,
    #[serde(rename = "origem")]
    origin: &'a str,
    #[serde(rename = "destino")]
    destination: &'a str,
    #[serde(rename = "distanciaKm")]
    distance_km: f64,
    #[serde(rename = "tempoMinutos")]
    duration_minutes: u32,
    #[serde(rename = "velocidadeMediaKmh")]
    average_speed_kmh: f64,
    #[serde(rename = "ativo")]
    active: bool,
    #[serde(rename = "data")]
    date: String,
    #[serde(rename = "motoristaMesmoGenero")]
    same_gender_driver: bool,
    #[serde(rename = "categoria")]
    vehicle: IdRef,
    #[serde(rename = "usuario")]
    owner: IdRef,
}

// =============================================================================
// DERIVED FIELDS
// =============================================================================

/// Minutes to cover `distance_km` at `speed_kmh`, rounded; 0 unless both are
/// positive.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn travel_minutes(distance_km: f64, speed_kmh: f64) -> u32 {
    if !(distance_km > 0.0 && speed_kmh > 0.0) {
        return 0;
    }
    // `as` saturates, so absurd ratios clamp to u32::MAX.
    (distance_km / speed_kmh * 60.0).round() as u32
}

/// Normalize a form date to RFC 3339. Dates without an offset are UTC.
///
/// # Errors
///
/// [`ServiceError::Validation`] when `raw` matches none of the accepted forms.
pub fn rfc3339_date(raw: &str) -> Result<String, ServiceError> {
    let raw = raw.trim();
    let parsed = if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        value
    } else if let Ok(value) =
        PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"))
    {
        value.assume_utc()
    } else if let Ok(value) = PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]")) {
        value.assume_utc()
    } else if let Ok(value) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        value.midnight().assume_utc()
    } else {
        return Err(ServiceError::Validation(format!("invalid ride date '{raw}'")));
    };
    parsed.format(&Rfc3339).map_err(|e| ServiceError::Validation(format!("invalid ride date '{raw}': {e}")))
}

/// Replace each ride's partial vehicle with the full record of the same id.
/// Rides whose vehicle is unknown keep what the server sent.
#[must_use]
pub fn join_vehicles(rides: Vec<Ride>, vehicles: &[Vehicle]) -> Vec<Ride> {
    rides
        .into_iter()
        .map(|mut ride| {
            let full = ride.vehicle.as_ref().and_then(|partial| vehicles.iter().find(|v| v.id == partial.id));
            if let Some(full) = full {
                ride.vehicle = Some(full.clone());
            }
            ride
        })
        .collect()
}

// =============================================================================
// ENDPOINTS
// =============================================================================

/// List rides with their vehicles resolved.
///
/// # Errors
///
/// [`ServiceError::NotAuthenticated`] without a session, otherwise API errors.
pub async fn list(api: &ApiClient, store: &AuthStore) -> Result<Vec<Ride>, ServiceError> {
    let token = require_token(store).await?;
    let vehicles: Vec<Vehicle> = api.get_json(VEHICLES_PATH, Some(&token)).await?;
    let rides: Vec<Ride> = api.get_json(RIDES_PATH, Some(&token)).await?;
    Ok(join_vehicles(rides, &vehicles))
}

/// # Errors
///
/// [`ServiceError::NotAuthenticated`] without a session, otherwise API errors.
pub async fn get(api: &ApiClient, store: &AuthStore, ride_id: i64) -> Result<Ride, ServiceError> {
    let token = require_token(store).await?;
    Ok(api.get_json(&ride_path(ride_id), Some(&token)).await?)
}

/// Create (`id == 0`) or update a ride owned by the current user.
///
/// # Errors
///
/// [`ServiceError::NotAuthenticated`] without a session, a validation error
/// for an unparsable date, otherwise API errors.
pub async fn save(api: &ApiClient, store: &AuthStore, draft: &RideDraft) -> Result<Ride, ServiceError> {
    let session = store.session().await;
    if !session.is_authenticated() {
        return Err(ServiceError::NotAuthenticated);
    }
    let payload = draft.payload(session.id())?;
    let token = Some(session.token());
    let saved: Ride = if draft.id == 0 {
        api.post_json(RIDES_PATH, token, &payload).await?
    } else {
        api.put_json(RIDES_PATH, token, &payload).await?
    };
    info!(ride_id = saved.id, minutes = saved.duration_minutes, "ride saved");
    Ok(saved)
}

/// # Errors
///
/// [`ServiceError::NotAuthenticated`] without a session, otherwise API errors.
pub async fn delete(api: &ApiClient, store: &AuthStore, ride_id: i64) -> Result<(), ServiceError> {
    let token = require_token(store).await?;
    api.delete(&ride_path(ride_id), Some(&token)).await?;
    info!(ride_id, "ride deleted");
    Ok(())
}
