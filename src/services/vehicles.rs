//! Vehicle CRUD (`/categorias`).

use tracing::info;

use super::{ServiceError, require_token};
use crate::net::api::{ApiClient, VEHICLES_PATH, vehicle_path};
use crate::net::types::Vehicle;
use crate::state::auth::AuthStore;

/// # Errors
///
/// [`ServiceError::NotAuthenticated`] without a session, otherwise API errors.
pub async fn list(api: &ApiClient, store: &AuthStore) -> Result<Vec<Vehicle>, ServiceError> {
    let token = require_token(store).await?;
    Ok(api.get_json(VEHICLES_PATH, Some(&token)).await?)
}

/// # Errors
///
/// [`ServiceError::NotAuthenticated`] without a session, otherwise API errors.
pub async fn get(api: &ApiClient, store: &AuthStore, vehicle_id: i64) -> Result<Vehicle, ServiceError> {
    let token = require_token(store).await?;
    Ok(api.get_json(&vehicle_path(vehicle_id), Some(&token)).await?)
}

/// Create (`id == 0`) or update a vehicle.
///
/// # Errors
///
/// [`ServiceError::NotAuthenticated`] without a session, otherwise API errors.
pub async fn save(api: &ApiClient, store: &AuthStore, vehicle: &Vehicle) -> Result<Vehicle, ServiceError> {
    let token = require_token(store).await?;
    let saved: Vehicle = if vehicle.id == 0 {
        api.post_json(VEHICLES_PATH, Some(&token), vehicle).await?
    } else {
        api.put_json(VEHICLES_PATH, Some(&token), vehicle).await?
    };
    info!(vehicle_id = saved.id, plate = %saved.plate, "vehicle saved");
    Ok(saved)
}

/// # Errors
///
/// [`ServiceError::NotAuthenticated`] without a session, otherwise API errors.
pub async fn delete(api: &ApiClient, store: &AuthStore, vehicle_id: i64) -> Result<(), ServiceError> {
    let token = require_token(store).await?;
    api.delete(&vehicle_path(vehicle_id), Some(&token)).await?;
    info!(vehicle_id, "vehicle deleted");
    Ok(())
}
