//! Driver dashboard: daily summary, next trip, online status.
//!
//! Every call is driver-only and checked through [`guard::check`] before any
//! request goes out.

#[cfg(test)]
#[path = "driver_test.rs"]
mod driver_test;

use serde::Serialize;
use tracing::info;

use super::ServiceError;
use crate::guard::{self, Access};
use crate::net::api::{
    ApiClient, driver_dashboard_path, driver_next_trip_path, driver_status_path, trip_cancel_path, trip_start_path,
};
use crate::net::types::{DriverDashboard, NextTrip};
use crate::state::auth::AuthStore;
use crate::state::session::Session;

#[derive(Debug, Serialize)]
struct StatusBody {
    online: bool,
}

/// Empty JSON object body for the trip transition endpoints.
#[derive(Debug, Serialize)]
struct Empty {}

/// Dashboard summary plus the next trip, as shown on the driver home screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverOverview {
    pub dashboard: DriverDashboard,
    pub next_trip: Option<NextTrip>,
}

async fn driver_session(store: &AuthStore) -> Result<Session, ServiceError> {
    let session = store.session().await;
    guard::check(Access::DriverOnly, &session)?;
    Ok(session)
}

/// # Errors
///
/// Guard failures, otherwise API errors.
pub async fn dashboard(api: &ApiClient, store: &AuthStore) -> Result<DriverDashboard, ServiceError> {
    let session = driver_session(store).await?;
    Ok(api.get_json(&driver_dashboard_path(session.id()), Some(session.token())).await?)
}

/// The next scheduled trip; `None` when the server has nothing queued.
///
/// # Errors
///
/// Guard failures, otherwise API errors.
pub async fn next_trip(api: &ApiClient, store: &AuthStore) -> Result<Option<NextTrip>, ServiceError> {
    let session = driver_session(store).await?;
    Ok(api.get_json(&driver_next_trip_path(session.id()), Some(session.token())).await?)
}

/// Fetch the summary and the next trip in sequence.
///
/// # Errors
///
/// Guard failures, otherwise the first API error.
pub async fn overview(api: &ApiClient, store: &AuthStore) -> Result<DriverOverview, ServiceError> {
    let dashboard = dashboard(api, store).await?;
    let next_trip = next_trip(api, store).await?;
    Ok(DriverOverview { dashboard, next_trip })
}

/// # Errors
///
/// Guard failures, otherwise API errors.
pub async fn set_online(api: &ApiClient, store: &AuthStore, online: bool) -> Result<(), ServiceError> {
    let session = driver_session(store).await?;
    api.put_unit(&driver_status_path(session.id()), Some(session.token()), &StatusBody { online })
        .await?;
    info!(driver_id = session.id(), online, "driver status updated");
    Ok(())
}

/// # Errors
///
/// Guard failures, otherwise API errors.
pub async fn start_trip(api: &ApiClient, store: &AuthStore, trip_id: i64) -> Result<(), ServiceError> {
    let session = driver_session(store).await?;
    api.put_unit(&trip_start_path(trip_id), Some(session.token()), &Empty {}).await?;
    info!(trip_id, "trip started");
    Ok(())
}

/// # Errors
///
/// Guard failures, otherwise API errors.
pub async fn cancel_trip(api: &ApiClient, store: &AuthStore, trip_id: i64) -> Result<(), ServiceError> {
    let session = driver_session(store).await?;
    api.put_unit(&trip_cancel_path(trip_id), Some(session.token()), &Empty {}).await?;
    info!(trip_id, "trip cancelled");
    Ok(())
}
