//! Velo ride-sharing client.
//!
//! ARCHITECTURE
//! ============
//! - [`net`]: typed REST client and wire DTOs.
//! - [`state`]: key-value storage, the session value and the session store.
//! - [`services`]: users, vehicles, rides, driver and passenger dashboards.
//! - [`guard`]: access checks shared by every command.
//! - [`config`]: environment configuration.

pub mod config;
pub mod guard;
pub mod net;
pub mod services;
pub mod state;
