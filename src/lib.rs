//! Scheduling core for a small vacation-rental operation: overlap checks,
//! availability search, monthly occupancy/revenue figures and the daily
//! arrivals/departures view, all computed over an in-memory snapshot of the
//! reservation collection.
//!
//! The crate is embedded by a host application. [`repository::store`] fetches
//! and persists records against Postgres; everything else is pure functions
//! over the decoded snapshot, so the scheduling rules are testable without a
//! database.

use tracing_subscriber::EnvFilter;

pub mod availability;
pub mod config;
pub mod daily;
pub mod dates;
pub mod db;
pub mod error;
pub mod model;
pub mod overlap;
pub mod repository;
pub mod schemas;
pub mod services;
pub mod stats;

pub use availability::{available_units, search_availability, AvailabilityReport};
pub use config::AppConfig;
pub use daily::{daily_ops, needs_payment_alert, DailyOps};
pub use error::{AppError, AppResult};
pub use model::{Reservation, ReservationStatus, Unit, UnitAssignment, UnitStake};
pub use overlap::has_overlap;
pub use stats::{monthly_stats, MonthlyStats};

/// Installs the tracing subscriber for hosts that do not bring their own.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init();
}
