//! Location resolution and notification targeting for campus incidents.
//!
//! Two halves:
//! - [`resolver`] turns free-text location mentions into coordinates with a
//!   confidence / provenance tag, backed by the [`catalog`].
//! - [`targeting`] turns a classified incident into a rate-limited,
//!   per-recipient, per-channel notification plan, backed by the
//!   [`directory`] and the [`channels`] registry.
//!
//! [`dispatch`] delivers a plan through a (simulated) transport.

pub mod catalog;
pub mod channels;
pub mod directory;
pub mod dispatch;
pub mod geo;
pub mod incident;
mod persist;
pub mod resolver;
pub mod targeting;

pub use catalog::{LocationCatalog, NamedPlace, PlaceKind, SharedCatalog};
pub use channels::{Channel, ChannelKind, ChannelRegistry};
pub use directory::{Recipient, RecipientDirectory, RecipientGroup, SharedDirectory};
pub use geo::{Coordinate, distance_meters};
pub use incident::{Incident, IncidentReport, Priority, Severity};
pub use resolver::{GeocodeResult, GeocodeSource, LocationResolver};
pub use targeting::{NotificationPlan, NotificationPlanEntry, TargetingPipeline};

// ───────────────────────────── Errors ────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Referenced place, recipient, or group ID does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A required field is missing or a value is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
