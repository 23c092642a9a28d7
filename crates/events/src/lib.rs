//! Rebate Recovery event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the domain event envelope.
//! - [`EventPersistence`]: background task writing every event to the
//!   `events` table.
//! - [`EventLog`]: background task tracing every event, used when no
//!   database is configured.

pub mod bus;
pub mod log;
pub mod persistence;

pub use bus::{event_types, EventBus, PlatformEvent};
pub use log::EventLog;
pub use persistence::EventPersistence;
