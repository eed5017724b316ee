//! Shared types and logging initialization for Curbside components.

pub mod logging;
pub mod types;

pub use types::{IdError, LocationId, TenantId};
