//! Tiered billing and payment reconciliation engine for Curbside.
//!
//! Converts a ticket's elapsed duration and a location's pricing-tier
//! schedule into a charge, resolves in/out privileges, and maintains the
//! per-ticket payment ledger that mirrors gateway-side settlement facts.

pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod storage;

pub use config::BillingConfig;
pub use error::{BillingError, Result};
