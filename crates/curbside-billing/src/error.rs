use crate::domain::money::Cents;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("pricing tiers out of order: {detail}")]
    InvalidTierOrder { detail: String },

    #[error("duplicate tier bound at {hours} hours")]
    DuplicateTierBound { hours: u32 },

    #[error("no pricing tier covers {elapsed_hours} elapsed hours")]
    NoApplicableTier { elapsed_hours: u32 },

    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: Cents },

    #[error("refund of {requested} exceeds remaining refundable balance {remaining}")]
    ExceedsRefundable { requested: Cents, remaining: Cents },

    #[error("invalid payment transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{field} must be between 0 and 10000 basis points, got {value}")]
    InvalidBasisPoints { field: &'static str, value: u16 },

    #[error("unknown payment status: {value}")]
    UnknownStatus { value: String },

    #[error("payment not found: {id}")]
    PaymentNotFound { id: String },

    #[error("location not found: {id}")]
    LocationNotFound { id: String },

    #[error("payment has no gateway charge reference: {id}")]
    MissingChargeReference { id: String },

    #[error("payment gateway {operation} failed: {detail}")]
    GatewayError { operation: String, detail: String },

    #[error("database error during {operation}: {source}")]
    DatabaseError {
        operation: String,
        source: Box<sqlx::Error>,
    },

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] curbside_common::IdError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl BillingError {
    pub fn database(operation: impl Into<String>, source: sqlx::Error) -> Self {
        Self::DatabaseError {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    pub fn gateway(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::GatewayError {
            operation: operation.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
