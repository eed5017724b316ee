//! Payment gateway collaborator.
//!
//! The ledger treats the gateway as the source of truth for settlement
//! facts: it mirrors the opaque identifiers the gateway returns and never
//! originates them. Calls are fallible remote operations; retry policy
//! belongs to the caller, and the ledger guarantees no local mutation when
//! a call fails.

pub mod stripe;

pub use stripe::StripeGateway;

use crate::domain::money::Cents;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// A hosted charge link created by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeLink {
    pub link_id: String,
    pub product_ref: String,
}

/// Gateway acknowledgement of an executed refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundReceipt {
    pub refund_ref: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted payment link for the given amount. The returned
    /// identifiers are stored verbatim on the payment record.
    async fn create_charge_link(
        &self,
        amount: Cents,
        metadata: &HashMap<String, String>,
    ) -> Result<ChargeLink>;

    /// Execute a refund against a previously created charge.
    async fn refund(&self, charge_ref: &str, amount: Cents) -> Result<RefundReceipt>;
}
