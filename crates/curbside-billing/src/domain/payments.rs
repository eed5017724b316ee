use crate::domain::money::Cents;
use crate::domain::types::{PaymentId, PaymentStatus, TicketId};
use crate::error::{BillingError, Result};
use chrono::{DateTime, Utc};
use curbside_common::TenantId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One confirmed refund against a payment. The gateway reference is the
/// idempotency key for replayed callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub gateway_ref: String,
    pub amount: Cents,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// The per-ticket payment ledger record.
///
/// `refund_amount` is cumulative across the refund sub-ledger and never
/// exceeds `amount`; `refunded_at` is set iff any refund has been applied.
/// Records are never deleted. All mutation goes through the methods below,
/// which enforce the transition table and the refund invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub ticket_id: TicketId,
    pub tenant_id: TenantId,
    pub status: PaymentStatus,
    pub amount: Cents,
    pub refund_amount: Cents,
    pub stripe_link_id: Option<String>,
    pub stripe_product: Option<String>,
    pub stripe_refund_id: Option<String>,
    pub refunds: Vec<Refund>,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(ticket_id: TicketId, tenant_id: TenantId, amount: Cents) -> Result<Self> {
        if !amount.is_positive() {
            return Err(BillingError::InvalidAmount { amount });
        }

        Ok(Self {
            id: PaymentId::new(),
            ticket_id,
            tenant_id,
            status: PaymentStatus::Pending,
            amount,
            refund_amount: Cents::ZERO,
            stripe_link_id: None,
            stripe_product: None,
            stripe_refund_id: None,
            refunds: Vec::new(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
            completed_at: None,
            refunded_at: None,
        })
    }

    pub fn transition_to(&mut self, next: PaymentStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(BillingError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record the gateway identifiers returned when the charge link was
    /// created. The payment stays `Pending` until the link actually goes
    /// out to the customer.
    pub fn attach_charge_link(&mut self, link_id: String, product_ref: String) {
        self.stripe_link_id = Some(link_id);
        self.stripe_product = Some(product_ref);
    }

    pub fn mark_link_sent(&mut self) -> Result<()> {
        self.transition_to(PaymentStatus::LinkSent)
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition_to(PaymentStatus::Completed)?;
        self.completed_at = Some(at);
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: &str) -> Result<()> {
        self.transition_to(PaymentStatus::Failed)?;
        self.metadata
            .insert("failure_reason".to_string(), reason.to_string());
        Ok(())
    }

    /// The balance still refundable: `amount - refund_amount`.
    pub fn remaining_refundable(&self) -> Cents {
        self.amount.saturating_sub(self.refund_amount)
    }

    pub fn is_fully_refunded(&self) -> bool {
        self.refund_amount == self.amount
    }

    /// True if this gateway refund reference was already applied. Used to
    /// drop replayed gateway callbacks.
    pub fn has_refund_ref(&self, gateway_ref: &str) -> bool {
        self.refunds
            .iter()
            .any(|refund| refund.gateway_ref == gateway_ref)
    }

    /// Apply a gateway-confirmed refund to the sub-ledger.
    ///
    /// Valid only while `Completed` with a remaining balance. Flips the
    /// status to `Refunded` exactly when the cumulative refund reaches the
    /// charged amount; a partial refund leaves the payment `Completed`.
    pub fn apply_refund(&mut self, refund: Refund) -> Result<()> {
        if self.status != PaymentStatus::Completed {
            return Err(BillingError::InvalidTransition {
                from: self.status.to_string(),
                to: PaymentStatus::Refunded.to_string(),
            });
        }

        if !refund.amount.is_positive() {
            return Err(BillingError::InvalidAmount {
                amount: refund.amount,
            });
        }

        let remaining = self.remaining_refundable();
        if refund.amount > remaining {
            return Err(BillingError::ExceedsRefundable {
                requested: refund.amount,
                remaining,
            });
        }

        // Cannot overflow: bounded above by `amount`, checked just above.
        self.refund_amount = self.refund_amount.saturating_add(refund.amount);
        self.refunded_at = Some(refund.at);
        self.stripe_refund_id = Some(refund.gateway_ref.clone());
        self.refunds.push(refund);

        if self.is_fully_refunded() {
            self.transition_to(PaymentStatus::Refunded)?;
        }

        Ok(())
    }
}
