use crate::domain::money::Cents;
use crate::domain::payments::{Payment, Refund};
use crate::domain::types::{PaymentId, PaymentStatus, Scope, TicketId};
use crate::error::{BillingError, Result};
use crate::gateway::PaymentGateway;
use crate::storage::{PaymentRepository, LOCATION_METADATA_KEY};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

/// Metadata key recording which gateway event completed the payment, so a
/// replayed completion callback is recognized and dropped.
const COMPLETION_REF_KEY: &str = "gateway_completion_ref";

/// Ledger mutation operations
///
/// These are the only entry points that change payment state. Every call is
/// scoped; gateway calls happen before any local write, so a failed remote
/// call never leaves a half-applied record.
#[async_trait]
pub trait LedgerOperations: Send + Sync {
    /// Create a payment and request a hosted charge link for it. The
    /// payment is stored `Pending`, carrying the gateway identifiers.
    async fn create_payment_link(
        &self,
        scope: &Scope,
        ticket_id: TicketId,
        amount: Cents,
        metadata: HashMap<String, String>,
    ) -> Result<Payment>;

    /// Record that the charge link went out to the customer.
    async fn mark_link_sent(&self, scope: &Scope, payment_id: &PaymentId) -> Result<Payment>;

    /// Gateway completion callback. Idempotent on the gateway reference.
    async fn mark_completed(
        &self,
        scope: &Scope,
        payment_id: &PaymentId,
        gateway_ref: &str,
    ) -> Result<Payment>;

    async fn mark_failed(
        &self,
        scope: &Scope,
        payment_id: &PaymentId,
        reason: &str,
    ) -> Result<Payment>;

    /// Refund a completed payment. `None` refunds the full remaining
    /// balance. The gateway executes first; the ledger records the refund
    /// only after the gateway confirms it.
    async fn refund(
        &self,
        scope: &Scope,
        payment_id: &PaymentId,
        amount: Option<Cents>,
        reason: Option<String>,
    ) -> Result<Payment>;

    /// Gateway refund-confirmation callback. Replaying the same gateway
    /// reference applies the refund once.
    async fn confirm_refund(
        &self,
        scope: &Scope,
        payment_id: &PaymentId,
        gateway_ref: &str,
        amount: Cents,
    ) -> Result<Payment>;

    async fn get_payment(&self, scope: &Scope, payment_id: &PaymentId) -> Result<Payment>;

    async fn list_payments(&self, scope: &Scope) -> Result<Vec<Payment>>;
}

pub struct LedgerService<R, G> {
    repository: Arc<R>,
    gateway: Arc<G>,
}

impl<R, G> LedgerService<R, G>
where
    R: PaymentRepository,
    G: PaymentGateway,
{
    pub fn new(repository: Arc<R>, gateway: Arc<G>) -> Self {
        Self {
            repository,
            gateway,
        }
    }
}

#[async_trait]
impl<R, G> LedgerOperations for LedgerService<R, G>
where
    R: PaymentRepository,
    G: PaymentGateway,
{
    async fn create_payment_link(
        &self,
        scope: &Scope,
        ticket_id: TicketId,
        amount: Cents,
        metadata: HashMap<String, String>,
    ) -> Result<Payment> {
        if !amount.is_positive() {
            return Err(BillingError::InvalidAmount { amount });
        }

        // Gateway first: a failed call must leave no ledger record behind.
        let link = self.gateway.create_charge_link(amount, &metadata).await?;

        let mut payment = Payment::new(ticket_id, scope.tenant_id.clone(), amount)?;
        payment.metadata = metadata;
        if let Some(location_id) = &scope.location_id {
            payment
                .metadata
                .insert(LOCATION_METADATA_KEY.to_string(), location_id.to_string());
        }
        payment.attach_charge_link(link.link_id, link.product_ref);

        self.repository.insert(&payment).await?;

        tracing::info!(
            payment_id = %payment.id,
            ticket_id = %ticket_id,
            %amount,
            "created payment link"
        );

        Ok(payment)
    }

    async fn mark_link_sent(&self, scope: &Scope, payment_id: &PaymentId) -> Result<Payment> {
        self.repository
            .with_payment_mut(scope, payment_id, Box::new(|p| p.mark_link_sent()))
            .await
    }

    async fn mark_completed(
        &self,
        scope: &Scope,
        payment_id: &PaymentId,
        gateway_ref: &str,
    ) -> Result<Payment> {
        let gateway_ref = gateway_ref.to_string();
        let payment = self
            .repository
            .with_payment_mut(
                scope,
                payment_id,
                Box::new(move |p| {
                    if p.status == PaymentStatus::Completed
                        && p.metadata.get(COMPLETION_REF_KEY) == Some(&gateway_ref)
                    {
                        // Replayed completion callback
                        return Ok(());
                    }
                    p.mark_completed(Utc::now())?;
                    p.metadata.insert(COMPLETION_REF_KEY.to_string(), gateway_ref);
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(payment_id = %payment.id, "payment completed");
        Ok(payment)
    }

    async fn mark_failed(
        &self,
        scope: &Scope,
        payment_id: &PaymentId,
        reason: &str,
    ) -> Result<Payment> {
        let reason = reason.to_string();
        let payment = self
            .repository
            .with_payment_mut(
                scope,
                payment_id,
                Box::new(move |p| p.mark_failed(&reason)),
            )
            .await?;

        tracing::warn!(payment_id = %payment.id, "payment failed");
        Ok(payment)
    }

    async fn refund(
        &self,
        scope: &Scope,
        payment_id: &PaymentId,
        amount: Option<Cents>,
        reason: Option<String>,
    ) -> Result<Payment> {
        // Snapshot validation so a doomed request never reaches the
        // gateway. The authoritative re-check runs inside the serialized
        // mutation below.
        let current = self.get_payment(scope, payment_id).await?;

        if current.status != PaymentStatus::Completed {
            return Err(BillingError::InvalidTransition {
                from: current.status.to_string(),
                to: PaymentStatus::Refunded.to_string(),
            });
        }

        let remaining = current.remaining_refundable();
        let requested = amount.unwrap_or(remaining);

        if !requested.is_positive() {
            return Err(BillingError::InvalidAmount { amount: requested });
        }
        if requested > remaining {
            return Err(BillingError::ExceedsRefundable {
                requested,
                remaining,
            });
        }

        let charge_ref =
            current
                .stripe_link_id
                .clone()
                .ok_or_else(|| BillingError::MissingChargeReference {
                    id: payment_id.to_string(),
                })?;

        // Gateway call with no ledger lock held.
        let receipt = self.gateway.refund(&charge_ref, requested).await?;

        let refund = Refund {
            gateway_ref: receipt.refund_ref,
            amount: requested,
            reason,
            at: Utc::now(),
        };

        let payment = self
            .repository
            .with_payment_mut(scope, payment_id, Box::new(move |p| p.apply_refund(refund)))
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            refunded = %requested,
            status = %payment.status,
            "refund applied"
        );

        Ok(payment)
    }

    async fn confirm_refund(
        &self,
        scope: &Scope,
        payment_id: &PaymentId,
        gateway_ref: &str,
        amount: Cents,
    ) -> Result<Payment> {
        let refund = Refund {
            gateway_ref: gateway_ref.to_string(),
            amount,
            reason: None,
            at: Utc::now(),
        };

        self.repository
            .with_payment_mut(
                scope,
                payment_id,
                Box::new(move |p| {
                    if p.has_refund_ref(&refund.gateway_ref) {
                        // Replayed refund confirmation
                        return Ok(());
                    }
                    p.apply_refund(refund)
                }),
            )
            .await
    }

    async fn get_payment(&self, scope: &Scope, payment_id: &PaymentId) -> Result<Payment> {
        self.repository
            .get(scope, payment_id)
            .await?
            .ok_or_else(|| BillingError::PaymentNotFound {
                id: payment_id.to_string(),
            })
    }

    async fn list_payments(&self, scope: &Scope) -> Result<Vec<Payment>> {
        self.repository.list(scope).await
    }
}
