use crate::domain::money::Cents;
use crate::domain::payments::{Payment, Refund};
use crate::domain::types::{PaymentId, Scope, TicketId};
use crate::error::{BillingError, Result};
use crate::storage::postgres::Database;
use async_trait::async_trait;
use curbside_common::TenantId;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A mutation applied to a payment record under per-payment serialization.
/// If it errors, the record is left untouched.
pub type PaymentMutation = Box<dyn FnOnce(&mut Payment) -> Result<()> + Send>;

/// Metadata key the intake layer stamps so restricted scopes can filter
/// payments by location without a ticket join.
pub const LOCATION_METADATA_KEY: &str = "location_id";

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: &Payment) -> Result<()>;

    async fn get(&self, scope: &Scope, id: &PaymentId) -> Result<Option<Payment>>;

    async fn list(&self, scope: &Scope) -> Result<Vec<Payment>>;

    /// Load the payment, apply `mutate`, and store the result atomically.
    ///
    /// All status and refund writes go through here: concurrent mutations
    /// of the same payment serialize, and a failed mutation leaves the
    /// stored record unchanged. The closure runs with the record locked, so
    /// it must not perform remote calls.
    async fn with_payment_mut(
        &self,
        scope: &Scope,
        id: &PaymentId,
        mutate: PaymentMutation,
    ) -> Result<Payment>;
}

fn location_filter(scope: &Scope) -> Option<&str> {
    scope.location_id.as_ref().map(|loc| loc.as_str())
}

fn in_scope(payment: &Payment, scope: &Scope) -> bool {
    if payment.tenant_id != scope.tenant_id {
        return false;
    }
    match location_filter(scope) {
        Some(loc) => payment.metadata.get(LOCATION_METADATA_KEY).map(String::as_str) == Some(loc),
        None => true,
    }
}

pub struct SqlPaymentRepository {
    database: Arc<Database>,
}

const PAYMENT_COLUMNS: &str = "id, ticket_id, tenant_id, status, amount_cents, \
     refund_amount_cents, stripe_link_id, stripe_product, stripe_refund_id, \
     refunds, metadata, created_at, completed_at, refunded_at";

impl SqlPaymentRepository {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    fn payment_from_row(row: &sqlx::postgres::PgRow) -> Result<Payment> {
        let status_str: String = row.get("status");
        let refunds: Vec<Refund> = serde_json::from_value(row.get("refunds"))?;
        let metadata: HashMap<String, String> =
            serde_json::from_value(row.get("metadata")).unwrap_or_default();

        Ok(Payment {
            id: PaymentId::from_uuid(row.get("id")),
            ticket_id: TicketId::from_uuid(row.get("ticket_id")),
            tenant_id: TenantId::new(row.get::<String, _>("tenant_id"))?,
            status: status_str.parse()?,
            amount: Cents::new(row.get("amount_cents")),
            refund_amount: Cents::new(row.get("refund_amount_cents")),
            stripe_link_id: row.get("stripe_link_id"),
            stripe_product: row.get("stripe_product"),
            stripe_refund_id: row.get("stripe_refund_id"),
            refunds,
            metadata,
            created_at: row.get("created_at"),
            completed_at: row.get("completed_at"),
            refunded_at: row.get("refunded_at"),
        })
    }
}

#[async_trait]
impl PaymentRepository for SqlPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<()> {
        let refunds_json = serde_json::to_value(&payment.refunds)?;
        let metadata_json = serde_json::to_value(&payment.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO billing.payments
            (id, ticket_id, tenant_id, status, amount_cents, refund_amount_cents,
             stripe_link_id, stripe_product, stripe_refund_id, refunds, metadata,
             created_at, completed_at, refunded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.ticket_id.as_uuid())
        .bind(payment.tenant_id.as_str())
        .bind(payment.status.to_string())
        .bind(payment.amount.as_i64())
        .bind(payment.refund_amount.as_i64())
        .bind(&payment.stripe_link_id)
        .bind(&payment.stripe_product)
        .bind(&payment.stripe_refund_id)
        .bind(refunds_json)
        .bind(metadata_json)
        .bind(payment.created_at)
        .bind(payment.completed_at)
        .bind(payment.refunded_at)
        .execute(self.database.pool())
        .await
        .map_err(|e| BillingError::database("insert_payment", e))?;

        Ok(())
    }

    async fn get(&self, scope: &Scope, id: &PaymentId) -> Result<Option<Payment>> {
        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM billing.payments
            WHERE id = $1 AND tenant_id = $2
              AND ($3::text IS NULL OR metadata->>'location_id' = $3)
            "#
        );

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .bind(scope.tenant_id.as_str())
            .bind(location_filter(scope))
            .fetch_optional(self.database.pool())
            .await
            .map_err(|e| BillingError::database("get_payment", e))?;

        row.map(|r| Self::payment_from_row(&r)).transpose()
    }

    async fn list(&self, scope: &Scope) -> Result<Vec<Payment>> {
        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM billing.payments
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR metadata->>'location_id' = $2)
            ORDER BY created_at DESC
            "#
        );

        let rows = sqlx::query(&query)
            .bind(scope.tenant_id.as_str())
            .bind(location_filter(scope))
            .fetch_all(self.database.pool())
            .await
            .map_err(|e| BillingError::database("list_payments", e))?;

        rows.iter().map(Self::payment_from_row).collect()
    }

    async fn with_payment_mut(
        &self,
        scope: &Scope,
        id: &PaymentId,
        mutate: PaymentMutation,
    ) -> Result<Payment> {
        let mut tx = self
            .database
            .pool()
            .begin()
            .await
            .map_err(|e| BillingError::database("begin_payment_update", e))?;

        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM billing.payments
            WHERE id = $1 AND tenant_id = $2
              AND ($3::text IS NULL OR metadata->>'location_id' = $3)
            FOR UPDATE
            "#
        );

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .bind(scope.tenant_id.as_str())
            .bind(location_filter(scope))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| BillingError::database("lock_payment", e))?
            .ok_or_else(|| BillingError::PaymentNotFound { id: id.to_string() })?;

        let mut payment = Self::payment_from_row(&row)?;

        // A failed mutation drops the transaction: rollback, record untouched.
        mutate(&mut payment)?;

        let refunds_json = serde_json::to_value(&payment.refunds)?;
        let metadata_json = serde_json::to_value(&payment.metadata)?;

        sqlx::query(
            r#"
            UPDATE billing.payments
            SET status = $2, refund_amount_cents = $3, stripe_link_id = $4,
                stripe_product = $5, stripe_refund_id = $6, refunds = $7,
                metadata = $8, completed_at = $9, refunded_at = $10,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.status.to_string())
        .bind(payment.refund_amount.as_i64())
        .bind(&payment.stripe_link_id)
        .bind(&payment.stripe_product)
        .bind(&payment.stripe_refund_id)
        .bind(refunds_json)
        .bind(metadata_json)
        .bind(payment.completed_at)
        .bind(payment.refunded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| BillingError::database("update_payment", e))?;

        tx.commit()
            .await
            .map_err(|e| BillingError::database("commit_payment_update", e))?;

        Ok(payment)
    }
}

/// In-memory payment store for development and testing.
///
/// The map's write lock is the per-payment serialization point; mutations
/// apply to a copy and replace the stored record only on success.
pub struct InMemoryPaymentRepository {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self {
            payments: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryPaymentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get(&self, scope: &Scope, id: &PaymentId) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .get(id)
            .filter(|payment| in_scope(payment, scope))
            .cloned())
    }

    async fn list(&self, scope: &Scope) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut matching: Vec<Payment> = payments
            .values()
            .filter(|payment| in_scope(payment, scope))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn with_payment_mut(
        &self,
        scope: &Scope,
        id: &PaymentId,
        mutate: PaymentMutation,
    ) -> Result<Payment> {
        let mut payments = self.payments.write().await;
        let stored = payments
            .get_mut(id)
            .ok_or_else(|| BillingError::PaymentNotFound { id: id.to_string() })?;
        if !in_scope(stored, scope) {
            return Err(BillingError::PaymentNotFound { id: id.to_string() });
        }

        let mut candidate = stored.clone();
        mutate(&mut candidate)?;
        *stored = candidate.clone();

        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PaymentStatus;
    use curbside_common::LocationId;

    fn payment_for(tenant: &str, location: Option<&str>) -> Payment {
        let mut payment = Payment::new(
            TicketId::new(),
            TenantId::new(tenant).unwrap(),
            Cents::new(2_500),
        )
        .unwrap();
        if let Some(loc) = location {
            payment
                .metadata
                .insert(LOCATION_METADATA_KEY.to_string(), loc.to_string());
        }
        payment
    }

    #[tokio::test]
    async fn get_respects_tenant_scope() {
        let repo = InMemoryPaymentRepository::new();
        let payment = payment_for("tenant-a", None);
        repo.insert(&payment).await.unwrap();

        let own_scope = Scope::tenant(TenantId::new("tenant-a").unwrap());
        assert!(repo.get(&own_scope, &payment.id).await.unwrap().is_some());

        let foreign_scope = Scope::tenant(TenantId::new("tenant-b").unwrap());
        assert!(repo.get(&foreign_scope, &payment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_by_location_for_restricted_scope() {
        let repo = InMemoryPaymentRepository::new();
        repo.insert(&payment_for("tenant-a", Some("lot-1")))
            .await
            .unwrap();
        repo.insert(&payment_for("tenant-a", Some("lot-2")))
            .await
            .unwrap();
        repo.insert(&payment_for("tenant-a", None)).await.unwrap();

        let tenant = TenantId::new("tenant-a").unwrap();
        let wide = Scope::tenant(tenant.clone());
        assert_eq!(repo.list(&wide).await.unwrap().len(), 3);

        let narrow = Scope::location(tenant, LocationId::new("lot-1").unwrap());
        let listed = repo.list(&narrow).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_record_unchanged() {
        let repo = InMemoryPaymentRepository::new();
        let payment = payment_for("tenant-a", None);
        repo.insert(&payment).await.unwrap();

        let scope = Scope::tenant(TenantId::new("tenant-a").unwrap());
        let result = repo
            .with_payment_mut(
                &scope,
                &payment.id,
                Box::new(|p| {
                    // Partial edit before the failure must not leak out
                    p.metadata.insert("poison".to_string(), "true".to_string());
                    p.transition_to(PaymentStatus::Refunded)
                }),
            )
            .await;

        assert!(result.is_err());
        let stored = repo.get(&scope, &payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert!(!stored.metadata.contains_key("poison"));
    }

    #[tokio::test]
    async fn successful_mutation_returns_updated_record() {
        let repo = InMemoryPaymentRepository::new();
        let payment = payment_for("tenant-a", None);
        repo.insert(&payment).await.unwrap();

        let scope = Scope::tenant(TenantId::new("tenant-a").unwrap());
        let updated = repo
            .with_payment_mut(&scope, &payment.id, Box::new(|p| p.mark_link_sent()))
            .await
            .unwrap();

        assert_eq!(updated.status, PaymentStatus::LinkSent);
        let stored = repo.get(&scope, &payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::LinkSent);
    }
}
