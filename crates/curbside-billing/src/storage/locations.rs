use crate::domain::money::Cents;
use crate::domain::tickets::Location;
use crate::domain::tiers::TierSchedule;
use crate::domain::types::Scope;
use crate::error::{BillingError, Result};
use crate::storage::postgres::Database;
use async_trait::async_trait;
use curbside_common::{LocationId, TenantId};
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// Create or replace a location's pricing configuration. Configuration
    /// invariants (basis-point ranges, tier ordering) are re-validated
    /// before the row is touched.
    async fn upsert(&self, location: &Location) -> Result<()>;

    async fn get(&self, scope: &Scope, id: &LocationId) -> Result<Option<Location>>;

    /// Replace a location's tier table. Tickets priced before the change
    /// keep the schedule they were priced under; only later pricing sees
    /// the new table.
    async fn set_tiers(
        &self,
        scope: &Scope,
        id: &LocationId,
        tiers: TierSchedule,
    ) -> Result<Location>;
}

pub struct SqlLocationRepository {
    database: Arc<Database>,
}

impl SqlLocationRepository {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    fn location_from_row(row: &sqlx::postgres::PgRow) -> Result<Location> {
        let tax_rate: i32 = row.get("tax_rate_basis_points");
        let hotel_share: i32 = row.get("hotel_share_points");
        // Deserializing the schedule re-runs tier validation; Location::new
        // re-checks the basis-point ranges.
        let tiers: TierSchedule = serde_json::from_value(row.get("tiers"))?;

        Location::new(
            LocationId::new(row.get::<String, _>("id"))?,
            TenantId::new(row.get::<String, _>("tenant_id"))?,
            tax_rate as u16,
            hotel_share as u16,
            Cents::new(row.get("overnight_rate_cents")),
            row.get("overnight_in_out_privileges"),
            tiers,
        )
    }
}

#[async_trait]
impl LocationRepository for SqlLocationRepository {
    async fn upsert(&self, location: &Location) -> Result<()> {
        location.validate()?;

        let tiers_json = serde_json::to_value(&location.tiers)?;

        sqlx::query(
            r#"
            INSERT INTO billing.locations
            (id, tenant_id, tax_rate_basis_points, hotel_share_points,
             overnight_rate_cents, overnight_in_out_privileges, tiers, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (tenant_id, id) DO UPDATE
            SET tax_rate_basis_points = EXCLUDED.tax_rate_basis_points,
                hotel_share_points = EXCLUDED.hotel_share_points,
                overnight_rate_cents = EXCLUDED.overnight_rate_cents,
                overnight_in_out_privileges = EXCLUDED.overnight_in_out_privileges,
                tiers = EXCLUDED.tiers,
                updated_at = NOW()
            "#,
        )
        .bind(location.id.as_str())
        .bind(location.tenant_id.as_str())
        .bind(location.tax_rate_basis_points as i32)
        .bind(location.hotel_share_points as i32)
        .bind(location.overnight_rate.as_i64())
        .bind(location.overnight_in_out_privileges)
        .bind(tiers_json)
        .execute(self.database.pool())
        .await
        .map_err(|e| BillingError::database("upsert_location", e))?;

        Ok(())
    }

    async fn get(&self, scope: &Scope, id: &LocationId) -> Result<Option<Location>> {
        if !scope.covers_location(id) {
            return Ok(None);
        }

        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, tax_rate_basis_points, hotel_share_points,
                   overnight_rate_cents, overnight_in_out_privileges, tiers
            FROM billing.locations
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(scope.tenant_id.as_str())
        .bind(id.as_str())
        .fetch_optional(self.database.pool())
        .await
        .map_err(|e| BillingError::database("get_location", e))?;

        row.map(|r| Self::location_from_row(&r)).transpose()
    }

    async fn set_tiers(
        &self,
        scope: &Scope,
        id: &LocationId,
        tiers: TierSchedule,
    ) -> Result<Location> {
        // Validated on every write, not only at read time: the resolver
        // assumes sortedness without re-sorting.
        tiers.validate()?;

        let tiers_json = serde_json::to_value(&tiers)?;

        let row = sqlx::query(
            r#"
            UPDATE billing.locations
            SET tiers = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING id, tenant_id, tax_rate_basis_points, hotel_share_points,
                      overnight_rate_cents, overnight_in_out_privileges, tiers
            "#,
        )
        .bind(scope.tenant_id.as_str())
        .bind(id.as_str())
        .bind(tiers_json)
        .fetch_optional(self.database.pool())
        .await
        .map_err(|e| BillingError::database("set_location_tiers", e))?
        .ok_or_else(|| BillingError::LocationNotFound { id: id.to_string() })?;

        Self::location_from_row(&row)
    }
}

/// In-memory location store for development and testing.
pub struct InMemoryLocationRepository {
    locations: Arc<RwLock<HashMap<LocationId, Location>>>,
}

impl InMemoryLocationRepository {
    pub fn new() -> Self {
        Self {
            locations: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryLocationRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationRepository for InMemoryLocationRepository {
    async fn upsert(&self, location: &Location) -> Result<()> {
        location.validate()?;

        let mut locations = self.locations.write().await;
        locations.insert(location.id.clone(), location.clone());
        Ok(())
    }

    async fn get(&self, scope: &Scope, id: &LocationId) -> Result<Option<Location>> {
        if !scope.covers_location(id) {
            return Ok(None);
        }

        let locations = self.locations.read().await;
        Ok(locations
            .get(id)
            .filter(|location| location.tenant_id == scope.tenant_id)
            .cloned())
    }

    async fn set_tiers(
        &self,
        scope: &Scope,
        id: &LocationId,
        tiers: TierSchedule,
    ) -> Result<Location> {
        tiers.validate()?;

        let mut locations = self.locations.write().await;
        let location = locations
            .get_mut(id)
            .filter(|location| {
                location.tenant_id == scope.tenant_id && scope.covers_location(id)
            })
            .ok_or_else(|| BillingError::LocationNotFound { id: id.to_string() })?;

        location.tiers = tiers;
        Ok(location.clone())
    }
}
