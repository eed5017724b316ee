#![allow(dead_code)]

use async_trait::async_trait;
use curbside_billing::domain::money::Cents;
use curbside_billing::domain::tickets::{Location, Ticket};
use curbside_billing::domain::tiers::{PricingTier, TierSchedule};
use curbside_billing::domain::types::{RateType, Scope, TicketId};
use curbside_billing::gateway::{ChargeLink, PaymentGateway, RefundReceipt};
use curbside_billing::Result;
use curbside_common::{LocationId, TenantId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Gateway stand-in that hands out sequential identifiers and always
/// succeeds. Keeps integration suites independent of the network.
pub struct SequenceGateway {
    links: AtomicU64,
    refunds: AtomicU64,
}

impl SequenceGateway {
    pub fn new() -> Self {
        Self {
            links: AtomicU64::new(0),
            refunds: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl PaymentGateway for SequenceGateway {
    async fn create_charge_link(
        &self,
        _amount: Cents,
        _metadata: &HashMap<String, String>,
    ) -> Result<ChargeLink> {
        let n = self.links.fetch_add(1, Ordering::SeqCst);
        Ok(ChargeLink {
            link_id: format!("plink_{n}"),
            product_ref: format!("prod_{n}"),
        })
    }

    async fn refund(&self, _charge_ref: &str, _amount: Cents) -> Result<RefundReceipt> {
        let n = self.refunds.fetch_add(1, Ordering::SeqCst);
        Ok(RefundReceipt {
            refund_ref: format!("re_{n}"),
        })
    }
}

pub fn tenant() -> TenantId {
    TenantId::new("tenant-a").unwrap()
}

pub fn tenant_scope() -> Scope {
    Scope::tenant(tenant())
}

pub fn lot() -> LocationId {
    LocationId::new("grand-hotel-garage").unwrap()
}

pub fn standard_location() -> Location {
    Location::new(
        lot(),
        tenant(),
        825,   // 8.25% tax
        2_000, // 20% hotel share
        Cents::new(4_500),
        None,
        TierSchedule::new(vec![
            PricingTier::bounded(2, Cents::new(1_200), true),
            PricingTier::bounded(6, Cents::new(2_800), false),
            PricingTier::unbounded(Cents::new(4_200), true),
        ])
        .unwrap(),
    )
    .unwrap()
}

pub fn hourly_ticket(checked_in_at: chrono::DateTime<chrono::Utc>) -> Ticket {
    Ticket {
        id: TicketId::new(),
        tenant_id: tenant(),
        location_id: lot(),
        rate_type: RateType::Hourly,
        in_out_privileges: true,
        checked_in_at,
        checked_out_at: None,
    }
}

pub fn overnight_ticket(checked_in_at: chrono::DateTime<chrono::Utc>) -> Ticket {
    Ticket {
        rate_type: RateType::Overnight,
        ..hourly_ticket(checked_in_at)
    }
}
