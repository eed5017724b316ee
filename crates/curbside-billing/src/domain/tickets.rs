use crate::domain::money::Cents;
use crate::domain::tiers::TierSchedule;
use crate::domain::types::{RateType, TicketId};
use crate::error::{BillingError, Result};
use chrono::{DateTime, Utc};
use curbside_common::{LocationId, TenantId};
use serde::{Deserialize, Serialize};

const MAX_BASIS_POINTS: u16 = 10_000;

/// A valet location and its pricing configuration.
///
/// The location exclusively owns its tier table; nothing is shared across
/// tenants. `overnight_rate` and `overnight_in_out_privileges` are the
/// fallbacks for overnight tickets at locations without an unbounded tail
/// tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub tenant_id: TenantId,
    pub tax_rate_basis_points: u16,
    pub hotel_share_points: u16,
    pub overnight_rate: Cents,
    pub overnight_in_out_privileges: Option<bool>,
    pub tiers: TierSchedule,
}

impl Location {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: LocationId,
        tenant_id: TenantId,
        tax_rate_basis_points: u16,
        hotel_share_points: u16,
        overnight_rate: Cents,
        overnight_in_out_privileges: Option<bool>,
        tiers: TierSchedule,
    ) -> Result<Self> {
        let location = Self {
            id,
            tenant_id,
            tax_rate_basis_points,
            hotel_share_points,
            overnight_rate,
            overnight_in_out_privileges,
            tiers,
        };
        location.validate()?;
        Ok(location)
    }

    /// Re-run all configuration invariants. Runs on every repository write,
    /// not only at construction.
    pub fn validate(&self) -> Result<()> {
        if self.tax_rate_basis_points > MAX_BASIS_POINTS {
            return Err(BillingError::InvalidBasisPoints {
                field: "tax_rate_basis_points",
                value: self.tax_rate_basis_points,
            });
        }
        if self.hotel_share_points > MAX_BASIS_POINTS {
            return Err(BillingError::InvalidBasisPoints {
                field: "hotel_share_points",
                value: self.hotel_share_points,
            });
        }
        if self.overnight_rate < Cents::ZERO {
            return Err(BillingError::InvalidAmount {
                amount: self.overnight_rate,
            });
        }
        self.tiers.validate()
    }
}

/// The billing-relevant subset of a valet ticket.
///
/// `in_out_privileges` is the value stamped at intake; the current
/// entitlement is always derived via [`has_in_out_privileges`], so a later
/// tier-table change never silently rewrites a stored ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub rate_type: RateType,
    pub in_out_privileges: bool,
    pub checked_in_at: DateTime<Utc>,
    pub checked_out_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn is_closed(&self) -> bool {
        self.checked_out_at.is_some()
    }

    /// Elapsed duration in whole hours, ceiling: a valet hour begun is an
    /// hour owed. Closed tickets measure to their checkout time; open
    /// tickets measure to `at`. Clock skew that puts the end before
    /// check-in clamps to zero.
    pub fn elapsed_hours(&self, at: DateTime<Utc>) -> u32 {
        let end = self.checked_out_at.unwrap_or(at);
        let seconds = (end - self.checked_in_at).num_seconds();
        if seconds <= 0 {
            return 0;
        }
        ((seconds + 3599) / 3600) as u32
    }
}

/// Whether a ticket may exit and re-enter without closing.
///
/// The two rate types resolve differently, and the asymmetry is load-bearing
/// for downstream messaging:
/// - Overnight: the location's overnight flag when set, else the tail
///   tier's flag, else no privileges.
/// - Hourly: granted when any bounded tier in the table grants it. The
///   privilege is a location-wide capability, not a property of the tier
///   the ticket currently occupies.
pub fn has_in_out_privileges(ticket: &Ticket, location: &Location) -> bool {
    match ticket.rate_type {
        RateType::Overnight => match location.overnight_in_out_privileges {
            Some(flag) => flag,
            None => location
                .tiers
                .tail()
                .map(|tier| tier.in_out_privileges)
                .unwrap_or(false),
        },
        RateType::Hourly => location.tiers.bounded().any(|tier| tier.in_out_privileges),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tiers::PricingTier;
    use chrono::Duration;

    fn location_with(
        tiers: Vec<PricingTier>,
        overnight_in_out_privileges: Option<bool>,
    ) -> Location {
        Location::new(
            LocationId::new("lot-1").unwrap(),
            TenantId::new("tenant-a").unwrap(),
            825,
            2_000,
            Cents::new(4_500),
            overnight_in_out_privileges,
            TierSchedule::new(tiers).unwrap(),
        )
        .unwrap()
    }

    fn ticket(rate_type: RateType, checked_in_at: DateTime<Utc>) -> Ticket {
        Ticket {
            id: TicketId::new(),
            tenant_id: TenantId::new("tenant-a").unwrap(),
            location_id: LocationId::new("lot-1").unwrap(),
            rate_type,
            in_out_privileges: false,
            checked_in_at,
            checked_out_at: None,
        }
    }

    #[test]
    fn elapsed_hours_rounds_up() {
        let start = Utc::now();
        let t = ticket(RateType::Hourly, start);

        assert_eq!(t.elapsed_hours(start), 0);
        assert_eq!(t.elapsed_hours(start + Duration::minutes(1)), 1);
        assert_eq!(t.elapsed_hours(start + Duration::hours(1)), 1);
        assert_eq!(t.elapsed_hours(start + Duration::seconds(3601)), 2);
    }

    #[test]
    fn elapsed_hours_clamps_clock_skew() {
        let start = Utc::now();
        let t = ticket(RateType::Hourly, start);
        assert_eq!(t.elapsed_hours(start - Duration::minutes(5)), 0);
    }

    #[test]
    fn closed_ticket_measures_to_checkout() {
        let start = Utc::now();
        let mut t = ticket(RateType::Hourly, start);
        t.checked_out_at = Some(start + Duration::minutes(90));

        // `at` after checkout does not grow the charge
        assert_eq!(t.elapsed_hours(start + Duration::hours(10)), 2);
    }

    #[test]
    fn rejects_basis_points_above_ten_thousand() {
        let result = Location::new(
            LocationId::new("lot-1").unwrap(),
            TenantId::new("tenant-a").unwrap(),
            10_001,
            0,
            Cents::new(4_500),
            None,
            TierSchedule::empty(),
        );
        assert!(matches!(
            result,
            Err(BillingError::InvalidBasisPoints {
                field: "tax_rate_basis_points",
                ..
            })
        ));
    }

    #[test]
    fn hourly_privilege_is_location_wide_over_bounded_tiers() {
        let location = location_with(
            vec![
                PricingTier::bounded(2, Cents::new(1_000), false),
                PricingTier::bounded(6, Cents::new(2_500), true),
                PricingTier::unbounded(Cents::new(4_000), false),
            ],
            None,
        );
        let t = ticket(RateType::Hourly, Utc::now());

        // A bounded tier grants it, so every hourly ticket has it
        assert!(has_in_out_privileges(&t, &location));
    }

    #[test]
    fn hourly_ignores_tail_tier_grant() {
        // Tail grants privileges but no bounded tier does: the hourly rule
        // scans bounded tiers only.
        let location = location_with(
            vec![
                PricingTier::bounded(2, Cents::new(1_000), false),
                PricingTier::unbounded(Cents::new(4_000), true),
            ],
            None,
        );
        let t = ticket(RateType::Hourly, Utc::now());
        assert!(!has_in_out_privileges(&t, &location));
    }

    #[test]
    fn overnight_prefers_location_flag() {
        let location = location_with(
            vec![PricingTier::unbounded(Cents::new(4_000), true)],
            Some(false),
        );
        let t = ticket(RateType::Overnight, Utc::now());

        // Explicit location flag wins over the tail tier
        assert!(!has_in_out_privileges(&t, &location));
    }

    #[test]
    fn overnight_falls_back_to_tail_tier() {
        let location = location_with(vec![PricingTier::unbounded(Cents::new(4_000), true)], None);
        let t = ticket(RateType::Overnight, Utc::now());
        assert!(has_in_out_privileges(&t, &location));
    }

    #[test]
    fn overnight_without_tail_or_flag_denies() {
        let location = location_with(vec![PricingTier::bounded(2, Cents::new(1_000), true)], None);
        let t = ticket(RateType::Overnight, Utc::now());
        assert!(!has_in_out_privileges(&t, &location));
    }
}
