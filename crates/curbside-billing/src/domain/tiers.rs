use crate::domain::money::Cents;
use crate::error::{BillingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper duration bound of a pricing tier, in whole hours.
///
/// `Unbounded` marks the tail (overnight) tier. The derived `Ord` sorts
/// every bounded value before `Unbounded`, which is what validation and
/// resolution rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierBound {
    Hours(u32),
    Unbounded,
}

impl TierBound {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, TierBound::Unbounded)
    }

    /// Inclusive upper bound: a tier covers an elapsed duration equal to
    /// its bound.
    pub fn covers(&self, elapsed_hours: u32) -> bool {
        match self {
            TierBound::Hours(hours) => *hours >= elapsed_hours,
            TierBound::Unbounded => true,
        }
    }
}

impl fmt::Display for TierBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierBound::Hours(hours) => write!(f, "{}h", hours),
            TierBound::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// A single pricing tier: duration bound, rate, and whether tickets priced
/// in this tier may exit and return without closing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTier {
    pub bound: TierBound,
    pub rate: Cents,
    pub in_out_privileges: bool,
}

impl PricingTier {
    pub fn bounded(hours: u32, rate: Cents, in_out_privileges: bool) -> Self {
        Self {
            bound: TierBound::Hours(hours),
            rate,
            in_out_privileges,
        }
    }

    pub fn unbounded(rate: Cents, in_out_privileges: bool) -> Self {
        Self {
            bound: TierBound::Unbounded,
            rate,
            in_out_privileges,
        }
    }
}

/// The rate resolved for a ticket's elapsed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateResolution {
    pub rate: Cents,
    pub grants_in_out: bool,
}

/// A location's ordered tier table.
///
/// Construction validates ordering, so any `TierSchedule` in hand is sorted
/// strictly ascending with at most one unbounded tail. Deserialization goes
/// through the same validation, so schedules loaded from storage are
/// re-checked rather than trusted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<PricingTier>", into = "Vec<PricingTier>")]
pub struct TierSchedule {
    tiers: Vec<PricingTier>,
}

impl TierSchedule {
    pub fn new(tiers: Vec<PricingTier>) -> Result<Self> {
        Self::validate_tiers(&tiers)?;
        Ok(Self { tiers })
    }

    pub fn empty() -> Self {
        Self { tiers: Vec::new() }
    }

    /// Ordering rules, enforced on every write path:
    /// strictly ascending bounds, no duplicates, unbounded (if present) last
    /// and unique, no negative rates.
    pub fn validate_tiers(tiers: &[PricingTier]) -> Result<()> {
        for tier in tiers {
            if tier.rate < Cents::ZERO {
                return Err(BillingError::InvalidAmount { amount: tier.rate });
            }
        }

        for pair in tiers.windows(2) {
            let (prev, next) = (&pair[0].bound, &pair[1].bound);

            match (prev, next) {
                (TierBound::Hours(a), TierBound::Hours(b)) if a == b => {
                    return Err(BillingError::DuplicateTierBound { hours: *a });
                }
                (TierBound::Unbounded, TierBound::Unbounded) => {
                    return Err(BillingError::InvalidTierOrder {
                        detail: "more than one unbounded tier".to_string(),
                    });
                }
                _ => {}
            }

            if prev >= next {
                return Err(BillingError::InvalidTierOrder {
                    detail: format!("{} does not precede {}", prev, next),
                });
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        Self::validate_tiers(&self.tiers)
    }

    /// Resolve an elapsed duration to a rate: the first tier whose bound
    /// covers it (bounds are inclusive), falling back to the unbounded tail.
    pub fn resolve_rate(&self, elapsed_hours: u32) -> Result<RateResolution> {
        self.tiers
            .iter()
            .find(|tier| tier.bound.covers(elapsed_hours))
            .map(|tier| RateResolution {
                rate: tier.rate,
                grants_in_out: tier.in_out_privileges,
            })
            .ok_or(BillingError::NoApplicableTier { elapsed_hours })
    }

    /// The unbounded tail tier, if present.
    pub fn tail(&self) -> Option<&PricingTier> {
        self.tiers.last().filter(|tier| tier.bound.is_unbounded())
    }

    /// All bounded (non-tail) tiers.
    pub fn bounded(&self) -> impl Iterator<Item = &PricingTier> {
        self.tiers.iter().filter(|tier| !tier.bound.is_unbounded())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricingTier> {
        self.tiers.iter()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl TryFrom<Vec<PricingTier>> for TierSchedule {
    type Error = BillingError;

    fn try_from(tiers: Vec<PricingTier>) -> Result<Self> {
        Self::new(tiers)
    }
}

impl From<TierSchedule> for Vec<PricingTier> {
    fn from(schedule: TierSchedule) -> Self {
        schedule.tiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tier() -> TierSchedule {
        TierSchedule::new(vec![
            PricingTier::bounded(2, Cents::new(1_000), false),
            PricingTier::unbounded(Cents::new(4_000), true),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_out_of_order_bounds() {
        let result = TierSchedule::new(vec![
            PricingTier::bounded(4, Cents::new(2_000), false),
            PricingTier::bounded(2, Cents::new(1_000), false),
        ]);
        assert!(matches!(
            result,
            Err(BillingError::InvalidTierOrder { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_bounds() {
        let result = TierSchedule::new(vec![
            PricingTier::bounded(2, Cents::new(1_000), false),
            PricingTier::bounded(2, Cents::new(2_000), false),
        ]);
        assert!(matches!(
            result,
            Err(BillingError::DuplicateTierBound { hours: 2 })
        ));
    }

    #[test]
    fn rejects_unbounded_before_bounded() {
        let result = TierSchedule::new(vec![
            PricingTier::unbounded(Cents::new(4_000), false),
            PricingTier::bounded(2, Cents::new(1_000), false),
        ]);
        assert!(matches!(
            result,
            Err(BillingError::InvalidTierOrder { .. })
        ));
    }

    #[test]
    fn rejects_second_unbounded_tier() {
        let result = TierSchedule::new(vec![
            PricingTier::unbounded(Cents::new(4_000), false),
            PricingTier::unbounded(Cents::new(5_000), false),
        ]);
        assert!(matches!(
            result,
            Err(BillingError::InvalidTierOrder { .. })
        ));
    }

    #[test]
    fn rejects_negative_rate() {
        let result = TierSchedule::new(vec![PricingTier::bounded(2, Cents::new(-100), false)]);
        assert!(matches!(result, Err(BillingError::InvalidAmount { .. })));
    }

    #[test]
    fn boundary_is_inclusive() {
        let schedule = two_tier();

        // Exactly at the 2h bound resolves to the 2h tier
        assert_eq!(
            schedule.resolve_rate(2).unwrap().rate,
            Cents::new(1_000)
        );
        // Past the bound rolls to the tail
        assert_eq!(
            schedule.resolve_rate(3).unwrap().rate,
            Cents::new(4_000)
        );
    }

    #[test]
    fn zero_elapsed_resolves_first_tier() {
        let schedule = two_tier();
        assert_eq!(schedule.resolve_rate(0).unwrap().rate, Cents::new(1_000));
    }

    #[test]
    fn no_applicable_tier_without_tail() {
        let schedule =
            TierSchedule::new(vec![PricingTier::bounded(2, Cents::new(1_000), false)]).unwrap();

        assert_eq!(schedule.resolve_rate(2).unwrap().rate, Cents::new(1_000));
        assert!(matches!(
            schedule.resolve_rate(3),
            Err(BillingError::NoApplicableTier { elapsed_hours: 3 })
        ));
    }

    #[test]
    fn empty_schedule_never_resolves() {
        let schedule = TierSchedule::empty();
        assert!(matches!(
            schedule.resolve_rate(0),
            Err(BillingError::NoApplicableTier { .. })
        ));
    }

    #[test]
    fn deserialization_revalidates() {
        let json = r#"[
            {"bound": {"hours": 4}, "rate": 2000, "in_out_privileges": false},
            {"bound": {"hours": 2}, "rate": 1000, "in_out_privileges": false}
        ]"#;
        let result: std::result::Result<TierSchedule, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn tail_and_bounded_accessors() {
        let schedule = two_tier();
        assert_eq!(schedule.tail().unwrap().rate, Cents::new(4_000));
        assert_eq!(schedule.bounded().count(), 1);

        let no_tail =
            TierSchedule::new(vec![PricingTier::bounded(2, Cents::new(1_000), false)]).unwrap();
        assert!(no_tail.tail().is_none());
    }
}
