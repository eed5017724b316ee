use crate::domain::money::Cents;
use crate::domain::tickets::{Location, Ticket};
use crate::domain::types::RateType;
use crate::error::{BillingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Projected charge for an open or closing ticket, in cents.
///
/// Hourly tickets resolve their ceiling elapsed hours against the tier
/// table; a ticket with zero elapsed time owes the first tier's rate, never
/// zero. Overnight tickets take the tail tier's rate, or the location's
/// overnight fallback when the table has no tail.
///
/// The caller hands in the location snapshot priced for this ticket; the
/// ledger records the resulting amount at link creation and never
/// re-resolves retroactively.
pub fn projected_amount(ticket: &Ticket, location: &Location, at: DateTime<Utc>) -> Result<Cents> {
    match ticket.rate_type {
        RateType::Overnight => Ok(location
            .tiers
            .tail()
            .map(|tier| tier.rate)
            .unwrap_or(location.overnight_rate)),
        RateType::Hourly => {
            let elapsed_hours = ticket.elapsed_hours(at);
            Ok(location.tiers.resolve_rate(elapsed_hours)?.rate)
        }
    }
}

/// The charge split for receipts and the nightly hotel statement.
///
/// `hotel_share` is the location owner's cut of the base charge, an
/// informational split; only `base + tax` is collected from the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeBreakdown {
    pub base: Cents,
    pub tax: Cents,
    pub hotel_share: Cents,
    pub total: Cents,
}

pub fn charge_breakdown(
    ticket: &Ticket,
    location: &Location,
    at: DateTime<Utc>,
) -> Result<ChargeBreakdown> {
    let base = projected_amount(ticket, location, at)?;
    let tax = base.apply_basis_points(location.tax_rate_basis_points);
    let hotel_share = base.apply_basis_points(location.hotel_share_points);
    let total = base
        .checked_add(tax)
        .ok_or(BillingError::InvalidAmount { amount: base })?;

    Ok(ChargeBreakdown {
        base,
        tax,
        hotel_share,
        total,
    })
}
