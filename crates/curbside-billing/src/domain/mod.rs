pub mod charge;
pub mod ledger;
pub mod metrics;
pub mod money;
pub mod payments;
pub mod tickets;
pub mod tiers;
pub mod types;

pub use charge::{charge_breakdown, projected_amount, ChargeBreakdown};
pub use ledger::{LedgerOperations, LedgerService};
pub use metrics::{aggregate, PaymentsMetrics};
pub use money::Cents;
pub use payments::{Payment, Refund};
pub use tickets::{has_in_out_privileges, Location, Ticket};
pub use tiers::{PricingTier, RateResolution, TierBound, TierSchedule};
pub use types::{PaymentId, PaymentStatus, RateType, Scope, TicketId};
