use crate::domain::money::Cents;
use crate::domain::payments::Payment;
use crate::domain::types::PaymentStatus;
use serde::{Deserialize, Serialize};

/// Reporting totals projected from a snapshot of the payment ledger.
///
/// Two accountings run side by side on purpose: the status buckets
/// (completed / pending / refunded, amounts as charged) and
/// `total_refunded_amount`, which sums every payment's cumulative refunds
/// including partials still sitting in `Completed`. Together they let a
/// report show gross collected, total refunded, and net without rescanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentsMetrics {
    pub total_count: u64,
    pub completed_count: u64,
    pub completed_amount: Cents,
    pub pending_count: u64,
    pub pending_amount: Cents,
    pub refunded_count: u64,
    pub refunded_amount: Cents,
    pub total_refunded_amount: Cents,
}

impl PaymentsMetrics {
    /// Completed charges minus all refunds. Derived for display, never
    /// stored; negative when refunds outweigh what is still completed.
    pub fn net_collected(&self) -> Cents {
        self.completed_amount.saturating_sub(self.total_refunded_amount)
    }
}

/// Single pass over a payment snapshot.
pub fn aggregate(payments: &[Payment]) -> PaymentsMetrics {
    let mut metrics = PaymentsMetrics::default();

    for payment in payments {
        metrics.total_count += 1;

        match payment.status {
            PaymentStatus::Completed => {
                metrics.completed_count += 1;
                // As charged, not net of refunds
                metrics.completed_amount = metrics.completed_amount.saturating_add(payment.amount);
            }
            PaymentStatus::Refunded => {
                metrics.refunded_count += 1;
                metrics.refunded_amount = metrics.refunded_amount.saturating_add(payment.amount);
            }
            _ => {
                metrics.pending_count += 1;
                metrics.pending_amount = metrics.pending_amount.saturating_add(payment.amount);
            }
        }

        metrics.total_refunded_amount = metrics
            .total_refunded_amount
            .saturating_add(payment.refund_amount);
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payments::Refund;
    use crate::domain::types::TicketId;
    use chrono::Utc;
    use curbside_common::TenantId;

    fn payment(amount: i64) -> Payment {
        Payment::new(
            TicketId::new(),
            TenantId::new("tenant-a").unwrap(),
            Cents::new(amount),
        )
        .unwrap()
    }

    fn completed(amount: i64) -> Payment {
        let mut p = payment(amount);
        p.mark_link_sent().unwrap();
        p.mark_completed(Utc::now()).unwrap();
        p
    }

    fn refunded_by(mut p: Payment, amount: i64, gateway_ref: &str) -> Payment {
        p.apply_refund(Refund {
            gateway_ref: gateway_ref.to_string(),
            amount: Cents::new(amount),
            reason: None,
            at: Utc::now(),
        })
        .unwrap();
        p
    }

    #[test]
    fn empty_snapshot_is_all_zero() {
        let metrics = aggregate(&[]);
        assert_eq!(metrics, PaymentsMetrics::default());
        assert_eq!(metrics.net_collected(), Cents::ZERO);
    }

    #[test]
    fn buckets_by_status() {
        let mut failed = payment(700);
        failed.mark_failed("link expired").unwrap();

        let payments = vec![
            payment(1_000),                                      // pending
            completed(2_000),                                    // completed
            refunded_by(completed(3_000), 3_000, "re_1"),        // refunded
            failed,                                              // pending bucket
        ];

        let metrics = aggregate(&payments);
        assert_eq!(metrics.total_count, 4);
        assert_eq!(metrics.completed_count, 1);
        assert_eq!(metrics.completed_amount, Cents::new(2_000));
        assert_eq!(metrics.pending_count, 2);
        assert_eq!(metrics.pending_amount, Cents::new(1_700));
        assert_eq!(metrics.refunded_count, 1);
        assert_eq!(metrics.refunded_amount, Cents::new(3_000));
        assert_eq!(metrics.total_refunded_amount, Cents::new(3_000));
    }

    #[test]
    fn partial_refunds_count_toward_total_refunded_only() {
        let partially = refunded_by(completed(5_000), 2_000, "re_1");
        let metrics = aggregate(&[partially]);

        // Still in the completed bucket, amount as charged
        assert_eq!(metrics.completed_count, 1);
        assert_eq!(metrics.completed_amount, Cents::new(5_000));
        assert_eq!(metrics.refunded_count, 0);
        assert_eq!(metrics.total_refunded_amount, Cents::new(2_000));
        assert_eq!(metrics.net_collected(), Cents::new(3_000));
    }

    #[test]
    fn net_collected_goes_negative_when_fully_refunded() {
        let metrics = aggregate(&[refunded_by(completed(4_000), 4_000, "re_1")]);
        assert_eq!(metrics.completed_amount, Cents::ZERO);
        assert_eq!(metrics.total_refunded_amount, Cents::new(4_000));
        assert_eq!(metrics.net_collected(), Cents::new(-4_000));
    }

    #[test]
    fn bucket_sums_cover_all_non_refunded_payments() {
        let payments = vec![
            payment(1_000),
            completed(2_000),
            refunded_by(completed(3_000), 1_000, "re_1"),
        ];
        let metrics = aggregate(&payments);

        let not_refunded_total: i64 = payments
            .iter()
            .filter(|p| p.status != PaymentStatus::Refunded)
            .map(|p| p.amount.as_i64())
            .sum();
        assert_eq!(
            metrics.completed_amount.saturating_add(metrics.pending_amount),
            Cents::new(not_refunded_total)
        );

        let refund_total: i64 = payments.iter().map(|p| p.refund_amount.as_i64()).sum();
        assert_eq!(metrics.total_refunded_amount, Cents::new(refund_total));
    }
}
