use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RepaymentConfig;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore};
use crate::loan::{Loan, Repayment};
use crate::payments::{non_blank, PaymentDetails};
use crate::state::{can_auto_complete, Transition};
use crate::types::{LoanStatus, RepaymentId, RepaymentStatus};

/// result of recording one installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub repayment: Repayment,
    pub loan_status: LoanStatus,
    /// whether this payment moved the loan to completed
    pub loan_completed: bool,
}

/// applies payments against scheduled installments
pub struct RepaymentRecorder<'a> {
    config: &'a RepaymentConfig,
}

impl<'a> RepaymentRecorder<'a> {
    pub fn new(config: &'a RepaymentConfig) -> Self {
        Self { config }
    }

    /// mark one installment paid, then complete the loan if nothing is left
    pub fn record(
        &self,
        loan: &mut Loan,
        repayment_id: RepaymentId,
        details: &PaymentDetails,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<RecordOutcome> {
        details.validate()?;

        let loan_id = loan.id;
        let payment_method =
            non_blank(&details.payment_method).unwrap_or_else(|| self.config.default_payment_method.clone());

        let repayment = loan.repayment_mut(repayment_id)?;
        if repayment.is_completed() {
            return Err(LoanError::RepaymentAlreadyCompleted { repayment_id });
        }

        if let Some(amount) = details.amount {
            repayment.amount = amount;
        }
        repayment.status = RepaymentStatus::Completed;
        repayment.payment_method = payment_method;
        repayment.transaction_id = non_blank(&details.transaction_id).unwrap_or_default();
        repayment.notes = non_blank(&details.notes).unwrap_or_default();
        repayment.paid_at = Some(now);
        let repayment = repayment.clone();

        loan.touch(now);
        debug!(
            loan_id = %loan_id,
            installment = repayment.installment_number,
            amount = %repayment.amount,
            "repayment recorded"
        );
        events.emit(Event::RepaymentRecorded {
            loan_id,
            repayment_id,
            amount: repayment.amount,
            payment_method: repayment.payment_method.clone(),
            timestamp: now,
        });

        let loan_completed = loan.all_repayments_completed() && can_auto_complete(loan.status);
        if loan_completed {
            loan.set_status(Transition::Complete.target(), now, events);
            info!(loan_id = %loan_id, paid = %loan.amount_paid(), "loan fully repaid");
            events.emit(Event::LoanCompleted {
                loan_id,
                forced: false,
                timestamp: now,
            });
        }

        Ok(RecordOutcome {
            repayment,
            loan_status: loan.status,
            loan_completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoundingPolicy;
    use crate::decimal::{Money, Rate};
    use crate::loan::NewLoan;
    use crate::payments::ScheduleCalculator;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap()
    }

    fn active_loan(term: u32, events: &mut EventStore) -> Loan {
        let mut loan = Loan::open(
            NewLoan {
                member_id: Uuid::new_v4(),
                amount: Money::from_major(300),
                purpose: "stock for shop".to_string(),
                interest_rate: Rate::from_percentage(12),
                term_months: term,
                collateral: None,
                guarantors: Vec::new(),
                notes: None,
            },
            now(),
            events,
        )
        .unwrap();
        loan.approve(
            Uuid::new_v4(),
            &ScheduleCalculator::new(RoundingPolicy::Unreconciled),
            now(),
            events,
        )
        .unwrap();
        loan
    }

    #[test]
    fn test_defaults_applied() {
        let config = RepaymentConfig::default();
        let recorder = RepaymentRecorder::new(&config);
        let mut events = EventStore::new();
        let mut loan = active_loan(3, &mut events);
        let id = loan.repayments[0].id;
        let paid_at = now() + Duration::days(30);

        let outcome = recorder
            .record(&mut loan, id, &PaymentDetails::cash(), paid_at, &mut events)
            .unwrap();

        assert_eq!(outcome.repayment.status, RepaymentStatus::Completed);
        assert_eq!(outcome.repayment.payment_method, "Cash");
        assert_eq!(outcome.repayment.transaction_id, "");
        assert_eq!(outcome.repayment.notes, "");
        assert_eq!(outcome.repayment.paid_at, Some(paid_at));
        assert_eq!(outcome.loan_status, LoanStatus::Active);
        assert!(!outcome.loan_completed);
        assert_eq!(loan.updated_at, paid_at);
    }

    #[test]
    fn test_last_payment_completes_loan() {
        let config = RepaymentConfig::default();
        let recorder = RepaymentRecorder::new(&config);
        let mut events = EventStore::new();
        let mut loan = active_loan(3, &mut events);
        let ids: Vec<_> = loan.repayments.iter().map(|r| r.id).collect();

        for id in &ids[..2] {
            let outcome = recorder
                .record(&mut loan, *id, &PaymentDetails::cash(), now(), &mut events)
                .unwrap();
            assert_eq!(outcome.loan_status, LoanStatus::Active);
        }

        events.clear();
        let outcome = recorder
            .record(
                &mut loan,
                ids[2],
                &PaymentDetails::cash().with_method("M-Pesa").with_transaction("QF71ZK"),
                now(),
                &mut events,
            )
            .unwrap();

        assert!(outcome.loan_completed);
        assert_eq!(outcome.loan_status, LoanStatus::Completed);
        assert_eq!(loan.status, LoanStatus::Completed);
        assert_eq!(outcome.repayment.transaction_id, "QF71ZK");
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, Event::LoanCompleted { forced: false, .. })));
    }

    #[test]
    fn test_out_of_order_payment_does_not_complete() {
        let config = RepaymentConfig::default();
        let recorder = RepaymentRecorder::new(&config);
        let mut events = EventStore::new();
        let mut loan = active_loan(3, &mut events);
        let last = loan.repayments[2].id;

        let outcome = recorder
            .record(&mut loan, last, &PaymentDetails::cash(), now(), &mut events)
            .unwrap();

        assert!(!outcome.loan_completed);
        assert_eq!(loan.status, LoanStatus::Active);
    }

    #[test]
    fn test_amount_override() {
        let config = RepaymentConfig::default();
        let recorder = RepaymentRecorder::new(&config);
        let mut events = EventStore::new();
        let mut loan = active_loan(3, &mut events);
        let id = loan.repayments[1].id;

        recorder
            .record(
                &mut loan,
                id,
                &PaymentDetails::cash().with_amount(Money::from_major(150)),
                now(),
                &mut events,
            )
            .unwrap();

        assert_eq!(loan.repayments[1].amount, Money::from_major(150));
        assert_eq!(loan.amount_paid(), Money::from_major(150));
    }

    #[test]
    fn test_unknown_and_repeated_repayments() {
        let config = RepaymentConfig::default();
        let recorder = RepaymentRecorder::new(&config);
        let mut events = EventStore::new();
        let mut loan = active_loan(2, &mut events);

        let err = recorder
            .record(&mut loan, Uuid::new_v4(), &PaymentDetails::cash(), now(), &mut events)
            .unwrap_err();
        assert!(matches!(err, LoanError::RepaymentNotFound { .. }));

        let id = loan.repayments[0].id;
        recorder
            .record(&mut loan, id, &PaymentDetails::cash(), now(), &mut events)
            .unwrap();
        let err = recorder
            .record(&mut loan, id, &PaymentDetails::cash(), now() + Duration::days(1), &mut events)
            .unwrap_err();
        assert_eq!(err, LoanError::RepaymentAlreadyCompleted { repayment_id: id });
        assert_eq!(loan.repayments[0].paid_at, Some(now()));
    }

    #[test]
    fn test_defaulted_loan_stays_defaulted() {
        let config = RepaymentConfig {
            default_payment_method: "Bank".to_string(),
        };
        let recorder = RepaymentRecorder::new(&config);
        let mut events = EventStore::new();
        let mut loan = active_loan(1, &mut events);
        loan.set_status(LoanStatus::Defaulted, now(), &mut events);
        let id = loan.repayments[0].id;

        let outcome = recorder
            .record(&mut loan, id, &PaymentDetails::cash(), now(), &mut events)
            .unwrap();

        assert!(!outcome.loan_completed);
        assert_eq!(outcome.loan_status, LoanStatus::Defaulted);
        assert_eq!(outcome.repayment.payment_method, "Bank");
    }
}
