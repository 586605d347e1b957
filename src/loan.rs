use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore};
use crate::payments::{add_months, LoanTerms, RepaymentSchedule, ScheduleCalculator};
use crate::state::{check_transition, require_transition, Transition};
use crate::types::{LoanId, LoanStatus, MemberId, RepaymentId, RepaymentStatus};

/// one scheduled installment of a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repayment {
    pub id: RepaymentId,
    pub installment_number: u32,
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub status: RepaymentStatus,
    pub payment_method: String,
    pub transaction_id: String,
    pub notes: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Repayment {
    pub fn is_completed(&self) -> bool {
        self.status == RepaymentStatus::Completed
    }
}

/// a member's loan and its repayment schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub member_id: MemberId,
    pub amount: Money,
    pub purpose: String,
    pub interest_rate: Rate,
    pub term_months: u32,
    pub status: LoanStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub approved_by: Option<MemberId>,
    pub approval_date: Option<DateTime<Utc>>,
    pub collateral: Option<String>,
    pub guarantors: Vec<MemberId>,
    pub repayments: Vec<Repayment>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// bumped by the repository on every successful replace
    pub version: u64,
}

/// validated input for a new application; guarantors already resolved
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub member_id: MemberId,
    pub amount: Money,
    pub purpose: String,
    pub interest_rate: Rate,
    pub term_months: u32,
    pub collateral: Option<String>,
    pub guarantors: Vec<MemberId>,
    pub notes: Option<String>,
}

/// field edits applied alongside an update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoanEdits {
    pub amount: Option<Money>,
    pub purpose: Option<String>,
    pub interest_rate: Option<Rate>,
    pub term_months: Option<u32>,
    /// an empty string clears the collateral
    pub collateral: Option<String>,
    /// replaces the current list when present, even with an empty one
    pub guarantors: Option<Vec<MemberId>>,
    pub notes: Option<String>,
}

impl LoanEdits {
    pub fn is_empty(&self) -> bool {
        *self == LoanEdits::default()
    }

    fn touches_terms(&self) -> bool {
        self.amount.is_some() || self.interest_rate.is_some() || self.term_months.is_some()
    }
}

impl Loan {
    /// open a pending application with an empty schedule
    pub fn open(application: NewLoan, now: DateTime<Utc>, events: &mut EventStore) -> Result<Self> {
        LoanTerms::new(
            application.amount,
            application.interest_rate,
            application.term_months,
        )?;
        let purpose = required_text(application.purpose, "purpose")?;

        let loan = Self {
            id: Uuid::new_v4(),
            member_id: application.member_id,
            amount: application.amount,
            purpose,
            interest_rate: application.interest_rate,
            term_months: application.term_months,
            status: LoanStatus::Pending,
            start_date: None,
            end_date: None,
            approved_by: None,
            approval_date: None,
            collateral: optional_text(application.collateral),
            guarantors: application.guarantors,
            repayments: Vec::new(),
            notes: optional_text(application.notes),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        events.emit(Event::LoanApplied {
            loan_id: loan.id,
            member_id: loan.member_id,
            amount: loan.amount,
            interest_rate: loan.interest_rate,
            term_months: loan.term_months,
            timestamp: now,
        });

        Ok(loan)
    }

    /// current principal, rate and term
    pub fn terms(&self) -> LoanTerms {
        LoanTerms {
            principal: self.amount,
            annual_rate: self.interest_rate,
            term_months: self.term_months,
        }
    }

    /// total owed on the current terms, rounded as `calculator` would schedule it
    pub fn total_repayable(&self, calculator: &ScheduleCalculator) -> Result<Money> {
        calculator.total_repayable(&self.terms())
    }

    /// sum of every scheduled installment, paid or not
    pub fn scheduled_total(&self) -> Money {
        self.repayments.iter().map(|r| r.amount).sum()
    }

    pub fn amount_paid(&self) -> Money {
        self.repayments
            .iter()
            .filter(|r| r.is_completed())
            .map(|r| r.amount)
            .sum()
    }

    pub fn outstanding_balance(&self) -> Money {
        self.repayments
            .iter()
            .filter(|r| !r.is_completed())
            .map(|r| r.amount)
            .sum()
    }

    pub fn pending_repayments(&self) -> impl Iterator<Item = &Repayment> {
        self.repayments.iter().filter(|r| !r.is_completed())
    }

    /// earliest unpaid installment
    pub fn next_due(&self) -> Option<&Repayment> {
        self.pending_repayments().next()
    }

    /// true only when a schedule exists and every entry is completed
    pub fn all_repayments_completed(&self) -> bool {
        !self.repayments.is_empty() && self.repayments.iter().all(Repayment::is_completed)
    }

    pub fn repayment(&self, repayment_id: RepaymentId) -> Option<&Repayment> {
        self.repayments.iter().find(|r| r.id == repayment_id)
    }

    pub(crate) fn repayment_mut(&mut self, repayment_id: RepaymentId) -> Result<&mut Repayment> {
        let loan_id = self.id;
        self.repayments
            .iter_mut()
            .find(|r| r.id == repayment_id)
            .ok_or(LoanError::RepaymentNotFound {
                loan_id,
                repayment_id,
            })
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// apply field edits; the schedule is never regenerated here
    pub fn apply_edits(
        &mut self,
        edits: LoanEdits,
        actor: MemberId,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<()> {
        if edits.touches_terms() {
            LoanTerms::new(
                edits.amount.unwrap_or(self.amount),
                edits.interest_rate.unwrap_or(self.interest_rate),
                edits.term_months.unwrap_or(self.term_months),
            )?;
        }

        let purpose = edits
            .purpose
            .clone()
            .map(|p| required_text(p, "purpose"))
            .transpose()?;
        let changed = !edits.is_empty();

        if let Some(amount) = edits.amount {
            self.amount = amount;
        }
        if let Some(rate) = edits.interest_rate {
            self.interest_rate = rate;
        }
        if let Some(term) = edits.term_months {
            self.term_months = term;
        }
        if let Some(purpose) = purpose {
            self.purpose = purpose;
        }
        if let Some(collateral) = edits.collateral {
            self.collateral = optional_text(Some(collateral));
        }
        if let Some(notes) = edits.notes {
            self.notes = optional_text(Some(notes));
        }
        if let Some(guarantors) = edits.guarantors {
            self.guarantors = guarantors;
        }

        if changed {
            debug!(loan_id = %self.id, status = %self.status, "loan fields edited");
            events.emit(Event::LoanTermsEdited {
                loan_id: self.id,
                edited_by: actor,
                timestamp: now,
            });
        }
        self.touch(now);

        Ok(())
    }

    /// move to an explicitly requested status through the transition table
    pub fn request_status(
        &mut self,
        requested: LoanStatus,
        actor: MemberId,
        calculator: &ScheduleCalculator,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<Option<Transition>> {
        let transition = match check_transition(self.status, requested)? {
            Some(transition) => transition,
            None => return Ok(None),
        };

        match transition {
            Transition::Approve => {
                self.approve(actor, calculator, now, events)?;
            }
            Transition::Reject => self.reject(actor, now, events)?,
            Transition::ForceComplete => self.force_complete(now, events)?,
            Transition::Default => self.set_status(LoanStatus::Defaulted, now, events),
            Transition::Complete => self.set_status(LoanStatus::Completed, now, events),
        }

        Ok(Some(transition))
    }

    /// pending -> active: stamp dates and approver, generate the schedule
    /// from the terms currently on the loan
    pub fn approve(
        &mut self,
        actor: MemberId,
        calculator: &ScheduleCalculator,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<RepaymentSchedule> {
        require_transition(self.status, Transition::Approve)?;

        let schedule = calculator.calculate(self.terms(), now)?;
        let end_date = add_months(now, self.term_months)?;

        self.repayments = schedule
            .installments
            .iter()
            .map(|installment| Repayment {
                id: Uuid::new_v4(),
                installment_number: installment.installment_number,
                amount: installment.amount,
                date: installment.due_date,
                status: RepaymentStatus::Pending,
                payment_method: String::new(),
                transaction_id: String::new(),
                notes: String::new(),
                paid_at: None,
                created_at: now,
            })
            .collect();
        self.start_date = Some(now);
        self.end_date = Some(end_date);
        self.approved_by = Some(actor);
        self.approval_date = Some(now);
        self.set_status(LoanStatus::Active, now, events);

        info!(
            loan_id = %self.id,
            total_repayable = %schedule.total_repayable,
            installments = schedule.installments.len(),
            "loan approved"
        );
        events.emit(Event::LoanApproved {
            loan_id: self.id,
            approved_by: actor,
            total_repayable: schedule.total_repayable,
            installments: self.term_months,
            timestamp: now,
        });

        Ok(schedule)
    }

    /// pending -> rejected, no schedule
    pub fn reject(&mut self, actor: MemberId, now: DateTime<Utc>, events: &mut EventStore) -> Result<()> {
        require_transition(self.status, Transition::Reject)?;
        self.set_status(LoanStatus::Rejected, now, events);

        info!(loan_id = %self.id, "loan rejected");
        events.emit(Event::LoanRejected {
            loan_id: self.id,
            rejected_by: actor,
            timestamp: now,
        });
        Ok(())
    }

    /// active -> completed by edit; pending repayments are flipped without
    /// payment metadata
    pub fn force_complete(&mut self, now: DateTime<Utc>, events: &mut EventStore) -> Result<()> {
        require_transition(self.status, Transition::ForceComplete)?;

        let mut flipped = 0;
        for repayment in self.repayments.iter_mut().filter(|r| r.status == RepaymentStatus::Pending) {
            repayment.status = RepaymentStatus::Completed;
            flipped += 1;
        }
        self.set_status(LoanStatus::Completed, now, events);

        info!(loan_id = %self.id, flipped, "loan force-completed");
        events.emit(Event::LoanCompleted {
            loan_id: self.id,
            forced: true,
            timestamp: now,
        });
        Ok(())
    }

    pub(crate) fn set_status(&mut self, new_status: LoanStatus, now: DateTime<Utc>, events: &mut EventStore) {
        let old_status = self.status;
        self.status = new_status;
        self.touch(now);

        events.emit(Event::StatusChanged {
            loan_id: self.id,
            old_status,
            new_status,
            timestamp: now,
        });
    }
}

fn required_text(value: String, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoanError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoundingPolicy;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn application(amount: i64, rate: u32, term: u32) -> NewLoan {
        NewLoan {
            member_id: Uuid::new_v4(),
            amount: Money::from_major(amount),
            purpose: "school fees".to_string(),
            interest_rate: Rate::from_percentage(rate),
            term_months: term,
            collateral: None,
            guarantors: Vec::new(),
            notes: Some("  ".to_string()),
        }
    }

    fn calculator() -> ScheduleCalculator {
        ScheduleCalculator::new(RoundingPolicy::Unreconciled)
    }

    #[test]
    fn test_open_is_pending_with_empty_schedule() {
        let mut events = EventStore::new();
        let loan = Loan::open(application(1_200, 12, 12), now(), &mut events).unwrap();

        assert_eq!(loan.status, LoanStatus::Pending);
        assert!(loan.repayments.is_empty());
        assert!(loan.start_date.is_none());
        assert!(loan.notes.is_none());
        assert_eq!(loan.created_at, loan.updated_at);
        assert!(matches!(events.events()[0], Event::LoanApplied { .. }));
    }

    #[test]
    fn test_open_validates_input() {
        let mut events = EventStore::new();

        let mut app = application(1_200, 12, 12);
        app.purpose = "   ".to_string();
        assert!(matches!(
            Loan::open(app, now(), &mut events),
            Err(LoanError::Validation { .. })
        ));

        assert!(Loan::open(application(1_200, 12, 0), now(), &mut events).is_err());
        assert!(Loan::open(application(0, 12, 12), now(), &mut events).is_err());
        assert!(events.events().is_empty());
    }

    #[test]
    fn test_approve_generates_schedule() {
        let mut events = EventStore::new();
        let mut loan = Loan::open(application(1_200, 12, 12), now(), &mut events).unwrap();
        let admin = Uuid::new_v4();

        let schedule = loan.approve(admin, &calculator(), now(), &mut events).unwrap();

        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.repayments.len(), 12);
        assert!(loan.repayments.iter().all(|r| r.status == RepaymentStatus::Pending));
        assert_eq!(loan.approved_by, Some(admin));
        assert_eq!(loan.approval_date, Some(now()));
        assert_eq!(loan.start_date, Some(now()));
        assert_eq!(loan.end_date, Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()));
        assert_eq!(loan.scheduled_total(), schedule.total_repayable);
        assert_eq!(loan.total_repayable(&calculator()).unwrap(), Money::from_major(1_344));
        assert_eq!(loan.outstanding_balance(), Money::from_major(1_344));
        assert_eq!(loan.next_due().map(|r| r.installment_number), Some(1));
    }

    #[test]
    fn test_approve_twice_fails() {
        let mut events = EventStore::new();
        let mut loan = Loan::open(application(1_200, 12, 12), now(), &mut events).unwrap();
        loan.approve(Uuid::new_v4(), &calculator(), now(), &mut events).unwrap();
        let ids: Vec<_> = loan.repayments.iter().map(|r| r.id).collect();

        let err = loan.approve(Uuid::new_v4(), &calculator(), now(), &mut events).unwrap_err();
        assert!(matches!(err, LoanError::InvalidTransition { .. }));
        // schedule untouched
        assert_eq!(loan.repayments.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn test_reject_leaves_schedule_empty() {
        let mut events = EventStore::new();
        let mut loan = Loan::open(application(500, 10, 6), now(), &mut events).unwrap();

        loan.reject(Uuid::new_v4(), now(), &mut events).unwrap();
        assert_eq!(loan.status, LoanStatus::Rejected);
        assert!(loan.repayments.is_empty());

        // terminal
        assert!(loan
            .request_status(LoanStatus::Active, Uuid::new_v4(), &calculator(), now(), &mut events)
            .is_err());
    }

    #[test]
    fn test_edits_on_active_loan_keep_schedule() {
        let mut events = EventStore::new();
        let mut loan = Loan::open(application(1_200, 12, 12), now(), &mut events).unwrap();
        let actor = Uuid::new_v4();
        loan.approve(actor, &calculator(), now(), &mut events).unwrap();

        loan.apply_edits(
            LoanEdits {
                amount: Some(Money::from_major(5_000)),
                term_months: Some(24),
                ..LoanEdits::default()
            },
            actor,
            now(),
            &mut events,
        )
        .unwrap();

        assert_eq!(loan.amount, Money::from_major(5_000));
        assert_eq!(loan.repayments.len(), 12);
        assert_eq!(loan.repayments[0].amount, Money::from_major(112));
    }

    #[test]
    fn test_edits_validate_terms_before_applying() {
        let mut events = EventStore::new();
        let mut loan = Loan::open(application(1_200, 12, 12), now(), &mut events).unwrap();

        let err = loan
            .apply_edits(
                LoanEdits {
                    amount: Some(Money::from_major(2_000)),
                    term_months: Some(0),
                    ..LoanEdits::default()
                },
                Uuid::new_v4(),
                now(),
                &mut events,
            )
            .unwrap_err();

        assert!(matches!(err, LoanError::Validation { .. }));
        assert_eq!(loan.amount, Money::from_major(1_200));
    }

    #[test]
    fn test_guarantor_edits() {
        let mut events = EventStore::new();
        let guarantor = Uuid::new_v4();
        let mut app = application(1_200, 12, 12);
        app.guarantors = vec![guarantor];
        let mut loan = Loan::open(app, now(), &mut events).unwrap();

        loan.apply_edits(
            LoanEdits {
                collateral: Some("title deed".to_string()),
                ..LoanEdits::default()
            },
            Uuid::new_v4(),
            now(),
            &mut events,
        )
        .unwrap();
        assert_eq!(loan.guarantors, vec![guarantor]);
        assert_eq!(loan.collateral.as_deref(), Some("title deed"));

        loan.apply_edits(
            LoanEdits {
                guarantors: Some(Vec::new()),
                ..LoanEdits::default()
            },
            Uuid::new_v4(),
            now(),
            &mut events,
        )
        .unwrap();
        assert!(loan.guarantors.is_empty());
    }

    #[test]
    fn test_force_complete_flips_pending_only() {
        let mut events = EventStore::new();
        let mut loan = Loan::open(application(300, 12, 3), now(), &mut events).unwrap();
        loan.approve(Uuid::new_v4(), &calculator(), now(), &mut events).unwrap();

        let paid_at = now();
        loan.repayments[0].status = RepaymentStatus::Completed;
        loan.repayments[0].payment_method = "M-Pesa".to_string();
        loan.repayments[0].paid_at = Some(paid_at);

        loan.request_status(LoanStatus::Completed, Uuid::new_v4(), &calculator(), now(), &mut events)
            .unwrap();

        assert_eq!(loan.status, LoanStatus::Completed);
        assert!(loan.all_repayments_completed());
        assert_eq!(loan.repayments[0].payment_method, "M-Pesa");
        assert_eq!(loan.repayments[0].paid_at, Some(paid_at));
        assert!(loan.repayments[1].paid_at.is_none());
        assert!(loan.repayments[2].payment_method.is_empty());
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut events = EventStore::new();
        let mut loan = Loan::open(application(300, 12, 3), now(), &mut events).unwrap();

        let err = loan
            .request_status(LoanStatus::Completed, Uuid::new_v4(), &calculator(), now(), &mut events)
            .unwrap_err();
        assert_eq!(
            err,
            LoanError::InvalidTransition {
                from: LoanStatus::Pending,
                to: LoanStatus::Completed,
            }
        );
    }

    #[test]
    fn test_default_by_edit() {
        let mut events = EventStore::new();
        let mut loan = Loan::open(application(300, 12, 3), now(), &mut events).unwrap();
        loan.approve(Uuid::new_v4(), &calculator(), now(), &mut events).unwrap();

        let transition = loan
            .request_status(LoanStatus::Defaulted, Uuid::new_v4(), &calculator(), now(), &mut events)
            .unwrap();

        assert_eq!(transition, Some(Transition::Default));
        assert_eq!(loan.status, LoanStatus::Defaulted);
        // schedule stays as it was
        assert_eq!(loan.repayments.len(), 3);
        assert!(!loan.all_repayments_completed());
    }
}
