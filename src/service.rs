//! Loan service: the entry points an outer API layer calls.
//!
//! Every operation checks the caller first, then runs a read-modify-write
//! against the repository. Events are buffered per call and only published
//! to the service's store after the write succeeded.

use std::sync::{Mutex, PoisonError};

use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::Principal;
use crate::config::LoanConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore};
use crate::loan::{Loan, LoanEdits, NewLoan, Repayment};
use crate::payments::{PaymentDetails, RepaymentRecorder, ScheduleCalculator};
use crate::repository::{LoanFilter, LoanRepository, MemberDirectory};
use crate::serialization::LoanView;
use crate::state::check_transition;
use crate::types::{parse_id, LoanId, LoanStatus, MemberId};

/// application as submitted by a client; ids arrive as strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplicationRequest {
    pub member_id: String,
    pub amount: Money,
    pub purpose: String,
    /// annual rate in percent, e.g. `12` for 12%
    pub interest_rate: Decimal,
    pub term_months: u32,
    #[serde(default)]
    pub collateral: Option<String>,
    #[serde(default)]
    pub guarantors: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// partial update; absent fields stay as they are
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanUpdateRequest {
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub purpose: Option<String>,
    /// annual rate in percent
    #[serde(default)]
    pub interest_rate: Option<Decimal>,
    #[serde(default)]
    pub term_months: Option<u32>,
    #[serde(default)]
    pub collateral: Option<String>,
    #[serde(default)]
    pub guarantors: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<LoanStatus>,
}

impl LoanUpdateRequest {
    pub fn status(status: LoanStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// result of a recorded repayment, with the loan as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentReceipt {
    pub loan: Loan,
    pub repayment: Repayment,
    pub loan_completed: bool,
}

/// guarantor ids split into resolved members and dropped raw input
struct ResolvedGuarantors {
    members: Vec<MemberId>,
    dropped: Vec<String>,
}

/// loan lifecycle service over a repository and a member directory
pub struct LoanService<R, M> {
    repository: R,
    members: M,
    config: LoanConfig,
    time: SafeTimeProvider,
    events: Mutex<EventStore>,
}

impl<R: LoanRepository, M: MemberDirectory> LoanService<R, M> {
    pub fn new(repository: R, members: M, config: LoanConfig, time: SafeTimeProvider) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repository,
            members,
            config,
            time,
            events: Mutex::new(EventStore::new()),
        })
    }

    pub fn config(&self) -> &LoanConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn members(&self) -> &M {
        &self.members
    }

    /// drain events published since the last call
    pub fn take_events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_events()
    }

    /// submit a new application; the loan starts pending with no schedule
    pub fn create_application(
        &self,
        principal: Option<&Principal>,
        request: LoanApplicationRequest,
    ) -> Result<Loan> {
        let principal = self.config.access.require_authenticated(principal)?;

        let member_id = parse_id(&request.member_id, "member")?;
        if !self.members.member_exists(member_id)? {
            return Err(LoanError::MemberNotFound { id: member_id });
        }

        let guarantors = self.resolve_guarantors(&request.guarantors)?;
        let now = self.time.now();
        let mut events = EventStore::new();

        let loan = Loan::open(
            NewLoan {
                member_id,
                amount: request.amount,
                purpose: request.purpose,
                interest_rate: Rate::from_percent(request.interest_rate),
                term_months: request.term_months,
                collateral: request.collateral,
                guarantors: guarantors.members,
                notes: request.notes,
            },
            now,
            &mut events,
        )?;
        self.report_dropped(loan.id, guarantors.dropped, &mut events);

        let stored = self.repository.insert(&loan)?;
        info!(
            loan_id = %stored.id,
            member_id = %member_id,
            submitted_by = %principal.id,
            amount = %stored.amount,
            "loan application created"
        );
        self.publish(events);

        Ok(stored)
    }

    /// edit fields and optionally move the loan through the transition table
    ///
    /// Field overrides land before the status change, so an approval in the
    /// same request schedules from the overridden amount, rate and term.
    pub fn update_loan(
        &self,
        principal: Option<&Principal>,
        loan_id: &str,
        request: LoanUpdateRequest,
    ) -> Result<Loan> {
        let principal = self.config.access.require_elevated(principal)?;
        let loan_id = parse_id(loan_id, "loan")?;
        let mut loan = self.load(loan_id)?;
        let expected_version = loan.version;

        if let Some(status) = request.status {
            check_transition(loan.status, status)?;
        }

        let guarantors = match &request.guarantors {
            Some(raw) if !raw.is_empty() => Some(self.resolve_guarantors(raw)?),
            _ => None,
        };

        let now = self.time.now();
        let mut events = EventStore::new();
        let edits = LoanEdits {
            amount: request.amount,
            purpose: request.purpose,
            interest_rate: request.interest_rate.map(Rate::from_percent),
            term_months: request.term_months,
            collateral: request.collateral,
            guarantors: guarantors.as_ref().map(|g| g.members.clone()),
            notes: request.notes,
        };
        loan.apply_edits(edits, principal.id, now, &mut events)?;

        if let Some(status) = request.status {
            loan.request_status(status, principal.id, &self.calculator(), now, &mut events)?;
        }
        if let Some(guarantors) = guarantors {
            self.report_dropped(loan.id, guarantors.dropped, &mut events);
        }

        let stored = self.persist(&loan, expected_version)?;
        self.publish(events);

        Ok(stored)
    }

    /// mark one scheduled repayment paid
    pub fn record_repayment(
        &self,
        principal: Option<&Principal>,
        loan_id: &str,
        repayment_id: &str,
        details: PaymentDetails,
    ) -> Result<RepaymentReceipt> {
        let principal = self.config.access.require_authenticated(principal)?;
        let loan_id = parse_id(loan_id, "loan")?;
        let repayment_id = parse_id(repayment_id, "repayment")?;

        let mut loan = self.load(loan_id)?;
        let expected_version = loan.version;
        let mut events = EventStore::new();

        let outcome = RepaymentRecorder::new(&self.config.repayment).record(
            &mut loan,
            repayment_id,
            &details,
            self.time.now(),
            &mut events,
        )?;

        // status and repayments go out in one write
        let stored = self.persist(&loan, expected_version)?;
        info!(
            loan_id = %loan_id,
            repayment_id = %repayment_id,
            recorded_by = %principal.id,
            status = %stored.status,
            "repayment saved"
        );
        self.publish(events);

        Ok(RepaymentReceipt {
            loan: stored,
            repayment: outcome.repayment,
            loan_completed: outcome.loan_completed,
        })
    }

    /// one loan with member, approver and guarantor names
    pub fn get_loan(&self, principal: Option<&Principal>, loan_id: &str) -> Result<LoanView> {
        self.config.access.require_authenticated(principal)?;
        let loan_id = parse_id(loan_id, "loan")?;
        let loan = self.load(loan_id)?;
        LoanView::build(&loan, &self.members, &self.calculator())
    }

    /// loans matching the filter, newest first
    pub fn list_loans(&self, principal: Option<&Principal>, filter: &LoanFilter) -> Result<Vec<LoanView>> {
        self.config.access.require_authenticated(principal)?;
        let calculator = self.calculator();
        self.repository
            .list(filter)?
            .iter()
            .map(|loan| LoanView::build(loan, &self.members, &calculator))
            .collect()
    }

    fn calculator(&self) -> ScheduleCalculator {
        ScheduleCalculator::new(self.config.schedule.rounding)
    }

    fn load(&self, loan_id: LoanId) -> Result<Loan> {
        self.repository
            .get(loan_id)?
            .ok_or(LoanError::LoanNotFound { id: loan_id })
    }

    fn persist(&self, loan: &Loan, expected_version: u64) -> Result<Loan> {
        self.repository.replace(loan, expected_version).map_err(|err| {
            if let LoanError::VersionConflict { expected, found, .. } = &err {
                warn!(loan_id = %loan.id, expected, found, "concurrent loan update rejected");
            }
            err
        })
    }

    fn resolve_guarantors(&self, raw: &[String]) -> Result<ResolvedGuarantors> {
        let mut resolved = ResolvedGuarantors {
            members: Vec::with_capacity(raw.len()),
            dropped: Vec::new(),
        };

        for candidate in raw {
            let id = match parse_id(candidate, "guarantor") {
                Ok(id) => id,
                Err(_) => {
                    resolved.dropped.push(candidate.clone());
                    continue;
                }
            };
            if self.members.member_exists(id)? {
                resolved.members.push(id);
            } else {
                resolved.dropped.push(candidate.clone());
            }
        }

        Ok(resolved)
    }

    fn report_dropped(&self, loan_id: LoanId, dropped: Vec<String>, events: &mut EventStore) {
        let now = self.time.now();
        for guarantor in dropped {
            warn!(loan_id = %loan_id, guarantor = %guarantor, "unknown guarantor dropped");
            events.emit(Event::GuarantorDropped {
                loan_id,
                guarantor,
                timestamp: now,
            });
        }
    }

    fn publish(&self, mut events: EventStore) {
        let mut store = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        store.extend(events.take_events());
    }
}
