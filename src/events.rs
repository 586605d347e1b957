use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::{LoanId, LoanStatus, MemberId, RepaymentId};

/// lifecycle events emitted by loan operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    LoanApplied {
        loan_id: LoanId,
        member_id: MemberId,
        amount: Money,
        interest_rate: Rate,
        term_months: u32,
        timestamp: DateTime<Utc>,
    },
    LoanApproved {
        loan_id: LoanId,
        approved_by: MemberId,
        total_repayable: Money,
        installments: u32,
        timestamp: DateTime<Utc>,
    },
    LoanRejected {
        loan_id: LoanId,
        rejected_by: MemberId,
        timestamp: DateTime<Utc>,
    },
    LoanTermsEdited {
        loan_id: LoanId,
        edited_by: MemberId,
        timestamp: DateTime<Utc>,
    },
    GuarantorDropped {
        loan_id: LoanId,
        guarantor: String,
        timestamp: DateTime<Utc>,
    },
    RepaymentRecorded {
        loan_id: LoanId,
        repayment_id: RepaymentId,
        amount: Money,
        payment_method: String,
        timestamp: DateTime<Utc>,
    },
    LoanCompleted {
        loan_id: LoanId,
        forced: bool,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
