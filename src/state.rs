//! Loan status transition table.
//!
//! Every status change goes through [`check_transition`] before the loan is
//! touched. Terminal states have no outgoing edges.

use serde::{Deserialize, Serialize};

use crate::errors::{LoanError, Result};
use crate::types::LoanStatus;

/// the action a permitted edge performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// pending -> active, generates the schedule
    Approve,
    /// pending -> rejected
    Reject,
    /// active -> completed once every repayment is settled
    Complete,
    /// active -> completed by explicit edit, bulk-settles pending repayments
    ForceComplete,
    /// pending | approved | active -> defaulted by explicit edit
    Default,
}

impl Transition {
    pub fn target(&self) -> LoanStatus {
        match self {
            Transition::Approve => LoanStatus::Active,
            Transition::Reject => LoanStatus::Rejected,
            Transition::Complete | Transition::ForceComplete => LoanStatus::Completed,
            Transition::Default => LoanStatus::Defaulted,
        }
    }
}

impl LoanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Rejected | LoanStatus::Completed | LoanStatus::Defaulted
        )
    }
}

/// resolve an explicitly requested status into a permitted transition
///
/// `Ok(None)` means the requested status equals the current one.
pub fn check_transition(from: LoanStatus, requested: LoanStatus) -> Result<Option<Transition>> {
    if from == requested {
        return Ok(None);
    }

    let transition = match (from, requested) {
        (LoanStatus::Pending, LoanStatus::Approved | LoanStatus::Active) => Transition::Approve,
        (LoanStatus::Pending, LoanStatus::Rejected) => Transition::Reject,
        (LoanStatus::Active, LoanStatus::Completed) => Transition::ForceComplete,
        (
            LoanStatus::Pending | LoanStatus::Approved | LoanStatus::Active,
            LoanStatus::Defaulted,
        ) => Transition::Default,
        _ => {
            return Err(LoanError::InvalidTransition {
                from,
                to: requested,
            })
        }
    };

    Ok(Some(transition))
}

/// fail unless `transition` is exactly the edge leaving `from`
pub fn require_transition(from: LoanStatus, transition: Transition) -> Result<()> {
    let to = transition.target();
    match check_transition(from, to)? {
        Some(found) if found == transition => Ok(()),
        _ => Err(LoanError::InvalidTransition { from, to }),
    }
}

/// the automatic completion edge taken by the repayment recorder
pub fn can_auto_complete(from: LoanStatus) -> bool {
    from == LoanStatus::Active
}
