use thiserror::Error;
use uuid::Uuid;

use crate::types::LoanStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoanError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },

    #[error("loan not found: {id}")]
    LoanNotFound {
        id: Uuid,
    },

    #[error("member not found: {id}")]
    MemberNotFound {
        id: Uuid,
    },

    #[error("repayment {repayment_id} not found on loan {loan_id}")]
    RepaymentNotFound {
        loan_id: Uuid,
        repayment_id: Uuid,
    },

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: role {role:?} may not perform this operation")]
    Forbidden {
        role: String,
    },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: LoanStatus,
        to: LoanStatus,
    },

    #[error("repayment {repayment_id} already completed")]
    RepaymentAlreadyCompleted {
        repayment_id: Uuid,
    },

    #[error("version conflict on loan {id}: expected {expected}, found {found}")]
    VersionConflict {
        id: Uuid,
        expected: u64,
        found: u64,
    },

    #[error("persistence failure: {message}")]
    Persistence {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

/// coarse error classes for callers mapping errors onto a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authorization,
    Conflict,
    Persistence,
}

impl LoanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoanError::Validation { .. } | LoanError::InvalidConfiguration { .. } => {
                ErrorKind::Validation
            }
            LoanError::LoanNotFound { .. }
            | LoanError::MemberNotFound { .. }
            | LoanError::RepaymentNotFound { .. } => ErrorKind::NotFound,
            LoanError::Unauthenticated | LoanError::Forbidden { .. } => ErrorKind::Authorization,
            LoanError::InvalidTransition { .. }
            | LoanError::RepaymentAlreadyCompleted { .. }
            | LoanError::VersionConflict { .. } => ErrorKind::Conflict,
            LoanError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        LoanError::Validation {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
