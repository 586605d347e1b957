//! Access checks for loan operations.
//!
//! Token verification happens upstream; by the time a request reaches this
//! crate the caller is either an authenticated [`Principal`] or nobody.

use serde::{Deserialize, Serialize};

use crate::config::AccessPolicy;
use crate::errors::{LoanError, Result};
use crate::types::MemberId;

/// authenticated caller as supplied by the auth layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: MemberId,
    pub role: String,
}

impl Principal {
    pub fn new(id: MemberId, role: impl Into<String>) -> Self {
        Self {
            id,
            role: role.into(),
        }
    }
}

impl AccessPolicy {
    pub fn is_elevated(&self, principal: &Principal) -> bool {
        self.elevated_roles
            .iter()
            .any(|role| role.eq_ignore_ascii_case(principal.role.trim()))
    }

    /// any authenticated caller
    pub fn require_authenticated<'a>(&self, principal: Option<&'a Principal>) -> Result<&'a Principal> {
        principal.ok_or(LoanError::Unauthenticated)
    }

    /// authenticated caller holding one of the elevated roles
    pub fn require_elevated<'a>(&self, principal: Option<&'a Principal>) -> Result<&'a Principal> {
        let principal = self.require_authenticated(principal)?;
        if !self.is_elevated(principal) {
            return Err(LoanError::Forbidden {
                role: principal.role.clone(),
            });
        }
        Ok(principal)
    }
}
