//! Persistence seams for loans and member lookups.
//!
//! Stores replace whole loan documents. `replace` is a compare-and-swap on
//! [`Loan::version`]: a writer holding a stale copy gets
//! [`LoanError::VersionConflict`] instead of clobbering a concurrent update.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::errors::{LoanError, Result};
use crate::loan::Loan;
use crate::types::{LoanId, LoanStatus, MemberId};

/// filter for listing loans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanFilter {
    pub status: Option<LoanStatus>,
    pub member_id: Option<MemberId>,
}

impl LoanFilter {
    pub fn matches(&self, loan: &Loan) -> bool {
        self.status.map_or(true, |s| loan.status == s)
            && self.member_id.map_or(true, |m| loan.member_id == m)
    }
}

/// loan document store
pub trait LoanRepository {
    fn get(&self, id: LoanId) -> Result<Option<Loan>>;

    /// store a new loan, returning it as persisted
    fn insert(&self, loan: &Loan) -> Result<Loan>;

    /// replace the stored loan if its version still equals `expected_version`;
    /// returns the loan with its version bumped
    fn replace(&self, loan: &Loan, expected_version: u64) -> Result<Loan>;

    /// matching loans, newest first
    fn list(&self, filter: &LoanFilter) -> Result<Vec<Loan>>;
}

/// member as seen by the loan engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: MemberId,
    pub name: String,
    pub email: String,
}

/// member lookup
pub trait MemberDirectory {
    fn find_member(&self, id: MemberId) -> Result<Option<MemberRecord>>;

    fn member_exists(&self, id: MemberId) -> Result<bool> {
        Ok(self.find_member(id)?.is_some())
    }
}

impl<T: LoanRepository + ?Sized> LoanRepository for Arc<T> {
    fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        (**self).get(id)
    }

    fn insert(&self, loan: &Loan) -> Result<Loan> {
        (**self).insert(loan)
    }

    fn replace(&self, loan: &Loan, expected_version: u64) -> Result<Loan> {
        (**self).replace(loan, expected_version)
    }

    fn list(&self, filter: &LoanFilter) -> Result<Vec<Loan>> {
        (**self).list(filter)
    }
}

impl<T: MemberDirectory + ?Sized> MemberDirectory for Arc<T> {
    fn find_member(&self, id: MemberId) -> Result<Option<MemberRecord>> {
        (**self).find_member(id)
    }
}

fn poisoned<E>(_: E) -> LoanError {
    LoanError::Persistence {
        message: "store lock poisoned".to_string(),
    }
}

/// in-process loan store
#[derive(Debug, Default)]
pub struct InMemoryLoanStore {
    loans: RwLock<HashMap<LoanId, Loan>>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.loans.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LoanRepository for InMemoryLoanStore {
    fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        let loans = self.loans.read().map_err(poisoned)?;
        Ok(loans.get(&id).cloned())
    }

    fn insert(&self, loan: &Loan) -> Result<Loan> {
        let mut loans = self.loans.write().map_err(poisoned)?;
        if loans.contains_key(&loan.id) {
            return Err(LoanError::Persistence {
                message: format!("duplicate loan id {}", loan.id),
            });
        }
        let mut stored = loan.clone();
        stored.version = 1;
        loans.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn replace(&self, loan: &Loan, expected_version: u64) -> Result<Loan> {
        let mut loans = self.loans.write().map_err(poisoned)?;
        let current = loans
            .get_mut(&loan.id)
            .ok_or(LoanError::LoanNotFound { id: loan.id })?;

        if current.version != expected_version {
            return Err(LoanError::VersionConflict {
                id: loan.id,
                expected: expected_version,
                found: current.version,
            });
        }

        let mut stored = loan.clone();
        stored.version = expected_version + 1;
        *current = stored.clone();
        Ok(stored)
    }

    fn list(&self, filter: &LoanFilter) -> Result<Vec<Loan>> {
        let loans = self.loans.read().map_err(poisoned)?;
        let mut matching: Vec<Loan> = loans.values().filter(|l| filter.matches(l)).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(matching)
    }
}

/// in-process member directory
#[derive(Debug, Default)]
pub struct InMemoryMemberDirectory {
    members: RwLock<HashMap<MemberId, MemberRecord>>,
}

impl InMemoryMemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// register a member, returning the generated id
    pub fn add_member(&self, name: impl Into<String>, email: impl Into<String>) -> Result<MemberId> {
        let record = MemberRecord {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
        };
        let id = record.id;
        self.members.write().map_err(poisoned)?.insert(id, record);
        Ok(id)
    }
}

impl MemberDirectory for InMemoryMemberDirectory {
    fn find_member(&self, id: MemberId) -> Result<Option<MemberRecord>> {
        let members = self.members.read().map_err(poisoned)?;
        Ok(members.get(&id).cloned())
    }
}
