pub mod amortization;
pub mod recorder;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LoanError, Result};

pub use amortization::{
    add_months, LoanTerms, RepaymentSchedule, ScheduleCalculator, ScheduledInstallment,
};
pub use recorder::{RecordOutcome, RepaymentRecorder};

/// details supplied when a member pays an installment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// replaces the scheduled amount when present
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PaymentDetails {
    pub fn cash() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }

    pub fn with_transaction(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(amount) = self.amount {
            if !amount.is_positive() {
                return Err(LoanError::validation(format!(
                    "payment amount must be positive, got {}",
                    amount
                )));
            }
            if amount.as_decimal() > Decimal::from(LoanTerms::MAX_AMOUNT) {
                return Err(LoanError::validation(format!(
                    "payment amount must not exceed {}, got {}",
                    LoanTerms::MAX_AMOUNT,
                    amount
                )));
            }
        }
        Ok(())
    }
}

/// blank strings count as absent
pub(crate) fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
