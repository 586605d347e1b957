use chrono::{DateTime, Months, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::RoundingPolicy;
use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};

/// principal, rate and term a schedule is generated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    pub annual_rate: Rate,
    pub term_months: u32,
}

impl LoanTerms {
    /// longest schedule accepted, in months
    pub const MAX_TERM_MONTHS: u32 = 1_200;

    /// upper bound on principal plus interest, in whole currency units
    pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

    pub fn new(principal: Money, annual_rate: Rate, term_months: u32) -> Result<Self> {
        let terms = Self {
            principal,
            annual_rate,
            term_months,
        };
        terms.validate()?;
        Ok(terms)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.principal.is_positive() {
            return Err(LoanError::validation(format!(
                "amount must be positive, got {}",
                self.principal
            )));
        }
        if !self.annual_rate.is_positive() {
            return Err(LoanError::validation(format!(
                "interest rate must be positive, got {}",
                self.annual_rate
            )));
        }
        if self.term_months == 0 {
            return Err(LoanError::validation("term must be at least one month"));
        }
        if self.term_months > Self::MAX_TERM_MONTHS {
            return Err(LoanError::validation(format!(
                "term must not exceed {} months, got {}",
                Self::MAX_TERM_MONTHS,
                self.term_months
            )));
        }
        self.total_repayable()?;
        Ok(())
    }

    /// principal * rate * term/12, never compounded
    pub fn total_interest(&self) -> Result<Money> {
        self.principal
            .simple_interest(self.annual_rate, self.term_months)
            .ok_or_else(|| LoanError::validation("interest exceeds the supported amount range"))
    }

    /// principal plus interest, capped at [`LoanTerms::MAX_AMOUNT`]
    pub fn total_repayable(&self) -> Result<Money> {
        let total = self
            .principal
            .checked_add(self.total_interest()?)
            .filter(|total| total.as_decimal() <= Decimal::from(Self::MAX_AMOUNT))
            .ok_or_else(|| {
                LoanError::validation(format!(
                    "total repayable must not exceed {}",
                    Self::MAX_AMOUNT
                ))
            })?;
        Ok(total)
    }

    pub fn monthly_installment(&self) -> Result<Money> {
        Ok(self.total_repayable()? / Decimal::from(self.term_months))
    }
}

/// one dated installment of a schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledInstallment {
    pub installment_number: u32,
    pub due_date: DateTime<Utc>,
    pub amount: Money,
}

/// equal-installment schedule for a simple-interest loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentSchedule {
    pub terms: LoanTerms,
    pub reference_date: DateTime<Utc>,
    pub total_interest: Money,
    pub total_repayable: Money,
    pub monthly_installment: Money,
    pub installments: Vec<ScheduledInstallment>,
}

impl RepaymentSchedule {
    /// sum of all installment amounts
    pub fn scheduled_total(&self) -> Money {
        self.installments.iter().map(|i| i.amount).sum()
    }

    /// difference between the scheduled total and the contractual total
    pub fn rounding_drift(&self) -> Money {
        self.scheduled_total() - self.total_repayable
    }

    pub fn final_due_date(&self) -> Option<DateTime<Utc>> {
        self.installments.last().map(|i| i.due_date)
    }
}

/// schedule calculator
pub struct ScheduleCalculator {
    rounding: RoundingPolicy,
}

impl ScheduleCalculator {
    pub fn new(rounding: RoundingPolicy) -> Self {
        Self { rounding }
    }

    /// contractual total under this calculator's rounding policy
    pub fn total_repayable(&self, terms: &LoanTerms) -> Result<Money> {
        let total = terms.total_repayable()?;
        Ok(match self.rounding {
            RoundingPolicy::Unreconciled => total,
            RoundingPolicy::ReconcileFinal { decimal_places } => total.round_dp(decimal_places),
        })
    }

    /// build the schedule; installment `i` falls due `i` months after `reference_date`
    pub fn calculate(
        &self,
        terms: LoanTerms,
        reference_date: DateTime<Utc>,
    ) -> Result<RepaymentSchedule> {
        terms.validate()?;

        let total_interest = terms.total_interest()?;
        let total_repayable = self.total_repayable(&terms)?;
        let amounts = match self.rounding {
            RoundingPolicy::Unreconciled => {
                vec![terms.monthly_installment()?; terms.term_months as usize]
            }
            RoundingPolicy::ReconcileFinal { decimal_places } => {
                reconciled_amounts(total_repayable, terms.term_months, decimal_places)
            }
        };

        let mut installments = Vec::with_capacity(amounts.len());
        for (i, amount) in amounts.into_iter().enumerate() {
            let number = i as u32 + 1;
            installments.push(ScheduledInstallment {
                installment_number: number,
                due_date: add_months(reference_date, number)?,
                amount,
            });
        }

        Ok(RepaymentSchedule {
            terms,
            reference_date,
            total_interest,
            total_repayable,
            monthly_installment: installments
                .first()
                .map(|i| i.amount)
                .unwrap_or(Money::ZERO),
            installments,
        })
    }
}

/// equal installments truncated to `decimal_places`; the last one takes the
/// remainder, which is never smaller than the others
fn reconciled_amounts(total: Money, term_months: u32, decimal_places: u32) -> Vec<Money> {
    let share = total.as_decimal() / Decimal::from(term_months);
    let installment =
        Money::from_decimal(share.round_dp_with_strategy(decimal_places, RoundingStrategy::ToZero));
    let mut amounts = vec![installment; term_months as usize];
    let leading = installment * Decimal::from(term_months - 1);
    if let Some(last) = amounts.last_mut() {
        *last = total - leading;
    }
    amounts
}

/// add calendar months, clamping to the last day of a shorter month
pub fn add_months(date: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| LoanError::validation(format!("date overflow adding {} months", months)))
}
