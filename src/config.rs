use serde::{Deserialize, Serialize};

use crate::errors::{LoanError, Result};

/// loan engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanConfig {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub repayment: RepaymentConfig,
    #[serde(default)]
    pub access: AccessPolicy,
}

/// how installment amounts are rounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// equal installments at full money precision, sum may drift from the total
    Unreconciled,
    /// installments rounded to `decimal_places`, last one absorbs the remainder
    ReconcileFinal { decimal_places: u32 },
}

/// schedule generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub rounding: RoundingPolicy,
}

/// repayment recording settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentConfig {
    /// applied when a payment is recorded without a method
    pub default_payment_method: String,
}

/// role names allowed to approve, reject and edit loans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub elevated_roles: Vec<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            rounding: RoundingPolicy::Unreconciled,
        }
    }
}

impl Default for RepaymentConfig {
    fn default() -> Self {
        Self {
            default_payment_method: "Cash".to_string(),
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            elevated_roles: vec!["admin".to_string()],
        }
    }
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self::chama_default()
    }
}

impl LoanConfig {
    /// raw equal installments,
    /// cash as default method, admins elevated
    pub fn chama_default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            repayment: RepaymentConfig::default(),
            access: AccessPolicy::default(),
        }
    }

    /// installments rounded to `decimal_places`, final one reconciled to the total
    pub fn reconciled(decimal_places: u32) -> Self {
        Self {
            schedule: ScheduleConfig {
                rounding: RoundingPolicy::ReconcileFinal { decimal_places },
            },
            ..Self::chama_default()
        }
    }

    /// parse from a json document, filling omitted sections with defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LoanConfig =
            serde_json::from_str(json).map_err(|e| LoanError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let RoundingPolicy::ReconcileFinal { decimal_places } = self.schedule.rounding {
            if decimal_places > crate::decimal::Money::PRECISION {
                return Err(LoanError::InvalidConfiguration {
                    message: format!(
                        "rounding to {} places exceeds money precision",
                        decimal_places
                    ),
                });
            }
        }

        if self.access.elevated_roles.is_empty() {
            return Err(LoanError::InvalidConfiguration {
                message: "at least one elevated role is required".to_string(),
            });
        }

        if self.repayment.default_payment_method.trim().is_empty() {
            return Err(LoanError::InvalidConfiguration {
                message: "default payment method must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
