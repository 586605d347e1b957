pub mod auth;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod loan;
pub mod logging;
pub mod payments;
pub mod repository;
pub mod serialization;
pub mod service;
pub mod state;
pub mod types;

// re-export key types
pub use auth::Principal;
pub use config::{AccessPolicy, LoanConfig, RepaymentConfig, RoundingPolicy, ScheduleConfig};
pub use decimal::{Money, Rate};
pub use errors::{ErrorKind, LoanError, Result};
pub use events::{Event, EventStore};
pub use loan::{Loan, LoanEdits, NewLoan, Repayment};
pub use payments::{
    LoanTerms, PaymentDetails, RecordOutcome, RepaymentRecorder, RepaymentSchedule,
    ScheduleCalculator, ScheduledInstallment,
};
pub use repository::{
    InMemoryLoanStore, InMemoryMemberDirectory, LoanFilter, LoanRepository, MemberDirectory,
    MemberRecord,
};
pub use serialization::{GuarantorView, LoanView, RepaymentView, TotalsView};
pub use service::{LoanApplicationRequest, LoanService, LoanUpdateRequest, RepaymentReceipt};
pub use state::{check_transition, Transition};
pub use types::{LoanId, LoanStatus, MemberId, RepaymentId, RepaymentStatus};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
