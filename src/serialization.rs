//! Read models for loans, enriched with member names.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::loan::{Loan, Repayment};
use crate::payments::ScheduleCalculator;
use crate::repository::MemberDirectory;
use crate::types::{LoanId, LoanStatus, MemberId, RepaymentId, RepaymentStatus};

/// shown when a loan's member no longer resolves
pub const UNKNOWN_MEMBER: &str = "Unknown Member";

/// serializable view of a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub member_id: MemberId,
    pub member: String,
    pub amount: Money,
    pub purpose: String,
    pub interest_rate: Rate,
    pub term_months: u32,
    pub status: LoanStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub approved_by: Option<MemberId>,
    pub approver_name: Option<String>,
    pub approval_date: Option<DateTime<Utc>>,
    pub collateral: Option<String>,
    pub guarantors: Vec<GuarantorView>,
    pub notes: Option<String>,
    pub totals: TotalsView,
    pub repayments: Vec<RepaymentView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuarantorView {
    pub id: MemberId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalsView {
    pub total_repayable: Money,
    pub amount_paid: Money,
    pub outstanding_balance: Money,
    pub next_due_date: Option<DateTime<Utc>>,
    pub next_due_amount: Option<Money>,
    pub installments_paid: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentView {
    pub id: RepaymentId,
    pub installment_number: u32,
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub status: RepaymentStatus,
    pub payment_method: String,
    pub transaction_id: String,
    pub notes: String,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&Repayment> for RepaymentView {
    fn from(repayment: &Repayment) -> Self {
        Self {
            id: repayment.id,
            installment_number: repayment.installment_number,
            amount: repayment.amount,
            date: repayment.date,
            status: repayment.status,
            payment_method: repayment.payment_method.clone(),
            transaction_id: repayment.transaction_id.clone(),
            notes: repayment.notes.clone(),
            paid_at: repayment.paid_at,
        }
    }
}

impl LoanView {
    /// build a view, looking up member, approver and guarantor names; the
    /// total follows the same rounding as the schedule
    pub fn build<M: MemberDirectory + ?Sized>(
        loan: &Loan,
        members: &M,
        calculator: &ScheduleCalculator,
    ) -> Result<Self> {
        let member = members
            .find_member(loan.member_id)?
            .map(|m| m.name)
            .unwrap_or_else(|| UNKNOWN_MEMBER.to_string());

        let approver_name = match loan.approved_by {
            Some(id) => members.find_member(id)?.map(|m| m.name),
            None => None,
        };

        let mut guarantors = Vec::with_capacity(loan.guarantors.len());
        for id in &loan.guarantors {
            let name = members
                .find_member(*id)?
                .map(|m| m.name)
                .unwrap_or_else(|| UNKNOWN_MEMBER.to_string());
            guarantors.push(GuarantorView { id: *id, name });
        }

        let next_due = loan.next_due();

        Ok(LoanView {
            id: loan.id,
            member_id: loan.member_id,
            member,
            amount: loan.amount,
            purpose: loan.purpose.clone(),
            interest_rate: loan.interest_rate,
            term_months: loan.term_months,
            status: loan.status,
            start_date: loan.start_date,
            end_date: loan.end_date,
            approved_by: loan.approved_by,
            approver_name,
            approval_date: loan.approval_date,
            collateral: loan.collateral.clone(),
            guarantors,
            notes: loan.notes.clone(),
            totals: TotalsView {
                total_repayable: loan.total_repayable(calculator)?,
                amount_paid: loan.amount_paid(),
                outstanding_balance: loan.outstanding_balance(),
                next_due_date: next_due.map(|r| r.date),
                next_due_amount: next_due.map(|r| r.amount),
                installments_paid: loan.repayments.iter().filter(|r| r.is_completed()).count() as u32,
            },
            repayments: loan.repayments.iter().map(RepaymentView::from).collect(),
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        })
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoundingPolicy;
    use crate::events::EventStore;
    use crate::loan::NewLoan;
    use crate::payments::ScheduleCalculator;
    use crate::repository::InMemoryMemberDirectory;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_view_resolves_names() {
        let directory = InMemoryMemberDirectory::new();
        let borrower = directory.add_member("Njeri Wambui", "njeri@chama.example").unwrap();
        let treasurer = directory.add_member("Otieno Ouma", "otieno@chama.example").unwrap();
        let mut events = EventStore::new();

        let mut loan = Loan::open(
            NewLoan {
                member_id: borrower,
                amount: Money::from_major(600),
                purpose: "sewing machine".to_string(),
                interest_rate: Rate::from_percentage(12),
                term_months: 6,
                collateral: None,
                guarantors: vec![treasurer, Uuid::new_v4()],
                notes: None,
            },
            now(),
            &mut events,
        )
        .unwrap();
        let calculator = ScheduleCalculator::new(RoundingPolicy::Unreconciled);
        loan.approve(treasurer, &calculator, now(), &mut events).unwrap();

        let view = LoanView::build(&loan, &directory, &calculator).unwrap();

        assert_eq!(view.member, "Njeri Wambui");
        assert_eq!(view.approver_name.as_deref(), Some("Otieno Ouma"));
        assert_eq!(view.guarantors[0].name, "Otieno Ouma");
        assert_eq!(view.guarantors[1].name, UNKNOWN_MEMBER);
        assert_eq!(view.totals.total_repayable, Money::from_major(636));
        assert_eq!(view.totals.outstanding_balance, Money::from_major(636));
        assert_eq!(view.totals.next_due_amount, Some(Money::from_major(106)));
        assert_eq!(view.repayments.len(), 6);
    }

    #[test]
    fn test_total_matches_reconciled_schedule() {
        let directory = InMemoryMemberDirectory::new();
        let calculator = ScheduleCalculator::new(RoundingPolicy::ReconcileFinal { decimal_places: 2 });
        let mut events = EventStore::new();
        // 1000 at 10% over 7 months: raw total 1058.33333333
        let mut loan = Loan::open(
            NewLoan {
                member_id: Uuid::new_v4(),
                amount: Money::from_major(1_000),
                purpose: "water tank".to_string(),
                interest_rate: Rate::from_percentage(10),
                term_months: 7,
                collateral: None,
                guarantors: Vec::new(),
                notes: None,
            },
            now(),
            &mut events,
        )
        .unwrap();
        loan.approve(Uuid::new_v4(), &calculator, now(), &mut events).unwrap();

        let view = LoanView::build(&loan, &directory, &calculator).unwrap();

        assert_eq!(view.totals.total_repayable, Money::from_str_exact("1058.33").unwrap());
        assert_eq!(view.totals.total_repayable, loan.scheduled_total());
        assert_eq!(view.totals.outstanding_balance, view.totals.total_repayable);
    }

    #[test]
    fn test_unknown_member_fallback_and_json() {
        let directory = InMemoryMemberDirectory::new();
        let loan = Loan::open(
            NewLoan {
                member_id: Uuid::new_v4(),
                amount: Money::from_major(100),
                purpose: "seeds".to_string(),
                interest_rate: Rate::from_percentage(5),
                term_months: 2,
                collateral: Some("bicycle".to_string()),
                guarantors: Vec::new(),
                notes: None,
            },
            now(),
            &mut EventStore::new(),
        )
        .unwrap();

        let calculator = ScheduleCalculator::new(RoundingPolicy::Unreconciled);
        let view = LoanView::build(&loan, &directory, &calculator).unwrap();
        assert_eq!(view.member, UNKNOWN_MEMBER);
        assert!(view.approver_name.is_none());
        assert!(view.totals.next_due_date.is_none());

        let json = view.to_json_pretty().unwrap();
        assert!(json.contains("\"status\": \"pending\""));
        assert!(json.contains("\"member\": \"Unknown Member\""));
    }
}
