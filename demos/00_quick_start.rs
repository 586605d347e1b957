/// quick start - apply, approve and pay one installment
use chama_loans::{
    InMemoryLoanStore, InMemoryMemberDirectory, LoanApplicationRequest, LoanConfig, LoanService,
    LoanStatus, LoanUpdateRequest, Money, PaymentDetails, Principal, SafeTimeProvider, TimeSource,
};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let members = InMemoryMemberDirectory::new();
    let treasurer = Principal::new(members.add_member("Treasurer", "treasurer@chama.example")?, "admin");
    let member_id = members.add_member("Wanjiru", "wanjiru@chama.example")?;
    let member = Principal::new(member_id, "member");

    let service = LoanService::new(
        InMemoryLoanStore::new(),
        members,
        LoanConfig::chama_default(),
        SafeTimeProvider::new(TimeSource::System),
    )?;

    // 1200 at 12% over 12 months
    let loan = service.create_application(
        Some(&member),
        LoanApplicationRequest {
            member_id: member_id.to_string(),
            amount: Money::from_major(1_200),
            purpose: "poultry house".to_string(),
            interest_rate: dec!(12),
            term_months: 12,
            collateral: None,
            guarantors: Vec::new(),
            notes: None,
        },
    )?;

    let loan = service.update_loan(
        Some(&treasurer),
        &loan.id.to_string(),
        LoanUpdateRequest::status(LoanStatus::Approved),
    )?;

    let first = loan.repayments[0].id.to_string();
    service.record_repayment(
        Some(&member),
        &loan.id.to_string(),
        &first,
        PaymentDetails::cash().with_method("M-Pesa"),
    )?;

    println!("{}", service.get_loan(Some(&member), &loan.id.to_string())?.to_json_pretty()?);

    Ok(())
}
