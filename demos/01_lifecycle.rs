/// lifecycle - a loan from application to natural completion under a test clock
use chama_loans::{
    logging, InMemoryLoanStore, InMemoryMemberDirectory, LoanApplicationRequest, LoanConfig,
    LoanFilter, LoanService, LoanStatus, LoanUpdateRequest, Money, PaymentDetails, Principal,
    SafeTimeProvider, TimeSource,
};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();
    println!("=== loan lifecycle ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let members = InMemoryMemberDirectory::new();
    let chair = Principal::new(members.add_member("Mary Akinyi", "chair@chama.example")?, "admin");
    let borrower_id = members.add_member("Peter Mutua", "peter@chama.example")?;
    let guarantor_id = members.add_member("Grace Chebet", "grace@chama.example")?;
    let borrower = Principal::new(borrower_id, "member");

    let service = LoanService::new(InMemoryLoanStore::new(), members, LoanConfig::reconciled(2), time.clone())?;

    let loan = service.create_application(
        Some(&borrower),
        LoanApplicationRequest {
            member_id: borrower_id.to_string(),
            amount: Money::from_major(1_000),
            purpose: "boda boda repairs".to_string(),
            interest_rate: dec!(10),
            term_months: 3,
            collateral: Some("logbook".to_string()),
            guarantors: vec![guarantor_id.to_string(), "not-a-member".to_string()],
            notes: None,
        },
    )?;
    println!("applied: {} ({})", loan.id, loan.status);

    // approve with a longer term than requested
    controller.advance(Duration::days(2));
    let loan = service.update_loan(
        Some(&chair),
        &loan.id.to_string(),
        LoanUpdateRequest {
            term_months: Some(4),
            status: Some(LoanStatus::Approved),
            ..LoanUpdateRequest::default()
        },
    )?;
    println!("approved: total repayable {}", loan.scheduled_total());
    for repayment in &loan.repayments {
        println!(
            "  #{} due {} amount {}",
            repayment.installment_number,
            repayment.date.format("%Y-%m-%d"),
            repayment.amount
        );
    }

    let loan_id = loan.id.to_string();
    for repayment in &loan.repayments {
        controller.advance(Duration::days(30));
        let receipt = service.record_repayment(
            Some(&borrower),
            &loan_id,
            &repayment.id.to_string(),
            PaymentDetails::cash().with_method("M-Pesa"),
        )?;
        println!(
            "paid #{} on {} -> loan {}",
            receipt.repayment.installment_number,
            time.now().format("%Y-%m-%d"),
            receipt.loan.status
        );
    }

    let completed = service.list_loans(
        Some(&chair),
        &LoanFilter {
            status: Some(LoanStatus::Completed),
            ..LoanFilter::default()
        },
    )?;
    println!("\ncompleted loans: {}", completed.len());

    println!("\nevents:");
    for event in service.take_events() {
        println!("  {:?}", event);
    }

    Ok(())
}
