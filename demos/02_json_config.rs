/// json config - load engine settings from a document
use chama_loans::{
    InMemoryLoanStore, InMemoryMemberDirectory, LoanConfig, LoanError, LoanService, Principal,
    SafeTimeProvider, TimeSource,
};

const CONFIG: &str = r#"{
    "schedule": { "rounding": { "mode": "reconcile_final", "decimal_places": 2 } },
    "repayment": { "default_payment_method": "Bank Transfer" },
    "access": { "elevated_roles": ["treasurer", "chairperson"] }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LoanConfig::from_json_str(CONFIG)?;
    println!("loaded config:\n{}\n", serde_json::to_string_pretty(&config)?);

    let members = InMemoryMemberDirectory::new();
    let treasurer = Principal::new(members.add_member("Treasurer", "t@chama.example")?, "treasurer");
    let admin = Principal::new(members.add_member("Old Admin", "a@chama.example")?, "admin");

    let service = LoanService::new(
        InMemoryLoanStore::new(),
        members,
        config,
        SafeTimeProvider::new(TimeSource::System),
    )?;
    println!("treasurer elevated: {}", service.config().access.is_elevated(&treasurer));
    println!("admin elevated: {}", service.config().access.is_elevated(&admin));

    // invalid documents are refused up front
    match LoanConfig::from_json_str(r#"{ "access": { "elevated_roles": [] } }"#) {
        Err(LoanError::InvalidConfiguration { message }) => println!("rejected: {}", message),
        other => println!("unexpected: {:?}", other),
    }

    Ok(())
}
