use crate::infra::in_memory_service;
use chrono::Local;
use clap::Args;
use grant_portal::config::{AppConfig, PortalConfig};
use grant_portal::error::AppError;
use grant_portal::workflows::grants::{
    screen, ApplicationSubmission, Authorized, BusinessProfile, EligibilityFlags, ExportRequest,
    RegistrationStatus, ReviewAction, Role, ScoreItem, ScreeningAnswers, ScreeningOutcome,
    ScreeningRules, UserId, UserProfile,
};

#[derive(Args, Debug)]
pub(crate) struct ScreenArgs {
    /// Registration status: registered, in_progress, or not_registered
    #[arg(long, value_parser = parse_registration, default_value = "registered")]
    pub(crate) registration: RegistrationStatus,
    /// Years the business has been trading
    #[arg(long)]
    pub(crate) years_operating: f32,
    /// Annual revenue in whole currency units
    #[arg(long)]
    pub(crate) annual_revenue: u64,
    /// Number of employees
    #[arg(long, default_value_t = 1)]
    pub(crate) employees: u32,
    /// Founder age in years
    #[arg(long)]
    pub(crate) founder_age: u8,
    /// The business does not keep financial records
    #[arg(long)]
    pub(crate) no_financial_records: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Business name used for the demo application
    #[arg(long)]
    pub(crate) business_name: Option<String>,
    /// Annual revenue declared by the demo applicant
    #[arg(long)]
    pub(crate) annual_revenue: Option<u64>,
    /// Print the eligibility export after the review completes
    #[arg(long)]
    pub(crate) show_export: bool,
}

fn parse_registration(raw: &str) -> Result<RegistrationStatus, String> {
    match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "registered" => Ok(RegistrationStatus::Registered),
        "in_progress" => Ok(RegistrationStatus::InProgress),
        "not_registered" => Ok(RegistrationStatus::NotRegistered),
        other => Err(format!(
            "unknown registration status '{other}' (expected registered, in_progress, or not_registered)"
        )),
    }
}

/// Screen against the portal limits loaded from the environment.
pub(crate) fn run_screening(args: ScreenArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let outcome = screen_answers(&args, &config.portal);
    println!("Screening result: {}", outcome.summary());
    if let ScreeningOutcome::Disqualified { reasons, .. } = &outcome {
        for reason in reasons {
            println!("- {}", reason.summary());
        }
    }
    Ok(())
}

fn screen_answers(args: &ScreenArgs, config: &PortalConfig) -> ScreeningOutcome {
    let answers = ScreeningAnswers {
        registration_status: args.registration,
        years_operating: args.years_operating,
        annual_revenue: args.annual_revenue,
        employee_count: args.employees,
        founder_age: args.founder_age,
        keeps_financial_records: !args.no_financial_records,
        has_business_bank_account: false,
        has_business_plan: false,
    };
    screen(&answers, &ScreeningRules::from_config(config))
}

fn account(id: &str, name: &str, role: Role) -> Authorized {
    Authorized {
        profile: UserProfile {
            id: UserId(id.to_string()),
            name: name.to_string(),
            email: format!("{id}@demo.grants"),
            role: role.label().to_string(),
        },
        role,
    }
}

fn score(criteria_id: &str, value: u16, comment: &str) -> ScoreItem {
    ScoreItem {
        criteria_id: criteria_id.to_string(),
        score: value,
        comment: Some(comment.to_string()),
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        business_name,
        annual_revenue,
        show_export,
    } = args;

    let (service, outbox) = in_memory_service(&PortalConfig::default());
    let applicant = account("applicant", "Amina Otieno", Role::Applicant);
    let first_tier = account("reviewer-1", "Brian Kiprop", Role::Reviewer1);
    let second_tier = account("reviewer-2", "Chebet Langat", Role::Reviewer2);
    for user in [&applicant, &first_tier, &second_tier] {
        service.register_user(user.profile.clone())?;
    }

    println!("Grant portal demo");
    let submission = ApplicationSubmission {
        business: BusinessProfile {
            business_name: business_name.unwrap_or_else(|| "Mavuno Agritech".to_string()),
            sector: "agriculture".to_string(),
            county: "Nakuru".to_string(),
            summary: "Cold storage for smallholder farmers".to_string(),
        },
        screening: ScreeningAnswers {
            registration_status: RegistrationStatus::Registered,
            years_operating: 2.5,
            annual_revenue: annual_revenue.unwrap_or(1_250_000),
            employee_count: 14,
            founder_age: 29,
            keeps_financial_records: true,
            has_business_bank_account: true,
            has_business_plan: true,
        },
    };

    let application = service.submit(&applicant, submission)?;
    println!(
        "- Submitted {} for {} ({} track)",
        application.id.0,
        application.business.business_name,
        application.track.label()
    );

    service.update_eligibility_flags(
        &second_tier,
        &application.id,
        EligibilityFlags {
            age: true,
            registration: true,
            revenue: true,
            business_plan: true,
            impact: true,
        },
    )?;
    let progress = service.save_scoring_progress(
        &first_tier,
        &application.id,
        vec![
            score("business_viability", 21, "clear unit economics"),
            score("market_opportunity", 16, "large underserved market"),
            score("innovation", 11, "proven approach, new region"),
            score("team_capacity", 12, "experienced founders"),
            score("financial_management", 11, "audited books"),
            score("social_impact", 8, "rural employment"),
        ],
    )?;
    println!(
        "- Scored {} criteria, running total {}",
        progress.scores.len(),
        progress.eligibility.total_score.unwrap_or_default()
    );

    let locked = service.lock_result(&second_tier, &application.id)?;
    println!(
        "- Result locked: total {} / {} | eligible: {}",
        locked.total_score.unwrap_or_default(),
        service.rubric().max_total(),
        locked.is_eligible
    );

    service.decide(&first_tier, &application.id, ReviewAction::Shortlist, None)?;
    let decided = if locked.is_eligible {
        service.decide(
            &second_tier,
            &application.id,
            ReviewAction::Approve,
            Some("meets every programme criterion".to_string()),
        )?
    } else {
        service.decide(&second_tier, &application.id, ReviewAction::Reject, None)?
    };
    println!("- Final status: {}", decided.status.label());
    println!("Decision trail:");
    for decision in &decided.decisions {
        println!(
            "  - {} by {}: {} -> {}",
            decision.action.label(),
            decision.actor.0,
            decision.from.label(),
            decision.to.label()
        );
    }

    println!("E-mails queued:");
    for message in outbox.sent() {
        println!("  - [{}] to {}: {}", message.template, message.to, message.subject);
    }

    if show_export {
        let request = ExportRequest {
            kind: "eligibility".to_string(),
            format: "csv".to_string(),
            ..ExportRequest::default()
        };
        let file = service.export(&request, Local::now().date_naive())?;
        println!("\n{}", file.filename);
        println!("{}", String::from_utf8_lossy(&file.bytes));
    }

    Ok(())
}
