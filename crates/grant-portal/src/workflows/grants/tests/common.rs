use std::sync::Arc;

use axum::body::to_bytes;
use axum::response::Response;
use serde_json::Value;

use crate::config::PortalConfig;
use crate::workflows::grants::access::{authorize, Authorized};
use crate::workflows::grants::domain::{
    ApplicationSubmission, BusinessProfile, RegistrationStatus, Role, ScoreItem,
    ScreeningAnswers, UserId, UserProfile,
};
use crate::workflows::grants::memory::{
    InMemoryMailer, InMemoryPageCache, InMemoryPortalRepository,
};
use crate::workflows::grants::repository::{EmailMessage, MailError, Mailer};
use crate::workflows::grants::service::GrantPortalService;

pub(super) type MemoryService =
    GrantPortalService<InMemoryPortalRepository, InMemoryMailer, InMemoryPageCache>;

pub(super) const APPLICANT: &str = "u-applicant";
pub(super) const SECOND_APPLICANT: &str = "u-applicant-2";
pub(super) const REVIEWER_ONE: &str = "u-reviewer-1";
pub(super) const REVIEWER_TWO: &str = "u-reviewer-2";
pub(super) const TECHNICAL: &str = "u-technical";
pub(super) const OVERSIGHT: &str = "u-oversight";
pub(super) const ADMIN: &str = "u-admin";

pub(super) struct Harness {
    pub service: Arc<MemoryService>,
    pub repository: Arc<InMemoryPortalRepository>,
    pub mailer: Arc<InMemoryMailer>,
    pub cache: Arc<InMemoryPageCache>,
}

pub(super) fn profile(id: &str, role: Role) -> UserProfile {
    UserProfile {
        id: UserId(id.to_string()),
        name: format!("User {id}"),
        email: format!("{id}@example.org"),
        role: role.label().to_string(),
    }
}

pub(super) fn roster() -> Vec<UserProfile> {
    vec![
        profile(APPLICANT, Role::Applicant),
        profile(SECOND_APPLICANT, Role::Applicant),
        profile(REVIEWER_ONE, Role::Reviewer1),
        profile(REVIEWER_TWO, Role::Reviewer2),
        profile(TECHNICAL, Role::TechnicalReviewer),
        profile(OVERSIGHT, Role::Oversight),
        profile(ADMIN, Role::Admin),
    ]
}

pub(super) fn harness() -> Harness {
    let repository = Arc::new(InMemoryPortalRepository::default());
    let mailer = Arc::new(InMemoryMailer::default());
    let cache = Arc::new(InMemoryPageCache::default());
    let service = Arc::new(GrantPortalService::new(
        repository.clone(),
        mailer.clone(),
        cache.clone(),
        &PortalConfig::default(),
    ));

    for user in roster() {
        service.register_user(user).expect("seed user");
    }

    Harness {
        service,
        repository,
        mailer,
        cache,
    }
}

/// Resolve a seeded account through the same guard the router uses.
pub(super) fn signed_in(harness: &Harness, id: &str) -> Authorized {
    let session = harness
        .service
        .session_user(&UserId(id.to_string()))
        .expect("lookup succeeds");
    authorize(session, &Role::ALL).expect("seeded role is valid")
}

pub(super) fn eligible_answers() -> ScreeningAnswers {
    ScreeningAnswers {
        registration_status: RegistrationStatus::Registered,
        years_operating: 3.0,
        annual_revenue: 1_200_000,
        employee_count: 12,
        founder_age: 29,
        keeps_financial_records: true,
        has_business_bank_account: true,
        has_business_plan: true,
    }
}

pub(super) fn submission() -> ApplicationSubmission {
    ApplicationSubmission {
        business: BusinessProfile {
            business_name: "Mavuno Agritech".to_string(),
            sector: "agriculture".to_string(),
            county: "Nakuru".to_string(),
            summary: "Cold storage for smallholder farmers".to_string(),
        },
        screening: eligible_answers(),
    }
}

pub(super) fn score(criteria_id: &str, value: u16) -> ScoreItem {
    ScoreItem {
        criteria_id: criteria_id.to_string(),
        score: value,
        comment: None,
    }
}

/// Scores totalling 72 out of 100.
pub(super) fn passing_scores() -> Vec<ScoreItem> {
    vec![
        score("business_viability", 20),
        score("market_opportunity", 15),
        score("innovation", 10),
        score("team_capacity", 10),
        score("financial_management", 10),
        score("social_impact", 7),
    ]
}

pub(super) async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Mailer whose transport is always down.
#[derive(Default)]
pub(super) struct FailingMailer;

impl Mailer for FailingMailer {
    fn send(&self, _message: EmailMessage) -> Result<(), MailError> {
        Err(MailError::Transport("smtp relay offline".to_string()))
    }
}
