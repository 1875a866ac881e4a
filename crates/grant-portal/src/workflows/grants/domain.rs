use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::review::ReviewDecision;

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for portal users (applicants, reviewers, staff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EligibilityResultId(pub String);

/// Roles recognised by the access guard. Profiles store the raw string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "applicant")]
    Applicant,
    #[serde(rename = "reviewer_1")]
    Reviewer1,
    #[serde(rename = "reviewer_2")]
    Reviewer2,
    #[serde(rename = "technical_reviewer")]
    TechnicalReviewer,
    #[serde(rename = "oversight")]
    Oversight,
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Applicant,
        Role::Reviewer1,
        Role::Reviewer2,
        Role::TechnicalReviewer,
        Role::Oversight,
        Role::Admin,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Role::Applicant => "applicant",
            Role::Reviewer1 => "reviewer_1",
            Role::Reviewer2 => "reviewer_2",
            Role::TechnicalReviewer => "technical_reviewer",
            Role::Oversight => "oversight",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        let normalized = raw.trim().to_ascii_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.label() == normalized)
    }

    /// Landing page a signed-in user is sent to when a page refuses their role.
    pub const fn home_path(self) -> &'static str {
        match self {
            Role::Applicant => "/dashboard",
            Role::Reviewer1 | Role::Reviewer2 | Role::TechnicalReviewer => "/reviewer",
            Role::Oversight => "/oversight",
            Role::Admin => "/admin",
        }
    }
}

/// Portal account as stored by the identity provider and mirrored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl UserProfile {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

/// Company registration state declared during screening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    InProgress,
    NotRegistered,
}

/// Applicant-declared business facts consumed by the eligibility screening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningAnswers {
    pub registration_status: RegistrationStatus,
    pub years_operating: f32,
    pub annual_revenue: u64,
    pub employee_count: u32,
    pub founder_age: u8,
    pub keeps_financial_records: bool,
    #[serde(default)]
    pub has_business_bank_account: bool,
    #[serde(default)]
    pub has_business_plan: bool,
}

/// Programme tier assigned by the screening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Foundation,
    Acceleration,
}

impl Track {
    pub const fn label(self) -> &'static str {
        match self {
            Track::Foundation => "foundation",
            Track::Acceleration => "acceleration",
        }
    }

    pub fn parse(raw: &str) -> Option<Track> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "foundation" => Some(Track::Foundation),
            "acceleration" => Some(Track::Acceleration),
            _ => None,
        }
    }
}

/// Descriptive business details captured alongside the screening answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub business_name: String,
    pub sector: String,
    pub county: String,
    #[serde(default)]
    pub summary: String,
}

/// Payload an applicant submits from the application form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub business: BusinessProfile,
    pub screening: ScreeningAnswers,
}

/// High level status tracked throughout the review workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    Shortlisted,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<ApplicationStatus> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "submitted" => Some(ApplicationStatus::Submitted),
            "under_review" => Some(ApplicationStatus::UnderReview),
            "shortlisted" => Some(ApplicationStatus::Shortlisted),
            "approved" => Some(ApplicationStatus::Approved),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

/// Persisted application. Status only moves through review transitions; records are never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub applicant_id: UserId,
    pub business: BusinessProfile,
    pub screening: ScreeningAnswers,
    pub track: Track,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub decisions: Vec<ReviewDecision>,
}

/// The five reviewer-confirmed eligibility criteria.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityFlags {
    pub age: bool,
    pub registration: bool,
    pub revenue: bool,
    pub business_plan: bool,
    pub impact: bool,
}

impl EligibilityFlags {
    pub fn all_met(&self) -> bool {
        self.age && self.registration && self.revenue && self.business_plan && self.impact
    }
}

/// Reviewer-maintained scoring and approval record, one per application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub id: EligibilityResultId,
    pub application_id: ApplicationId,
    pub flags: EligibilityFlags,
    pub total_score: Option<u32>,
    pub is_eligible: bool,
    pub is_locked: bool,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub locked_by: Option<UserId>,
    pub locked_at: Option<DateTime<Utc>>,
}

impl EligibilityResult {
    pub fn new(id: EligibilityResultId, application_id: ApplicationId) -> Self {
        Self {
            id,
            application_id,
            flags: EligibilityFlags::default(),
            total_score: None,
            is_eligible: false,
            is_locked: false,
            reviewed_by: None,
            reviewed_at: None,
            locked_by: None,
            locked_at: None,
        }
    }
}

/// Score a reviewer entered for one rubric criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationScore {
    pub eligibility_result_id: EligibilityResultId,
    pub criteria_id: String,
    pub score: u16,
    pub comment: Option<String>,
    pub scored_by: UserId,
    pub updated_at: DateTime<Utc>,
}

/// One row of a scoring form as submitted by a reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreItem {
    pub criteria_id: String,
    pub score: u16,
    #[serde(default)]
    pub comment: Option<String>,
}
