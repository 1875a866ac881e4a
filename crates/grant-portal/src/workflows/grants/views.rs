use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, ApplicationScore, ApplicationStatus, EligibilityResult, Track,
    UserProfile,
};
use super::scoring::ScoringRubric;

/// Envelope returned by every form action, consumed by the UI as a toast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// What an applicant sees about their own submission.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub business_name: String,
    pub track: Track,
    pub status: &'static str,
    pub submitted_at: DateTime<Utc>,
}

impl From<&Application> for ApplicationStatusView {
    fn from(application: &Application) -> Self {
        Self {
            application_id: application.id.clone(),
            business_name: application.business.business_name.clone(),
            track: application.track,
            status: application.status.label(),
            submitted_at: application.submitted_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicantDashboardView {
    pub user: UserProfile,
    pub application: Option<ApplicationStatusView>,
}

/// Row of the reviewer queue.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationSummaryView {
    pub application_id: ApplicationId,
    pub business_name: String,
    pub track: Track,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub total_score: Option<u32>,
    pub is_locked: bool,
}

/// Admin detail page: the record, its eligibility result, and the scores behind it.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDetailView {
    pub application: Application,
    pub eligibility: Option<EligibilityResult>,
    pub scores: Vec<ApplicationScore>,
    pub rubric: ScoringRubric,
}

/// Returned after a reviewer saves the scoring form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringProgress {
    pub eligibility: EligibilityResult,
    pub scores: Vec<ApplicationScore>,
}
