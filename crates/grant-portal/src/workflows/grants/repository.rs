use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, ApplicationScore, ApplicationStatus, EligibilityResult,
    EligibilityResultId, ScoreItem, Track, UserId, UserProfile,
};

/// Narrowing applied to application listings and exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub track: Option<Track>,
    #[serde(default)]
    pub applicant_id: Option<UserId>,
}

impl ApplicationFilter {
    pub fn matches(&self, application: &Application) -> bool {
        self.status
            .map(|status| application.status == status)
            .unwrap_or(true)
            && self
                .track
                .map(|track| application.track == track)
                .unwrap_or(true)
            && self
                .applicant_id
                .as_ref()
                .map(|applicant| &application.applicant_id == applicant)
                .unwrap_or(true)
    }
}

/// Storage abstraction standing in for the relational database.
///
/// Every mutation of an existing application or eligibility result is a read-modify-write that
/// the implementation performs in one critical section, so concurrent requests serialize on
/// the stored row instead of overwriting each other's snapshots. Lock enforcement lives here
/// too: `update_result_with` and `upsert_scores` refuse a result whose stored row is locked.
pub trait PortalRepository: Send + Sync {
    fn insert_application(&self, application: Application)
        -> Result<Application, RepositoryError>;
    fn fetch_application(&self, id: &ApplicationId)
        -> Result<Option<Application>, RepositoryError>;
    fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError>;

    /// Edits the stored application in place. `edit` also sees the application's current
    /// eligibility result; nothing is stored when it fails.
    fn update_application_with<F, E>(&self, id: &ApplicationId, edit: F) -> Result<Application, E>
    where
        F: FnOnce(&mut Application, Option<&EligibilityResult>) -> Result<(), E>,
        E: From<RepositoryError>,
        Self: Sized;

    fn fetch_result(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<EligibilityResult>, RepositoryError>;
    /// Edits the application's result, creating an empty one if none exists yet. Fails with
    /// `Locked` when the stored row is locked. `edit` sees the current score rows; nothing,
    /// including a newly created result, is stored when it fails.
    fn update_result_with<F, E>(
        &self,
        application_id: &ApplicationId,
        edit: F,
    ) -> Result<EligibilityResult, E>
    where
        F: FnOnce(&mut EligibilityResult, &[ApplicationScore]) -> Result<(), E>,
        E: From<RepositoryError>,
        Self: Sized;
    /// Clears the lock. Fails with `NotLocked` when the result is not locked.
    fn unlock_result(
        &self,
        application_id: &ApplicationId,
    ) -> Result<EligibilityResult, RepositoryError>;
    fn list_results(&self) -> Result<Vec<EligibilityResult>, RepositoryError>;

    /// Upserts every item by `(result_id, criteria_id)`, then recomputes the result's total and
    /// stamps the reviewer. Either all of that is written or none of it.
    fn upsert_scores(
        &self,
        application_id: &ApplicationId,
        scored_by: &UserId,
        items: &[ScoreItem],
    ) -> Result<(EligibilityResult, Vec<ApplicationScore>), RepositoryError>;
    fn scores_for(
        &self,
        result_id: &EligibilityResultId,
    ) -> Result<Vec<ApplicationScore>, RepositoryError>;

    fn fetch_user(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError>;
    fn upsert_user(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError>;
    fn list_users(&self) -> Result<Vec<UserProfile>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("eligibility result is locked")]
    Locked,
    #[error("eligibility result is not locked")]
    NotLocked,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound transactional e-mail hook (the delivery provider sits behind it).
pub trait Mailer: Send + Sync {
    fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Rendered e-mail handed to the delivery provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub template: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub application_id: ApplicationId,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Invalidation hook for rendered pages that embed application data.
pub trait PageCache: Send + Sync {
    fn revalidate(&self, path: &str);
}

/// Cache path of the admin detail page for an application.
pub fn admin_application_path(id: &ApplicationId) -> String {
    format!("/admin/applications/{}", id.0)
}
