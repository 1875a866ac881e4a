//! Grant application intake, eligibility screening, reviewer scoring, and the two-tier
//! review workflow.
//!
//! Storage, e-mail delivery, and page-cache invalidation sit behind the traits in
//! [`repository`]; [`memory`] provides the process-local adapters the API binary runs on.

pub mod access;
pub mod domain;
pub mod export;
pub mod memory;
pub mod notifications;
pub mod repository;
pub mod review;
pub mod roster;
pub mod router;
pub mod scoring;
pub mod screening;
pub mod service;
pub mod views;

#[cfg(test)]
mod tests;

pub use access::{authorize, AccessDenied, Authorized};
pub use domain::{
    Application, ApplicationId, ApplicationScore, ApplicationStatus, ApplicationSubmission,
    BusinessProfile, EligibilityFlags, EligibilityResult, EligibilityResultId,
    RegistrationStatus, Role, ScoreItem, ScreeningAnswers, Track, UserId, UserProfile,
};
pub use export::{ExportError, ExportFile, ExportFormat, ExportKind, ExportRequest};
pub use memory::{InMemoryMailer, InMemoryPageCache, InMemoryPortalRepository};
pub use notifications::EmailTemplate;
pub use repository::{
    ApplicationFilter, EmailMessage, MailError, Mailer, PageCache, PortalRepository,
    RepositoryError,
};
pub use review::{ReviewAction, ReviewDecision, ReviewTier, TransitionError};
pub use roster::{RosterImportError, UserRosterImporter};
pub use router::{portal_router, SESSION_HEADER};
pub use scoring::{ScoreValidationError, ScoringRubric};
pub use screening::{screen, ScreeningOutcome, ScreeningRules};
pub use service::{GrantPortalService, PortalServiceError, EVALUATOR_ASSIGNMENT_DISABLED};
pub use views::ActionResult;
