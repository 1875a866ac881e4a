use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::access::Authorized;
use super::domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationSubmission, EligibilityFlags,
    EligibilityResult, Role, ScoreItem, ScreeningAnswers, UserId, UserProfile,
};
use super::export::{self, ExportError, ExportFile, ExportPlan, ExportRequest};
use super::notifications::EmailTemplate;
use super::repository::{
    admin_application_path, ApplicationFilter, Mailer, PageCache, PortalRepository,
    RepositoryError,
};
use super::review::{plan_transition, ReviewAction, ReviewDecision, TransitionError};
use super::scoring::{self, ScoreValidationError, ScoringRubric};
use super::screening::{screen, ScreeningOutcome, ScreeningRules};
use super::views::{
    ApplicantDashboardView, ApplicationDetailView, ApplicationStatusView, ApplicationSummaryView,
    ScoringProgress,
};
use crate::config::PortalConfig;

pub const EVALUATOR_ASSIGNMENT_DISABLED: &str = "Evaluator assignment is currently disabled";

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

/// Service composing screening, scoring, review transitions, and notifications over a repository.
pub struct GrantPortalService<R, M, C> {
    repository: Arc<R>,
    mailer: Arc<M>,
    cache: Arc<C>,
    rules: ScreeningRules,
    rubric: ScoringRubric,
    pass_mark: u32,
    mail_from: String,
}

impl<R, M, C> GrantPortalService<R, M, C>
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    pub fn new(repository: Arc<R>, mailer: Arc<M>, cache: Arc<C>, config: &PortalConfig) -> Self {
        Self {
            repository,
            mailer,
            cache,
            rules: ScreeningRules::from_config(config),
            rubric: ScoringRubric::standard(),
            pass_mark: config.pass_mark,
            mail_from: config.mail_from.clone(),
        }
    }

    pub fn rubric(&self) -> &ScoringRubric {
        &self.rubric
    }

    /// Run the eligibility screening without persisting anything.
    pub fn screen(&self, answers: &ScreeningAnswers) -> ScreeningOutcome {
        screen(answers, &self.rules)
    }

    pub fn session_user(&self, id: &UserId) -> Result<Option<UserProfile>, PortalServiceError> {
        Ok(self.repository.fetch_user(id)?)
    }

    /// Screen and persist a new application for the signed-in applicant.
    pub fn submit(
        &self,
        applicant: &Authorized,
        submission: ApplicationSubmission,
    ) -> Result<Application, PortalServiceError> {
        let applicant_id = applicant.profile.id.clone();
        let existing = self.repository.list_applications(&ApplicationFilter {
            applicant_id: Some(applicant_id.clone()),
            ..ApplicationFilter::default()
        })?;
        if !existing.is_empty() {
            return Err(PortalServiceError::DuplicateApplication);
        }

        let outcome = self.screen(&submission.screening);
        let track = match outcome.track() {
            Some(track) => track,
            None => return Err(PortalServiceError::Ineligible(outcome.summary())),
        };

        let now = Utc::now();
        let application = Application {
            id: next_application_id(),
            applicant_id,
            business: submission.business,
            screening: submission.screening,
            track,
            status: ApplicationStatus::Submitted,
            submitted_at: now,
            updated_at: now,
            decisions: Vec::new(),
        };

        let stored = self.repository.insert_application(application)?;
        info!(
            application = %stored.id.0,
            track = stored.track.label(),
            "application submitted"
        );
        self.notify(
            EmailTemplate::ApplicationReceived,
            &applicant.profile,
            &stored,
        );
        Ok(stored)
    }

    pub fn dashboard(
        &self,
        applicant: &Authorized,
    ) -> Result<ApplicantDashboardView, PortalServiceError> {
        let applications = self.repository.list_applications(&ApplicationFilter {
            applicant_id: Some(applicant.profile.id.clone()),
            ..ApplicationFilter::default()
        })?;

        Ok(ApplicantDashboardView {
            user: applicant.profile.clone(),
            application: applications.first().map(ApplicationStatusView::from),
        })
    }

    pub fn review_queue(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ApplicationSummaryView>, PortalServiceError> {
        let applications = self.repository.list_applications(filter)?;
        let mut queue = Vec::with_capacity(applications.len());

        for application in applications {
            let result = self.repository.fetch_result(&application.id)?;
            queue.push(ApplicationSummaryView {
                application_id: application.id,
                business_name: application.business.business_name,
                track: application.track,
                status: application.status,
                submitted_at: application.submitted_at,
                total_score: result.as_ref().and_then(|result| result.total_score),
                is_locked: result.map(|result| result.is_locked).unwrap_or(false),
            });
        }

        Ok(queue)
    }

    pub fn application_detail(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationDetailView, PortalServiceError> {
        let application = self
            .repository
            .fetch_application(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        let eligibility = self.repository.fetch_result(application_id)?;
        let scores = match &eligibility {
            Some(result) => self.repository.scores_for(&result.id)?,
            None => Vec::new(),
        };

        Ok(ApplicationDetailView {
            application,
            eligibility,
            scores,
            rubric: self.rubric.clone(),
        })
    }

    /// Upsert a reviewer's criterion scores. The batch is validated up front and written as a
    /// unit together with the new total; a locked result refuses the whole batch.
    pub fn save_scoring_progress(
        &self,
        reviewer: &Authorized,
        application_id: &ApplicationId,
        items: Vec<ScoreItem>,
    ) -> Result<ScoringProgress, PortalServiceError> {
        scoring::validate_items(&self.rubric, &items)?;

        let (result, scores) =
            self.repository
                .upsert_scores(application_id, &reviewer.profile.id, &items)?;

        self.repository.update_application_with(
            application_id,
            |application, _| -> Result<(), PortalServiceError> {
                if application.status == ApplicationStatus::Submitted {
                    record_transition(application, reviewer, ReviewAction::StartReview, None)?;
                }
                Ok(())
            },
        )?;

        self.cache.revalidate(&admin_application_path(application_id));
        info!(
            application = %application_id.0,
            reviewer = %reviewer.profile.id.0,
            criteria = items.len(),
            "scoring progress saved"
        );

        Ok(ScoringProgress {
            eligibility: result,
            scores,
        })
    }

    pub fn update_eligibility_flags(
        &self,
        reviewer: &Authorized,
        application_id: &ApplicationId,
        flags: EligibilityFlags,
    ) -> Result<EligibilityResult, PortalServiceError> {
        let result = self.repository.update_result_with(
            application_id,
            |result, _| -> Result<(), PortalServiceError> {
                result.flags = flags;
                result.reviewed_by = Some(reviewer.profile.id.clone());
                result.reviewed_at = Some(Utc::now());
                Ok(())
            },
        )?;
        self.cache.revalidate(&admin_application_path(application_id));
        Ok(result)
    }

    /// Finalize the eligibility result: tally, decide eligibility, and freeze it.
    pub fn lock_result(
        &self,
        reviewer: &Authorized,
        application_id: &ApplicationId,
    ) -> Result<EligibilityResult, PortalServiceError> {
        let pass_mark = self.pass_mark;
        let result = self.repository.update_result_with(
            application_id,
            |result, scores| -> Result<(), PortalServiceError> {
                if scores.is_empty() {
                    return Err(PortalServiceError::NotScored);
                }
                scoring::finalize(result, scores, pass_mark);
                result.is_locked = true;
                result.locked_by = Some(reviewer.profile.id.clone());
                result.locked_at = Some(Utc::now());
                Ok(())
            },
        )?;

        self.cache.revalidate(&admin_application_path(application_id));
        info!(
            application = %application_id.0,
            total = result.total_score.unwrap_or_default(),
            eligible = result.is_eligible,
            "eligibility result locked"
        );
        Ok(result)
    }

    pub fn unlock_result(
        &self,
        admin: &Authorized,
        application_id: &ApplicationId,
    ) -> Result<EligibilityResult, PortalServiceError> {
        let result = self.repository.unlock_result(application_id)?;
        self.cache.revalidate(&admin_application_path(application_id));
        warn!(
            application = %application_id.0,
            admin = %admin.profile.id.0,
            "eligibility result unlocked"
        );
        Ok(result)
    }

    /// Apply a review decision against the stored status. Approval also requires a locked,
    /// eligible result at the moment the decision is recorded.
    pub fn decide(
        &self,
        actor: &Authorized,
        application_id: &ApplicationId,
        action: ReviewAction,
        note: Option<String>,
    ) -> Result<Application, PortalServiceError> {
        let updated = self.repository.update_application_with(
            application_id,
            |application, result| -> Result<(), PortalServiceError> {
                if action == ReviewAction::Approve {
                    match result {
                        Some(result) if result.is_locked && result.is_eligible => {}
                        Some(result) if result.is_locked => {
                            return Err(PortalServiceError::NotEligible)
                        }
                        _ => return Err(PortalServiceError::NotFinalized),
                    }
                }
                record_transition(application, actor, action, note)
            },
        )?;

        self.cache.revalidate(&admin_application_path(application_id));
        info!(
            application = %updated.id.0,
            action = action.label(),
            status = updated.status.label(),
            actor = %actor.profile.id.0,
            "review decision recorded"
        );

        let template = match updated.status {
            ApplicationStatus::Shortlisted => Some(EmailTemplate::Shortlisted),
            ApplicationStatus::Approved => Some(EmailTemplate::Approved),
            ApplicationStatus::Rejected => Some(EmailTemplate::Rejected),
            ApplicationStatus::Submitted | ApplicationStatus::UnderReview => None,
        };
        if let Some(template) = template {
            match self.repository.fetch_user(&updated.applicant_id) {
                Ok(Some(applicant)) => self.notify(template, &applicant, &updated),
                Ok(None) => warn!(
                    application = %updated.id.0,
                    "applicant profile missing; decision e-mail skipped"
                ),
                Err(err) => warn!(
                    application = %updated.id.0,
                    error = %err,
                    "applicant lookup failed; decision e-mail skipped"
                ),
            }
        }

        Ok(updated)
    }

    /// Kept for API compatibility; assignment is not offered.
    pub fn assign_evaluator(
        &self,
        _application_id: &ApplicationId,
        _evaluator_id: &UserId,
    ) -> Result<(), PortalServiceError> {
        Err(PortalServiceError::EvaluatorAssignmentDisabled)
    }

    pub fn rebalance_workload(&self) -> Result<(), PortalServiceError> {
        Err(PortalServiceError::EvaluatorAssignmentDisabled)
    }

    pub fn list_users(&self) -> Result<Vec<UserProfile>, PortalServiceError> {
        Ok(self.repository.list_users()?)
    }

    pub fn register_user(&self, profile: UserProfile) -> Result<UserProfile, PortalServiceError> {
        if profile.role().is_none() {
            return Err(PortalServiceError::InvalidRole(profile.role));
        }
        Ok(self.repository.upsert_user(profile)?)
    }

    pub fn set_user_role(
        &self,
        admin: &Authorized,
        user_id: &UserId,
        role: &str,
    ) -> Result<UserProfile, PortalServiceError> {
        let role =
            Role::parse(role).ok_or_else(|| PortalServiceError::InvalidRole(role.to_string()))?;
        if &admin.profile.id == user_id && role != Role::Admin {
            return Err(PortalServiceError::SelfDemotion);
        }

        let mut profile = self
            .repository
            .fetch_user(user_id)?
            .ok_or(RepositoryError::NotFound)?;
        profile.role = role.label().to_string();
        let stored = self.repository.upsert_user(profile)?;
        info!(
            user = %stored.id.0,
            role = role.label(),
            admin = %admin.profile.id.0,
            "user role changed"
        );
        Ok(stored)
    }

    pub fn export(
        &self,
        request: &ExportRequest,
        generated_on: NaiveDate,
    ) -> Result<ExportFile, PortalServiceError> {
        let plan = ExportPlan::from_request(request)?;
        let table = export::collect_table(self.repository.as_ref(), &plan)?;
        let file = export::encode(&table, &plan, generated_on)?;
        info!(
            kind = plan.kind.label(),
            format = plan.format.extension(),
            rows = table.rows.len(),
            "export generated"
        );
        Ok(file)
    }

    fn notify(&self, template: EmailTemplate, recipient: &UserProfile, application: &Application) {
        let message = template.render(&self.mail_from, recipient, application);
        if let Err(err) = self.mailer.send(message) {
            warn!(
                application = %application.id.0,
                template = template.key(),
                error = %err,
                "transactional e-mail not delivered"
            );
        }
    }
}

/// Plan `action` against the application's current status and append it to the trail.
fn record_transition(
    application: &mut Application,
    actor: &Authorized,
    action: ReviewAction,
    note: Option<String>,
) -> Result<(), PortalServiceError> {
    let transition = plan_transition(application.status, action, actor.role)?;
    let now = Utc::now();

    application.decisions.push(ReviewDecision {
        tier: transition.tier,
        action,
        from: application.status,
        to: transition.to,
        actor: actor.profile.id.clone(),
        note,
        decided_at: now,
    });
    application.status = transition.to;
    application.updated_at = now;
    Ok(())
}

/// Error raised by the portal service.
#[derive(Debug, thiserror::Error)]
pub enum PortalServiceError {
    #[error("{0}")]
    Ineligible(String),
    #[error("an application has already been submitted for this account")]
    DuplicateApplication,
    #[error(transparent)]
    Validation(#[from] ScoreValidationError),
    #[error("eligibility result has no scores to finalize")]
    NotScored,
    #[error("approval requires a locked eligibility result")]
    NotFinalized,
    #[error("application did not meet the eligibility criteria")]
    NotEligible,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("unknown role '{0}'")]
    InvalidRole(String),
    #[error("admins cannot remove their own admin role")]
    SelfDemotion,
    #[error("{}", EVALUATOR_ASSIGNMENT_DISABLED)]
    EvaluatorAssignmentDisabled,
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
