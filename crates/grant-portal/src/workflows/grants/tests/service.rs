use std::sync::Arc;

use super::common::*;
use crate::config::PortalConfig;
use crate::workflows::grants::access::{authorize, APPLICANT_ONLY};
use crate::workflows::grants::domain::{
    ApplicationId, ApplicationStatus, EligibilityFlags, Role, Track, UserId,
};
use crate::workflows::grants::memory::{InMemoryPageCache, InMemoryPortalRepository};
use crate::workflows::grants::repository::{ApplicationFilter, PortalRepository, RepositoryError};
use crate::workflows::grants::review::{ReviewAction, ReviewTier, TransitionError};
use crate::workflows::grants::scoring::ScoreValidationError;
use crate::workflows::grants::service::{GrantPortalService, PortalServiceError};

const ALL_MET: EligibilityFlags = EligibilityFlags {
    age: true,
    registration: true,
    revenue: true,
    business_plan: true,
    impact: true,
};

fn submitted(harness: &Harness) -> ApplicationId {
    let applicant = signed_in(harness, APPLICANT);
    harness
        .service
        .submit(&applicant, submission())
        .expect("submission accepted")
        .id
}

/// Submit, confirm all flags, score above the pass mark, and lock.
fn finalized(harness: &Harness) -> ApplicationId {
    let id = submitted(harness);
    let reviewer = signed_in(harness, REVIEWER_TWO);
    harness
        .service
        .update_eligibility_flags(&reviewer, &id, ALL_MET)
        .expect("flags saved");
    harness
        .service
        .save_scoring_progress(&reviewer, &id, passing_scores())
        .expect("scores saved");
    harness
        .service
        .lock_result(&reviewer, &id)
        .expect("result locked");
    id
}

#[test]
fn submit_screens_stores_and_acknowledges() {
    let harness = harness();
    let applicant = signed_in(&harness, APPLICANT);

    let application = harness
        .service
        .submit(&applicant, submission())
        .expect("submission accepted");

    assert_eq!(application.track, Track::Acceleration);
    assert_eq!(application.status, ApplicationStatus::Submitted);
    assert_eq!(application.applicant_id, UserId(APPLICANT.to_string()));

    let sent = harness.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, "application_received");
    assert_eq!(sent[0].to, "u-applicant@example.org");
    assert_eq!(sent[0].from, PortalConfig::default().mail_from);
}

#[test]
fn second_submission_from_same_applicant_is_refused() {
    let harness = harness();
    let applicant = signed_in(&harness, APPLICANT);
    harness
        .service
        .submit(&applicant, submission())
        .expect("first submission");

    match harness.service.submit(&applicant, submission()) {
        Err(PortalServiceError::DuplicateApplication) => {}
        other => panic!("expected duplicate refusal, got {other:?}"),
    }
}

#[test]
fn ineligible_submission_is_not_stored() {
    let harness = harness();
    let applicant = signed_in(&harness, APPLICANT);
    let mut rejected = submission();
    rejected.screening.keeps_financial_records = false;

    match harness.service.submit(&applicant, rejected) {
        Err(PortalServiceError::Ineligible(message)) => {
            assert!(message.contains("financial records"), "{message}")
        }
        other => panic!("expected ineligible, got {other:?}"),
    }
    assert!(harness
        .repository
        .list_applications(&ApplicationFilter::default())
        .expect("list")
        .is_empty());
    assert!(harness.mailer.sent().is_empty());
}

#[test]
fn first_score_save_starts_review_and_revalidates_detail_page() {
    let harness = harness();
    let id = submitted(&harness);
    let reviewer = signed_in(&harness, REVIEWER_ONE);

    let progress = harness
        .service
        .save_scoring_progress(&reviewer, &id, passing_scores())
        .expect("scores saved");

    assert_eq!(progress.eligibility.total_score, Some(72));
    assert_eq!(progress.scores.len(), 6);
    assert_eq!(
        progress.eligibility.reviewed_by,
        Some(UserId(REVIEWER_ONE.to_string()))
    );

    let application = harness
        .repository
        .fetch_application(&id)
        .expect("fetch")
        .expect("present");
    assert_eq!(application.status, ApplicationStatus::UnderReview);
    assert_eq!(application.decisions.len(), 1);
    assert_eq!(application.decisions[0].action, ReviewAction::StartReview);
    assert_eq!(application.decisions[0].tier, ReviewTier::First);

    assert!(harness
        .cache
        .revalidated()
        .contains(&format!("/admin/applications/{}", id.0)));
}

#[test]
fn resaving_a_criterion_updates_rather_than_duplicates() {
    let harness = harness();
    let id = submitted(&harness);
    let reviewer = signed_in(&harness, TECHNICAL);

    harness
        .service
        .save_scoring_progress(&reviewer, &id, passing_scores())
        .expect("first save");
    let progress = harness
        .service
        .save_scoring_progress(&reviewer, &id, vec![score("social_impact", 2)])
        .expect("second save");

    assert_eq!(harness.repository.score_row_count(), 6);
    assert_eq!(progress.eligibility.total_score, Some(67));
}

#[test]
fn invalid_batch_writes_nothing() {
    let harness = harness();
    let id = submitted(&harness);
    let reviewer = signed_in(&harness, REVIEWER_ONE);

    let mut items = passing_scores();
    items.push(score("charisma", 4));

    match harness.service.save_scoring_progress(&reviewer, &id, items) {
        Err(PortalServiceError::Validation(ScoreValidationError::UnknownCriterion(criterion))) => {
            assert_eq!(criterion, "charisma")
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(harness.repository.score_row_count(), 0);
}

#[test]
fn scoring_unknown_application_is_not_found() {
    let harness = harness();
    let reviewer = signed_in(&harness, REVIEWER_ONE);

    let err = harness
        .service
        .save_scoring_progress(
            &reviewer,
            &ApplicationId("app-missing".to_string()),
            passing_scores(),
        )
        .expect_err("missing application");
    assert!(matches!(
        err,
        PortalServiceError::Repository(RepositoryError::NotFound)
    ));
}

#[test]
fn locking_requires_scores() {
    let harness = harness();
    let id = submitted(&harness);
    let reviewer = signed_in(&harness, REVIEWER_TWO);

    assert!(matches!(
        harness.service.lock_result(&reviewer, &id),
        Err(PortalServiceError::NotScored)
    ));
}

#[test]
fn locked_result_refuses_scores_until_admin_unlocks() {
    let harness = harness();
    let id = finalized(&harness);
    let reviewer = signed_in(&harness, REVIEWER_ONE);
    let locked = harness
        .repository
        .fetch_result(&id)
        .expect("fetch")
        .expect("present");
    let scores_before = harness.repository.scores_for(&locked.id).expect("scores");
    let revalidations_before = harness.cache.revalidated().len();

    let err = harness
        .service
        .save_scoring_progress(&reviewer, &id, vec![score("innovation", 3)])
        .expect_err("locked");
    assert!(matches!(
        err,
        PortalServiceError::Repository(RepositoryError::Locked)
    ));
    assert_eq!(
        harness.repository.scores_for(&locked.id).expect("scores"),
        scores_before
    );
    let after = harness
        .repository
        .fetch_result(&id)
        .expect("fetch")
        .expect("present");
    assert_eq!(after.total_score, Some(72));
    assert_eq!(after.reviewed_by, locked.reviewed_by);
    assert_eq!(harness.cache.revalidated().len(), revalidations_before);
    assert!(matches!(
        harness
            .service
            .update_eligibility_flags(&reviewer, &id, EligibilityFlags::default()),
        Err(PortalServiceError::Repository(RepositoryError::Locked))
    ));

    let admin = signed_in(&harness, ADMIN);
    let unlocked = harness
        .service
        .unlock_result(&admin, &id)
        .expect("admin unlocks");
    assert!(!unlocked.is_locked);
    assert_eq!(unlocked.locked_by, None);

    let progress = harness
        .service
        .save_scoring_progress(&reviewer, &id, vec![score("innovation", 15)])
        .expect("scoring reopened");
    assert_eq!(progress.eligibility.total_score, Some(77));
}

#[test]
fn unlocking_an_open_result_is_refused() {
    let harness = harness();
    let id = submitted(&harness);
    let reviewer = signed_in(&harness, REVIEWER_TWO);
    harness
        .service
        .save_scoring_progress(&reviewer, &id, passing_scores())
        .expect("scores saved");
    let admin = signed_in(&harness, ADMIN);
    let revalidations_before = harness.cache.revalidated().len();

    let err = harness
        .service
        .unlock_result(&admin, &id)
        .expect_err("result was never locked");
    assert!(matches!(
        err,
        PortalServiceError::Repository(RepositoryError::NotLocked)
    ));
    assert_eq!(harness.cache.revalidated().len(), revalidations_before);

    harness
        .service
        .lock_result(&reviewer, &id)
        .expect("locked");
    harness
        .service
        .unlock_result(&admin, &id)
        .expect("first unlock");
    assert!(matches!(
        harness.service.unlock_result(&admin, &id),
        Err(PortalServiceError::Repository(RepositoryError::NotLocked))
    ));
}

#[test]
fn lock_marks_eligibility_from_flags_and_pass_mark() {
    let harness = harness();
    let id = finalized(&harness);

    let result = harness
        .repository
        .fetch_result(&id)
        .expect("fetch")
        .expect("present");
    assert!(result.is_locked);
    assert!(result.is_eligible);
    assert_eq!(result.total_score, Some(72));
    assert_eq!(result.locked_by, Some(UserId(REVIEWER_TWO.to_string())));
}

#[test]
fn unmet_flag_blocks_approval() {
    let harness = harness();
    let id = submitted(&harness);
    let reviewer = signed_in(&harness, REVIEWER_TWO);
    harness
        .service
        .save_scoring_progress(&reviewer, &id, passing_scores())
        .expect("scores saved");
    let locked = harness
        .service
        .lock_result(&reviewer, &id)
        .expect("locked");
    assert!(!locked.is_eligible);

    let first_tier = signed_in(&harness, REVIEWER_ONE);
    harness
        .service
        .decide(&first_tier, &id, ReviewAction::Shortlist, None)
        .expect("shortlisted");

    assert!(matches!(
        harness
            .service
            .decide(&reviewer, &id, ReviewAction::Approve, None),
        Err(PortalServiceError::NotEligible)
    ));
}

#[test]
fn approval_requires_a_locked_result() {
    let harness = harness();
    let id = submitted(&harness);
    let first_tier = signed_in(&harness, REVIEWER_ONE);
    harness
        .service
        .decide(&first_tier, &id, ReviewAction::Shortlist, None)
        .expect("shortlisted");

    let second_tier = signed_in(&harness, REVIEWER_TWO);
    assert!(matches!(
        harness
            .service
            .decide(&second_tier, &id, ReviewAction::Approve, None),
        Err(PortalServiceError::NotFinalized)
    ));
}

#[test]
fn two_tier_review_approves_and_notifies() {
    let harness = harness();
    let id = finalized(&harness);

    let first_tier = signed_in(&harness, REVIEWER_ONE);
    let shortlisted = harness
        .service
        .decide(
            &first_tier,
            &id,
            ReviewAction::Shortlist,
            Some("strong traction".to_string()),
        )
        .expect("shortlisted");
    assert_eq!(shortlisted.status, ApplicationStatus::Shortlisted);

    let second_tier = signed_in(&harness, REVIEWER_TWO);
    let approved = harness
        .service
        .decide(&second_tier, &id, ReviewAction::Approve, None)
        .expect("approved");
    assert_eq!(approved.status, ApplicationStatus::Approved);

    let tiers: Vec<ReviewTier> = approved
        .decisions
        .iter()
        .map(|decision| decision.tier)
        .collect();
    assert_eq!(
        tiers,
        vec![ReviewTier::First, ReviewTier::First, ReviewTier::Second]
    );
    assert_eq!(
        approved.decisions[1].note.as_deref(),
        Some("strong traction")
    );

    let templates: Vec<String> = harness
        .mailer
        .sent()
        .into_iter()
        .map(|message| message.template)
        .collect();
    assert_eq!(
        templates,
        vec![
            "application_received",
            "application_shortlisted",
            "application_approved"
        ]
    );
}

#[test]
fn first_tier_reviewer_cannot_approve() {
    let harness = harness();
    let id = finalized(&harness);
    let first_tier = signed_in(&harness, REVIEWER_ONE);
    harness
        .service
        .decide(&first_tier, &id, ReviewAction::Shortlist, None)
        .expect("shortlisted");

    match harness
        .service
        .decide(&first_tier, &id, ReviewAction::Approve, None)
    {
        Err(PortalServiceError::Transition(TransitionError::RoleNotPermitted { .. })) => {}
        other => panic!("expected role refusal, got {other:?}"),
    }
}

#[test]
fn reject_then_admin_reopen() {
    let harness = harness();
    let id = submitted(&harness);
    let first_tier = signed_in(&harness, REVIEWER_ONE);
    let rejected = harness
        .service
        .decide(&first_tier, &id, ReviewAction::Reject, None)
        .expect("rejected");
    assert_eq!(rejected.status, ApplicationStatus::Rejected);

    assert!(matches!(
        harness
            .service
            .decide(&first_tier, &id, ReviewAction::Reopen, None),
        Err(PortalServiceError::Transition(
            TransitionError::RoleNotPermitted { .. }
        ))
    ));

    let admin = signed_in(&harness, ADMIN);
    let reopened = harness
        .service
        .decide(&admin, &id, ReviewAction::Reopen, None)
        .expect("reopened");
    assert_eq!(reopened.status, ApplicationStatus::UnderReview);
    assert_eq!(
        reopened.decisions.last().map(|decision| decision.tier),
        Some(ReviewTier::Override)
    );
}

#[test]
fn mail_outage_does_not_undo_submission() {
    let repository = Arc::new(InMemoryPortalRepository::default());
    let service = GrantPortalService::new(
        repository.clone(),
        Arc::new(FailingMailer),
        Arc::new(InMemoryPageCache::default()),
        &PortalConfig::default(),
    );
    service
        .register_user(profile(APPLICANT, Role::Applicant))
        .expect("seed applicant");
    let session = service
        .session_user(&UserId(APPLICANT.to_string()))
        .expect("lookup");
    let applicant = authorize(session, APPLICANT_ONLY).expect("applicant");

    let application = service
        .submit(&applicant, submission())
        .expect("submission survives mail failure");
    assert!(repository
        .fetch_application(&application.id)
        .expect("fetch")
        .is_some());
}

#[test]
fn admin_role_management() {
    let harness = harness();
    let admin = signed_in(&harness, ADMIN);

    let promoted = harness
        .service
        .set_user_role(&admin, &UserId(TECHNICAL.to_string()), "reviewer_2")
        .expect("role changed");
    assert_eq!(promoted.role, "reviewer_2");

    assert!(matches!(
        harness
            .service
            .set_user_role(&admin, &UserId(ADMIN.to_string()), "oversight"),
        Err(PortalServiceError::SelfDemotion)
    ));
    assert!(matches!(
        harness
            .service
            .set_user_role(&admin, &UserId(TECHNICAL.to_string()), "owner"),
        Err(PortalServiceError::InvalidRole(_))
    ));
    assert!(matches!(
        harness
            .service
            .set_user_role(&admin, &UserId("u-nobody".to_string()), "admin"),
        Err(PortalServiceError::Repository(RepositoryError::NotFound))
    ));
}

#[test]
fn evaluator_assignment_is_disabled() {
    let harness = harness();
    let id = submitted(&harness);

    let err = harness
        .service
        .assign_evaluator(&id, &UserId(TECHNICAL.to_string()))
        .expect_err("disabled");
    assert_eq!(err.to_string(), "Evaluator assignment is currently disabled");
    assert!(matches!(
        harness.service.rebalance_workload(),
        Err(PortalServiceError::EvaluatorAssignmentDisabled)
    ));
}

#[test]
fn review_queue_filters_by_status() {
    let harness = harness();
    let id = submitted(&harness);
    let other = signed_in(&harness, SECOND_APPLICANT);
    let mut small = submission();
    small.screening.annual_revenue = 80_000;
    harness
        .service
        .submit(&other, small)
        .expect("second application");

    let reviewer = signed_in(&harness, REVIEWER_ONE);
    harness
        .service
        .save_scoring_progress(&reviewer, &id, passing_scores())
        .expect("scores saved");

    let queue = harness
        .service
        .review_queue(&ApplicationFilter {
            status: Some(ApplicationStatus::UnderReview),
            ..ApplicationFilter::default()
        })
        .expect("queue");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].application_id, id);
    assert_eq!(queue[0].total_score, Some(72));

    let foundation = harness
        .service
        .review_queue(&ApplicationFilter {
            track: Some(Track::Foundation),
            ..ApplicationFilter::default()
        })
        .expect("queue");
    assert_eq!(foundation.len(), 1);
    assert_eq!(foundation[0].total_score, None);
}
