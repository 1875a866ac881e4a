use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationStatus, Role, UserId};

/// Reviewer or admin action that moves an application between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    StartReview,
    Shortlist,
    Approve,
    Reject,
    Reopen,
}

impl ReviewAction {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewAction::StartReview => "start_review",
            ReviewAction::Shortlist => "shortlist",
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
            ReviewAction::Reopen => "reopen",
        }
    }
}

/// Which review layer a decision belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewTier {
    First,
    Second,
    Override,
}

/// Audit entry appended to an application for every status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub tier: ReviewTier,
    pub action: ReviewAction,
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub actor: UserId,
    #[serde(default)]
    pub note: Option<String>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error(
        "cannot {verb} an application that is {state}",
        verb = .action.label(),
        state = .status.label()
    )]
    InvalidTransition {
        action: ReviewAction,
        status: ApplicationStatus,
    },
    #[error(
        "role {who} may not {verb} an application that is {state}",
        who = .role.label(),
        verb = .action.label(),
        state = .status.label()
    )]
    RoleNotPermitted {
        role: Role,
        action: ReviewAction,
        status: ApplicationStatus,
    },
}

/// A permitted move: target status plus the tier it is recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub to: ApplicationStatus,
    pub tier: ReviewTier,
    roles: &'static [Role],
}

const START_REVIEW_ROLES: &[Role] = &[
    Role::Reviewer1,
    Role::Reviewer2,
    Role::TechnicalReviewer,
    Role::Admin,
];
const FIRST_TIER_ROLES: &[Role] = &[Role::Reviewer1, Role::Admin];
const SECOND_TIER_ROLES: &[Role] = &[Role::Reviewer2, Role::Admin];
const OVERRIDE_ROLES: &[Role] = &[Role::Admin];

fn transition_for(action: ReviewAction, status: ApplicationStatus) -> Option<Transition> {
    use ApplicationStatus::*;

    let (to, tier, roles) = match (action, status) {
        (ReviewAction::StartReview, Submitted) => {
            (UnderReview, ReviewTier::First, START_REVIEW_ROLES)
        }
        (ReviewAction::Shortlist, Submitted | UnderReview) => {
            (Shortlisted, ReviewTier::First, FIRST_TIER_ROLES)
        }
        (ReviewAction::Reject, Submitted | UnderReview) => {
            (Rejected, ReviewTier::First, FIRST_TIER_ROLES)
        }
        (ReviewAction::Approve, Shortlisted) => (Approved, ReviewTier::Second, SECOND_TIER_ROLES),
        (ReviewAction::Reject, Shortlisted) => (Rejected, ReviewTier::Second, SECOND_TIER_ROLES),
        (ReviewAction::Reopen, Approved | Rejected) => {
            (UnderReview, ReviewTier::Override, OVERRIDE_ROLES)
        }
        _ => return None,
    };

    Some(Transition { to, tier, roles })
}

/// Resolve the move for `role` taking `action` on an application in `status`.
pub fn plan_transition(
    status: ApplicationStatus,
    action: ReviewAction,
    role: Role,
) -> Result<Transition, TransitionError> {
    let transition = transition_for(action, status)
        .ok_or(TransitionError::InvalidTransition { action, status })?;

    if !transition.roles.contains(&role) {
        return Err(TransitionError::RoleNotPermitted {
            role,
            action,
            status,
        });
    }

    Ok(transition)
}
