//! Page and action guard shared by every protected route.
//!
//! Each route names an allow-list; the guard resolves the session's role string and either
//! admits the user or produces the redirect the browser should follow. Nothing else about the
//! request is inspected before the guard passes.

use axum::response::{IntoResponse, Redirect, Response};

use super::domain::{Role, UserProfile};

pub const LOGIN_PATH: &str = "/auth/login";

pub const APPLICANT_ONLY: &[Role] = &[Role::Applicant];
pub const SCORERS: &[Role] = &[
    Role::Reviewer1,
    Role::Reviewer2,
    Role::TechnicalReviewer,
    Role::Admin,
];
pub const FLAG_REVIEWERS: &[Role] = &[Role::Reviewer1, Role::Reviewer2, Role::Admin];
pub const LOCKERS: &[Role] = &[Role::Reviewer2, Role::Admin];
pub const DECISION_MAKERS: &[Role] = &[
    Role::Reviewer1,
    Role::Reviewer2,
    Role::TechnicalReviewer,
    Role::Admin,
];
pub const REVIEW_READERS: &[Role] = &[
    Role::Reviewer1,
    Role::Reviewer2,
    Role::TechnicalReviewer,
    Role::Oversight,
    Role::Admin,
];
pub const EXPORTERS: &[Role] = &[Role::Oversight, Role::Admin];
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Why the guard refused a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDenied {
    Unauthenticated,
    UnknownRole { role: String },
    Forbidden { role: Role },
}

impl AccessDenied {
    pub fn redirect_path(&self) -> &'static str {
        match self {
            AccessDenied::Unauthenticated | AccessDenied::UnknownRole { .. } => LOGIN_PATH,
            AccessDenied::Forbidden { role } => role.home_path(),
        }
    }
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        Redirect::to(self.redirect_path()).into_response()
    }
}

/// Signed-in user whose role passed an allow-list check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub profile: UserProfile,
    pub role: Role,
}

pub fn authorize(
    session: Option<UserProfile>,
    allowed: &[Role],
) -> Result<Authorized, AccessDenied> {
    let profile = session.ok_or(AccessDenied::Unauthenticated)?;
    let role = profile.role().ok_or_else(|| AccessDenied::UnknownRole {
        role: profile.role.clone(),
    })?;

    if !allowed.contains(&role) {
        tracing::debug!(user = %profile.id.0, role = role.label(), "access denied");
        return Err(AccessDenied::Forbidden { role });
    }

    Ok(Authorized { profile, role })
}
