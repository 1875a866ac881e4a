use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::access::{self, authorize, Authorized};
use super::domain::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, EligibilityFlags, Role, ScoreItem,
    ScreeningAnswers, Track, UserId,
};
use super::export::ExportRequest;
use super::repository::{ApplicationFilter, Mailer, PageCache, PortalRepository, RepositoryError};
use super::review::{ReviewAction, TransitionError};
use super::service::{GrantPortalService, PortalServiceError};
use super::views::ActionResult;

/// Header the upstream auth provider sets to the signed-in user's id.
pub const SESSION_HEADER: &str = "x-portal-user";

type SharedService<R, M, C> = Arc<GrantPortalService<R, M, C>>;

/// Router exposing the role-gated pages and form actions.
pub fn portal_router<R, M, C>(service: SharedService<R, M, C>) -> Router
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    Router::new()
        .route("/dashboard", get(dashboard_page::<R, M, C>))
        .route("/reviewer/applications", get(review_queue_page::<R, M, C>))
        .route(
            "/admin/applications/:application_id",
            get(application_detail_page::<R, M, C>),
        )
        .route("/admin/users", get(users_page::<R, M, C>))
        .route("/api/screening", post(screening_handler::<R, M, C>))
        .route("/api/applications", post(submit_handler::<R, M, C>))
        .route(
            "/api/applications/:application_id/scores",
            post(save_scores_handler::<R, M, C>),
        )
        .route(
            "/api/applications/:application_id/eligibility",
            post(eligibility_flags_handler::<R, M, C>),
        )
        .route(
            "/api/applications/:application_id/lock",
            post(lock_handler::<R, M, C>),
        )
        .route(
            "/api/applications/:application_id/unlock",
            post(unlock_handler::<R, M, C>),
        )
        .route(
            "/api/applications/:application_id/decision",
            post(decision_handler::<R, M, C>),
        )
        .route(
            "/api/applications/:application_id/evaluator",
            post(assign_evaluator_handler::<R, M, C>),
        )
        .route("/api/users/:user_id/role", put(user_role_handler::<R, M, C>))
        .route("/api/export", post(export_handler::<R, M, C>))
        .with_state(service)
}

/// Resolve the session and run the allow-list check before any page data is read.
fn guard<R, M, C>(
    service: &GrantPortalService<R, M, C>,
    headers: &HeaderMap,
    allowed: &[Role],
) -> Result<Authorized, Response>
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    let session = match headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(user_id) => service
            .session_user(&UserId(user_id.to_string()))
            .map_err(failure)?,
        None => None,
    };

    authorize(session, allowed).map_err(IntoResponse::into_response)
}

/// Unwrap a body or query extractor once the guard has passed; malformed input is a 400.
fn decoded<T, E: std::fmt::Display>(input: Result<T, E>) -> Result<T, Response> {
    input.map_err(|rejection| {
        let payload: ActionResult<()> = ActionResult::failure(rejection.to_string());
        (StatusCode::BAD_REQUEST, Json(payload)).into_response()
    })
}

fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(ActionResult::ok(data))).into_response()
}

/// Collapse a service error into the `{success: false, error}` envelope.
pub(crate) fn failure(error: PortalServiceError) -> Response {
    let status = match &error {
        PortalServiceError::Ineligible(_)
        | PortalServiceError::Validation(_)
        | PortalServiceError::NotScored
        | PortalServiceError::NotFinalized
        | PortalServiceError::NotEligible
        | PortalServiceError::Transition(TransitionError::InvalidTransition { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PortalServiceError::Transition(TransitionError::RoleNotPermitted { .. })
        | PortalServiceError::SelfDemotion => StatusCode::FORBIDDEN,
        PortalServiceError::DuplicateApplication
        | PortalServiceError::Repository(RepositoryError::Conflict)
        | PortalServiceError::Repository(RepositoryError::Locked)
        | PortalServiceError::Repository(RepositoryError::NotLocked) => StatusCode::CONFLICT,
        PortalServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        PortalServiceError::InvalidRole(_) => StatusCode::BAD_REQUEST,
        PortalServiceError::Export(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
        PortalServiceError::EvaluatorAssignmentDisabled => StatusCode::NOT_IMPLEMENTED,
        PortalServiceError::Export(_)
        | PortalServiceError::Repository(RepositoryError::Unavailable(_)) => {
            tracing::error!(error = %error, "portal action failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload: ActionResult<()> = ActionResult::failure(error.to_string());
    (status, Json(payload)).into_response()
}

pub(crate) async fn dashboard_page<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    let user = match guard(&service, &headers, access::APPLICANT_ONLY) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match service.dashboard(&user) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => failure(err),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueueQuery {
    #[serde(default)]
    status: Option<ApplicationStatus>,
    #[serde(default)]
    track: Option<Track>,
}

pub(crate) async fn review_queue_page<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
    query: Result<Query<QueueQuery>, QueryRejection>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    if let Err(response) = guard(&service, &headers, access::REVIEW_READERS) {
        return response;
    }
    let Query(query) = match decoded(query) {
        Ok(query) => query,
        Err(response) => return response,
    };

    let filter = ApplicationFilter {
        status: query.status,
        track: query.track,
        applicant_id: None,
    };
    match service.review_queue(&filter) {
        Ok(queue) => (StatusCode::OK, Json(queue)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn application_detail_page<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    if let Err(response) = guard(&service, &headers, access::REVIEW_READERS) {
        return response;
    }

    match service.application_detail(&ApplicationId(application_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn users_page<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    if let Err(response) = guard(&service, &headers, access::ADMIN_ONLY) {
        return response;
    }

    match service.list_users() {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(err) => failure(err),
    }
}

pub(crate) async fn screening_handler<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    Json(answers): Json<ScreeningAnswers>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    success(StatusCode::OK, service.screen(&answers))
}

pub(crate) async fn submit_handler<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
    body: Result<Json<ApplicationSubmission>, JsonRejection>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    let applicant = match guard(&service, &headers, access::APPLICANT_ONLY) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Json(submission) = match decoded(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match service.submit(&applicant, submission) {
        Ok(application) => success(StatusCode::CREATED, application),
        Err(err) => failure(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveScoresRequest {
    scores: Vec<ScoreItem>,
}

pub(crate) async fn save_scores_handler<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    body: Result<Json<SaveScoresRequest>, JsonRejection>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    let reviewer = match guard(&service, &headers, access::SCORERS) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Json(request) = match decoded(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    let id = ApplicationId(application_id);
    match service.save_scoring_progress(&reviewer, &id, request.scores) {
        Ok(progress) => success(StatusCode::OK, progress),
        Err(err) => failure(err),
    }
}

pub(crate) async fn eligibility_flags_handler<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    body: Result<Json<EligibilityFlags>, JsonRejection>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    let reviewer = match guard(&service, &headers, access::FLAG_REVIEWERS) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Json(flags) = match decoded(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match service.update_eligibility_flags(&reviewer, &ApplicationId(application_id), flags) {
        Ok(result) => success(StatusCode::OK, result),
        Err(err) => failure(err),
    }
}

pub(crate) async fn lock_handler<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    let reviewer = match guard(&service, &headers, access::LOCKERS) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match service.lock_result(&reviewer, &ApplicationId(application_id)) {
        Ok(result) => success(StatusCode::OK, result),
        Err(err) => failure(err),
    }
}

pub(crate) async fn unlock_handler<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    let admin = match guard(&service, &headers, access::ADMIN_ONLY) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match service.unlock_result(&admin, &ApplicationId(application_id)) {
        Ok(result) => success(StatusCode::OK, result),
        Err(err) => failure(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    action: ReviewAction,
    #[serde(default)]
    note: Option<String>,
}

pub(crate) async fn decision_handler<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    let actor = match guard(&service, &headers, access::DECISION_MAKERS) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Json(request) = match decoded(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    let id = ApplicationId(application_id);
    match service.decide(&actor, &id, request.action, request.note) {
        Ok(application) => success(StatusCode::OK, application),
        Err(err) => failure(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignEvaluatorRequest {
    evaluator_id: String,
}

pub(crate) async fn assign_evaluator_handler<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    body: Result<Json<AssignEvaluatorRequest>, JsonRejection>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    if let Err(response) = guard(&service, &headers, access::ADMIN_ONLY) {
        return response;
    }
    let Json(request) = match decoded(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    let id = ApplicationId(application_id);
    match service.assign_evaluator(&id, &UserId(request.evaluator_id)) {
        Ok(()) => success(StatusCode::OK, ()),
        Err(err) => failure(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleChangeRequest {
    role: String,
}

pub(crate) async fn user_role_handler<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    body: Result<Json<RoleChangeRequest>, JsonRejection>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    let admin = match guard(&service, &headers, access::ADMIN_ONLY) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Json(request) = match decoded(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match service.set_user_role(&admin, &UserId(user_id), &request.role) {
        Ok(profile) => success(StatusCode::OK, profile),
        Err(err) => failure(err),
    }
}

pub(crate) async fn export_handler<R, M, C>(
    State(service): State<SharedService<R, M, C>>,
    headers: HeaderMap,
    body: Result<Json<ExportRequest>, JsonRejection>,
) -> Response
where
    R: PortalRepository + 'static,
    M: Mailer + 'static,
    C: PageCache + 'static,
{
    if let Err(response) = guard(&service, &headers, access::EXPORTERS) {
        return response;
    }
    let Json(request) = match decoded(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match service.export(&request, Utc::now().date_naive()) {
        Ok(file) => {
            let disposition = file.content_disposition();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, file.content_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                file.bytes,
            )
                .into_response()
        }
        Err(err) => failure(err),
    }
}
