use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::directory::UserDirectory;
use super::domain::{Applicant, ApplicantStatus, RoleId, UserId};
use super::engine::AllocationError;
use super::service::{ApplicationServiceError, Committed, ErrorKind, RoleApplicationService};
use super::store::{RoleStore, StoreError, StoredRole};

type SharedService<S, D> = Arc<RoleApplicationService<S, D>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoleRequest {
    pub positions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub status: ApplicantStatus,
}

/// Public shape of a role and its applicants.
#[derive(Debug, Clone, Serialize)]
pub struct RoleView {
    pub role_id: RoleId,
    pub original_positions: u32,
    pub positions_available: u32,
    pub applicants: Vec<Applicant>,
    pub version: u64,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<Applicant>,
}

impl RoleView {
    pub fn from_record(record: &StoredRole) -> Self {
        Self {
            role_id: record.role.id().clone(),
            original_positions: record.role.original_positions(),
            positions_available: record.role.positions_available(),
            applicants: record.role.applicants().to_vec(),
            version: record.version,
            updated_at: record.updated_at,
            removed: Vec::new(),
        }
    }

    pub fn from_committed(committed: Committed) -> Self {
        let mut view = Self::from_record(&committed.record);
        view.removed = committed.removed;
        view
    }
}

/// Router builder exposing the role application endpoints.
pub fn role_router<S, D>(service: SharedService<S, D>) -> Router
where
    S: RoleStore + 'static,
    D: UserDirectory + 'static,
{
    Router::new()
        .route("/api/v1/roles", axum::routing::post(create_handler::<S, D>))
        .route(
            "/api/v1/roles/:role_id",
            get(role_handler::<S, D>).delete(delete_handler::<S, D>),
        )
        .route("/api/v1/roles/:role_id/apply", put(apply_handler::<S, D>))
        .route(
            "/api/v1/roles/:role_id/applicants",
            get(applicants_handler::<S, D>),
        )
        .route(
            "/api/v1/roles/:role_id/applicants/:user_id/status",
            put(status_handler::<S, D>),
        )
        .route(
            "/api/v1/roles/:role_id/openings/increase",
            put(increase_handler::<S, D>),
        )
        .route(
            "/api/v1/roles/:role_id/openings/decrease",
            put(decrease_handler::<S, D>),
        )
        .with_state(service)
}

pub(crate) async fn create_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Json(request): Json<CreateRoleRequest>,
) -> Response
where
    S: RoleStore + 'static,
    D: UserDirectory + 'static,
{
    match service.create_role(request.positions) {
        Ok(record) => (StatusCode::CREATED, Json(RoleView::from_record(&record))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn role_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(role_id): Path<String>,
) -> Response
where
    S: RoleStore + 'static,
    D: UserDirectory + 'static,
{
    match service.get_role(&RoleId(role_id)) {
        Ok(record) => (StatusCode::OK, Json(RoleView::from_record(&record))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(role_id): Path<String>,
) -> Response
where
    S: RoleStore + 'static,
    D: UserDirectory + 'static,
{
    match service.delete_role(&RoleId(role_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn apply_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(role_id): Path<String>,
    Json(request): Json<ApplyRequest>,
) -> Response
where
    S: RoleStore + 'static,
    D: UserDirectory + 'static,
{
    committed_response(service.apply(&RoleId(role_id), &UserId(request.user_id)))
}

pub(crate) async fn status_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path((role_id, user_id)): Path<(String, String)>,
    Json(request): Json<StatusRequest>,
) -> Response
where
    S: RoleStore + 'static,
    D: UserDirectory + 'static,
{
    committed_response(service.set_status(
        &RoleId(role_id),
        &UserId(user_id),
        request.status,
    ))
}

pub(crate) async fn increase_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(role_id): Path<String>,
) -> Response
where
    S: RoleStore + 'static,
    D: UserDirectory + 'static,
{
    committed_response(service.increase_openings(&RoleId(role_id)))
}

pub(crate) async fn decrease_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(role_id): Path<String>,
) -> Response
where
    S: RoleStore + 'static,
    D: UserDirectory + 'static,
{
    committed_response(service.decrease_openings(&RoleId(role_id)))
}

pub(crate) async fn applicants_handler<S, D>(
    State(service): State<SharedService<S, D>>,
    Path(role_id): Path<String>,
) -> Response
where
    S: RoleStore + 'static,
    D: UserDirectory + 'static,
{
    match service.list_applicants(&RoleId(role_id)) {
        Ok(applicants) => (StatusCode::OK, Json(applicants)).into_response(),
        Err(err) => error_response(err),
    }
}

fn committed_response(result: Result<Committed, ApplicationServiceError>) -> Response {
    match result {
        Ok(committed) => (StatusCode::OK, Json(RoleView::from_committed(committed))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn status_for(err: &ApplicationServiceError) -> StatusCode {
    match err {
        ApplicationServiceError::Allocation(AllocationError::DuplicateApplication(_)) => {
            StatusCode::CONFLICT
        }
        ApplicationServiceError::Store(StoreError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        other => match other.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::InvariantGuard => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Conflict => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

fn error_response(err: ApplicationServiceError) -> Response {
    let status = status_for(&err);
    let payload = json!({
        "error": err.to_string(),
        "kind": err.kind().label(),
    });
    (status, Json(payload)).into_response()
}
