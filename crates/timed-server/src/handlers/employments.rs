//! Handlers for `/employments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/employments` | Scoped list; optional `user_id`, `include_archived` |
//! | `POST` | `/employments` | Body: [`NewAssignment`]; returns 201 |
//! | `GET`  | `/employments/at` | `?date` required, `user_id` defaults to the caller |
//! | `GET`  | `/employments/:id` | 404 when invisible |
//! | `POST` | `/employments/:id/close` | Body: `{"end_date":"YYYY-MM-DD"}` |
//! | `POST` | `/employments/:id/archive` | Body: `{"reason":"..."}` (optional) |

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::NaiveDate;
use serde::Deserialize;
use timed_core::{
  access::{Action, EntityType},
  assignment::{Assignment, NewAssignment},
  principal::Principal,
  store::TimedStore,
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  extract::{Json, Path, Query},
};

const ENTITY: EntityType = EntityType::Employment;

/// Fetch an assignment, treating one the caller may not read as missing.
async fn visible<S>(
  state: &AppState<S>,
  principal: &Principal,
  id: Uuid,
) -> Result<Assignment, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  let scope = state.config.policy.scope(principal, ENTITY);
  state
    .store
    .get_assignment(id)
    .await
    .map_err(ApiError::store)?
    .filter(|a| scope.admits(Some(a.subject_id)))
    .ok_or_else(|| ApiError::NotFound(format!("employment {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Restrict to one user's employments.
  pub user_id:          Option<Uuid>,
  /// Return one user's full history, archived employments included. Applies
  /// to `user_id`, or to the caller when it is absent.
  #[serde(default)]
  pub include_archived: bool,
}

/// `GET /employments[?user_id=<id>][&include_archived=true]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Assignment>>, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  let scope = state.config.policy.scope(&principal, ENTITY);

  if params.include_archived {
    let subject_id = params.user_id.unwrap_or(principal.identity);
    if !scope.admits(Some(subject_id)) {
      return Ok(Json(Vec::new()));
    }
    let history = state
      .store
      .list_assignments(subject_id, true)
      .await
      .map_err(ApiError::store)?;
    return Ok(Json(history));
  }

  let assignments = state
    .store
    .list_scoped_assignments(scope.narrow_to(params.user_id))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(assignments))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /employments`: returns 201 + the stored [`Assignment`].
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Json(body): Json<NewAssignment>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  state
    .config
    .policy
    .authorize_for(&principal, Action::Create, ENTITY, Some(body.subject_id))?;

  let assignment = state
    .store
    .add_assignment(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(assignment)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /employments/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Assignment>, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  Ok(Json(visible(&state, &principal, id).await?))
}

// ─── Resolve ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AtParams {
  pub user_id: Option<Uuid>,
  pub date:    NaiveDate,
}

/// `GET /employments/at?date=<YYYY-MM-DD>[&user_id=<id>]`
///
/// The employment active on `date`. A user whose employments the caller may
/// not read has none as far as the caller can tell.
pub async fn at<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Query(params): Query<AtParams>,
) -> Result<Json<Assignment>, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  let subject_id = params.user_id.unwrap_or(principal.identity);
  let scope = state.config.policy.scope(&principal, ENTITY);
  if !scope.admits(Some(subject_id)) {
    return Err(timed_core::Error::NoAssignment { subject_id, date: params.date }.into());
  }

  let assignment = state
    .store
    .resolve_assignment(subject_id, params.date)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(assignment))
}

// ─── Close ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CloseBody {
  pub end_date: NaiveDate,
}

/// `POST /employments/:id/close`
pub async fn close<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<Uuid>,
  Json(body): Json<CloseBody>,
) -> Result<Json<Assignment>, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  state.config.policy.authorize(&principal, Action::Update, ENTITY)?;
  visible(&state, &principal, id).await?;

  let assignment = state
    .store
    .close_assignment(id, body.end_date)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(assignment))
}

// ─── Archive ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ArchiveBody {
  pub reason: Option<String>,
}

/// `POST /employments/:id/archive`
pub async fn archive<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(id): Path<Uuid>,
  Json(body): Json<ArchiveBody>,
) -> Result<Json<Assignment>, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  state.config.policy.authorize(&principal, Action::Delete, ENTITY)?;
  visible(&state, &principal, id).await?;

  let assignment = state
    .store
    .archive_assignment(id, body.reason)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(assignment))
}
