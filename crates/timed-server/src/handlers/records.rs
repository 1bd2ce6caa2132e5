//! Handlers for `/records/:entity_type` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/records/:entity_type` | Scoped list; `user_id`, `from_date`, `to_date`, `limit`, `offset` |
//! | `POST`   | `/records/:entity_type` | Body: [`CreateBody`]; returns 201 |
//! | `GET`    | `/records/:entity_type/:id` | 404 when invisible |
//! | `PUT`    | `/records/:entity_type/:id` | Body: [`UpdateBody`]; replaces the payload |
//! | `DELETE` | `/records/:entity_type/:id` | 204 |
//!
//! Employments have their own endpoints and are rejected here.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::NaiveDate;
use serde::Deserialize;
use timed_core::{
  access::{Action, EntityType},
  principal::Principal,
  record::{EntityRecord, EntityValue, NewRecord, RecordQuery},
  store::TimedStore,
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  extract::{Json, Path, Query},
};

fn collection(entity_type: EntityType) -> Result<EntityType, ApiError> {
  match entity_type {
    EntityType::Employment => Err(ApiError::BadRequest(
      "employments are served under /api/employments".to_string(),
    )),
    other => Ok(other),
  }
}

fn payload(entity_type: EntityType, data: serde_json::Value) -> Result<EntityValue, ApiError> {
  EntityValue::from_parts(entity_type, data)
    .map_err(|e| ApiError::BadRequest(format!("invalid {entity_type} payload: {e}")))
}

/// Fetch a record, treating one the caller may not read as missing.
async fn visible<S>(
  state: &AppState<S>,
  principal: &Principal,
  entity_type: EntityType,
  id: Uuid,
) -> Result<EntityRecord, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  let scope = state.config.policy.scope(principal, entity_type);
  state
    .store
    .get_record(entity_type, id)
    .await
    .map_err(ApiError::store)?
    .filter(|r| scope.admits(r.owner))
    .ok_or_else(|| ApiError::NotFound(format!("{entity_type} {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub user_id:   Option<Uuid>,
  pub from_date: Option<NaiveDate>,
  pub to_date:   Option<NaiveDate>,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}

/// `GET /records/:entity_type[?user_id=...][&from_date=...][&to_date=...]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(entity_type): Path<EntityType>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<EntityRecord>>, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  let entity_type = collection(entity_type)?;
  let scope = state
    .config
    .policy
    .scope(&principal, entity_type)
    .narrow_to(params.user_id);
  let query = RecordQuery {
    from_date: params.from_date,
    to_date:   params.to_date,
    limit:     params.limit,
    offset:    params.offset,
  };

  let records = state
    .store
    .list_records(entity_type, scope, &query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /records/:entity_type`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  /// Owning user of an owned record. Defaults to the caller.
  pub owner: Option<Uuid>,
  /// The bare payload, shaped by the entity type.
  pub data:  serde_json::Value,
}

/// `POST /records/:entity_type`: returns 201 + the stored record.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path(entity_type): Path<EntityType>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  let entity_type = collection(entity_type)?;
  let owner = match (entity_type.is_owned(), body.owner) {
    (true, None) => Some(principal.identity),
    (_, owner) => owner,
  };

  state
    .config
    .policy
    .authorize_for(&principal, Action::Create, entity_type, owner)?;

  let input = NewRecord::new(owner, payload(entity_type, body.data)?);
  let record = state
    .store
    .create_record(input)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /records/:entity_type/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path((entity_type, id)): Path<(EntityType, Uuid)>,
) -> Result<Json<EntityRecord>, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  let entity_type = collection(entity_type)?;
  Ok(Json(visible(&state, &principal, entity_type, id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub data: serde_json::Value,
}

/// `PUT /records/:entity_type/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path((entity_type, id)): Path<(EntityType, Uuid)>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<EntityRecord>, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  let entity_type = collection(entity_type)?;
  state.config.policy.authorize(&principal, Action::Update, entity_type)?;
  visible(&state, &principal, entity_type, id).await?;

  let record = state
    .store
    .update_record(id, payload(entity_type, body.data)?)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(record))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /records/:entity_type/:id`: 204 on success.
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Path((entity_type, id)): Path<(EntityType, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: TimedStore + Clone + 'static,
{
  let entity_type = collection(entity_type)?;
  state.config.policy.authorize(&principal, Action::Delete, entity_type)?;
  visible(&state, &principal, entity_type, id).await?;

  if !state.store.delete_record(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("{entity_type} {id} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}
