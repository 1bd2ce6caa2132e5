//! JSON HTTP layer for Timed.
//!
//! Exposes an axum [`Router`] over any [`TimedStore`]. Every request is
//! authenticated with HTTP Basic credentials from the configuration and
//! filtered through the configured [`AccessPolicy`].
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = timed_server::router(AppState::new(store, config));
//! ```

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use serde::Deserialize;
use timed_core::{access::AccessPolicy, store::TimedStore};
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, UserConfig};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TIMED__*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(default)]
  pub users:      Vec<UserConfig>,
  /// Per entity type read and write rules. Falls back to the built-in table.
  #[serde(default)]
  pub policy:     AccessPolicy,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: TimedStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
}

impl<S: TimedStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    Self {
      store:  Arc::new(store),
      auth:   Arc::new(AuthConfig::new(config.users.clone())),
      config: Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application router, with every endpoint under `/api`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: TimedStore + Clone + 'static,
{
  Router::new()
    .nest("/api", handlers::api_router::<S>())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use timed_core::{
    access::{Action, EntityType, Scope},
    principal::Role,
  };
  use timed_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  const PASSWORD: &str = "secret";

  struct Fixture {
    state:   AppState<SqliteStore>,
    alice:   Uuid,
    bob:     Uuid,
    manager: Uuid,
  }

  fn user(username: &str, hash: &str, user_id: Uuid, roles: Vec<Role>) -> UserConfig {
    UserConfig {
      username: username.to_string(),
      password_hash: hash.to_string(),
      user_id,
      roles,
    }
  }

  async fn fixture() -> Fixture {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(PASSWORD.as_bytes(), &salt)
      .unwrap()
      .to_string();

    let alice   = Uuid::new_v4();
    let bob     = Uuid::new_v4();
    let manager = Uuid::new_v4();
    let config = ServerConfig {
      host:       "127.0.0.1".to_string(),
      port:       8000,
      store_path: PathBuf::from(":memory:"),
      users:      vec![
        user("alice", &hash, alice, vec![]),
        user("bob", &hash, bob, vec![]),
        user("manager", &hash, manager, vec![Role::ProjectAdmin]),
        user("admin", &hash, Uuid::new_v4(), vec![Role::SystemAdmin]),
      ],
      policy:     AccessPolicy::default(),
    };

    Fixture { state: AppState::new(store, config), alice, bob, manager }
  }

  async fn send(
    state:  &AppState<SqliteStore>,
    method: &str,
    uri:    &str,
    user:   Option<&str>,
    body:   Option<Value>,
  ) -> (StatusCode, Value) {
    send_raw(state, method, uri, user, body.map(|json| json.to_string())).await
  }

  /// Like [`send`], with the body sent verbatim as `application/json`.
  async fn send_raw(
    state:  &AppState<SqliteStore>,
    method: &str,
    uri:    &str,
    user:   Option<&str>,
    body:   Option<String>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
      let creds = B64.encode(format!("{user}:{PASSWORD}"));
      builder = builder.header(header::AUTHORIZATION, format!("Basic {creds}"));
    }
    let body = match body {
      Some(text) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(text)
      }
      None => Body::empty(),
    };

    let resp   = router(state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes  = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value  = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
  }

  fn employment(subject_id: Uuid, start: &str, end: Option<&str>) -> Value {
    json!({
      "subject_id": subject_id,
      "start_date": start,
      "end_date": end,
      "terms": {
        "location_id": Uuid::new_v4(),
        "percentage": 100,
        "worktime_per_day_minutes": 504,
      },
    })
  }

  // ── Auth ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unauthenticated_requests_return_401() {
    let f = fixture().await;
    let (status, _) = send(&f.state, "GET", "/api/employments", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let resp = router(f.state.clone())
      .oneshot(Request::get("/api/employments").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  // ── Employments ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn regular_user_cannot_create_employment() {
    let f = fixture().await;
    let body = employment(f.alice, "2020-01-01", None);
    let (status, json) = send(&f.state, "POST", "/api/employments", Some("alice"), Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json["error"].as_str().unwrap().contains("create"));
  }

  #[tokio::test]
  async fn admin_creates_and_resolves_employments() {
    let f = fixture().await;
    let first  = employment(f.alice, "2020-01-01", Some("2020-06-30"));
    let second = employment(f.alice, "2020-07-01", None);

    let (status, created) =
      send(&f.state, "POST", "/api/employments", Some("admin"), Some(first)).await;
    assert_eq!(status, StatusCode::CREATED);
    let first_id = created["assignment_id"].clone();
    let (status, created) =
      send(&f.state, "POST", "/api/employments", Some("admin"), Some(second)).await;
    assert_eq!(status, StatusCode::CREATED);
    let second_id = created["assignment_id"].clone();

    let uri = format!("/api/employments/at?user_id={}&date=2020-06-30", f.alice);
    let (status, json) = send(&f.state, "GET", &uri, Some("admin"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["assignment_id"], first_id);

    // Alice resolves her own employment without naming herself.
    let (status, json) =
      send(&f.state, "GET", "/api/employments/at?date=2020-07-01", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["assignment_id"], second_id);

    let (status, _) =
      send(&f.state, "GET", "/api/employments/at?date=2019-12-31", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn overlapping_employment_returns_409() {
    let f = fixture().await;
    let open = employment(f.alice, "2020-01-01", None);
    let (status, _) = send(&f.state, "POST", "/api/employments", Some("admin"), Some(open)).await;
    assert_eq!(status, StatusCode::CREATED);

    let later = employment(f.alice, "2021-01-01", Some("2021-12-31"));
    let (status, json) =
      send(&f.state, "POST", "/api/employments", Some("admin"), Some(later)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].is_string());

    let uri = format!("/api/employments?user_id={}", f.alice);
    let (_, json) = send(&f.state, "GET", &uri, Some("admin"), None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn employments_of_others_are_invisible() {
    let f = fixture().await;
    let body = employment(f.alice, "2020-01-01", None);
    let (_, created) = send(&f.state, "POST", "/api/employments", Some("admin"), Some(body)).await;
    let id = created["assignment_id"].as_str().unwrap().to_string();

    let (status, json) = send(&f.state, "GET", "/api/employments", Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));

    let uri = format!("/api/employments?user_id={}", f.alice);
    let (status, json) = send(&f.state, "GET", &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));

    let (status, _) =
      send(&f.state, "GET", &format!("/api/employments/{id}"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
      send(&f.state, "GET", &format!("/api/employments/{id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/employments/at?user_id={}&date=2020-02-01", f.alice);
    let (status, _) = send(&f.state, "GET", &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn close_and_archive_lifecycle() {
    let f = fixture().await;
    let body = employment(f.alice, "2020-01-01", None);
    let (_, created) = send(&f.state, "POST", "/api/employments", Some("admin"), Some(body)).await;
    let id = created["assignment_id"].as_str().unwrap().to_string();

    let close = format!("/api/employments/{id}/close");
    let end = json!({ "end_date": "2020-12-31" });
    let (status, _) = send(&f.state, "POST", &close, Some("alice"), Some(end.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&f.state, "POST", &close, Some("admin"), Some(end.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["interval"]["end_date"], "2020-12-31");

    let (status, _) = send(&f.state, "POST", &close, Some("admin"), Some(end)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let archive = format!("/api/employments/{id}/archive");
    let reason = json!({ "reason": "entered twice" });
    let (status, json) = send(&f.state, "POST", &archive, Some("admin"), Some(reason)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["archived"]["reason"], "entered twice");

    let uri = format!("/api/employments/at?user_id={}&date=2020-06-01", f.alice);
    let (status, _) = send(&f.state, "GET", &uri, Some("admin"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send(&f.state, "GET", "/api/employments", Some("alice"), None).await;
    assert_eq!(json, json!([]));
    let (_, json) =
      send(&f.state, "GET", "/api/employments?include_archived=true", Some("alice"), None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let uri = format!("/api/employments?user_id={}&include_archived=true", f.alice);
    let (_, json) = send(&f.state, "GET", &uri, Some("bob"), None).await;
    assert_eq!(json, json!([]));
  }

  // ── Records ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn catalogue_writes_need_system_admin() {
    let f = fixture().await;
    let body = json!({ "data": { "name": "Review" } });

    for user in ["alice", "manager"] {
      let (status, _) =
        send(&f.state, "POST", "/api/records/task-template", Some(user), Some(body.clone())).await;
      assert_eq!(status, StatusCode::FORBIDDEN, "{user}");
    }

    let (status, json) =
      send(&f.state, "POST", "/api/records/task-template", Some("admin"), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["value"]["data"]["name"], "Review");

    // Catalogue data is public.
    let (status, json) = send(&f.state, "GET", "/api/records/task-template", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn own_records_are_scoped_to_owner() {
    let f = fixture().await;
    let report = json!({
      "data": { "date": "2021-04-01", "duration_minutes": 90, "comment": null, "review": false },
    });

    let (status, created) =
      send(&f.state, "POST", "/api/records/report", Some("alice"), Some(report.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["owner"], json!(f.alice));
    let id = created["record_id"].as_str().unwrap().to_string();

    let (_, json) = send(&f.state, "GET", "/api/records/report", Some("bob"), None).await;
    assert_eq!(json, json!([]));

    // A project admin does not see regular users' reports either.
    let (_, json) = send(&f.state, "GET", "/api/records/report", Some("manager"), None).await;
    assert_eq!(json, json!([]));

    let one = format!("/api/records/report/{id}");
    let (status, _) = send(&f.state, "GET", &one, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&f.state, "DELETE", &one, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Writing on behalf of another user is denied.
    let mut on_behalf = report;
    on_behalf["owner"] = json!(f.alice);
    let (status, _) =
      send(&f.state, "POST", "/api/records/report", Some("bob"), Some(on_behalf)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&f.state, "DELETE", &one, Some("alice"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&f.state, "GET", &one, Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn update_replaces_payload() {
    let f = fixture().await;
    let absence_type = Uuid::new_v4();
    let body = json!({
      "data": { "date": "2021-05-03", "absence_type_id": absence_type, "comment": null },
    });
    let (_, created) = send(&f.state, "POST", "/api/records/absence", Some("bob"), Some(body)).await;
    let id = created["record_id"].as_str().unwrap().to_string();

    let update = json!({
      "data": { "date": "2021-05-04", "absence_type_id": absence_type, "comment": "moved" },
    });
    let (status, json) = send(
      &f.state,
      "PUT",
      &format!("/api/records/absence/{id}"),
      Some("bob"),
      Some(update),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"]["data"]["date"], "2021-05-04");
    assert!(!json["updated_at"].is_null());
  }

  #[tokio::test]
  async fn malformed_payload_returns_400() {
    let f = fixture().await;
    let body = json!({ "data": { "duration_minutes": "ninety" } });
    let (status, _) = send(&f.state, "POST", "/api/records/report", Some("alice"), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&f.state, "GET", "/api/records/employment", Some("alice"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn extractor_rejections_render_json_errors() {
    let f = fixture().await;

    let (status, json) = send(&f.state, "GET", "/api/records/timesheet", Some("alice"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let truncated = r#"{"data": "#.to_string();
    let (status, json) =
      send_raw(&f.state, "POST", "/api/records/report", Some("alice"), Some(truncated)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, json) =
      send(&f.state, "GET", "/api/records/report?limit=many", Some("alice"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, json) =
      send(&f.state, "GET", "/api/employments/not-a-uuid", Some("alice"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
  }

  #[tokio::test]
  async fn five_digit_years_return_400() {
    let f = fixture().await;
    let far = employment(f.alice, "+10000-01-01", Some("+10000-12-31"));
    let (status, json) = send(&f.state, "POST", "/api/employments", Some("admin"), Some(far)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let open = employment(f.alice, "2020-01-01", None);
    let (status, _) = send(&f.state, "POST", "/api/employments", Some("admin"), Some(open)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) =
      send(&f.state, "GET", "/api/employments/at?date=%2B10000-06-01", Some("alice"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let report = json!({ "data": { "date": "+10000-01-01", "duration_minutes": 60 } });
    let (status, _) =
      send(&f.state, "POST", "/api/records/report", Some("alice"), Some(report)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn activity_blocks_follow_their_activity() {
    let f = fixture().await;
    let activity = json!({ "data": { "comment": "Sprint planning", "date": "2021-04-01" } });
    let (status, created) =
      send(&f.state, "POST", "/api/records/activity", Some("alice"), Some(activity)).await;
    assert_eq!(status, StatusCode::CREATED);
    let activity_id = created["record_id"].as_str().unwrap().to_string();

    let block = json!({
      "data": {
        "activity_id": activity_id,
        "from": "2021-04-01T09:00:00Z",
        "to": "2021-04-01T10:00:00Z",
      },
    });
    let (status, _) =
      send(&f.state, "POST", "/api/records/activity-block", Some("alice"), Some(block.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Bob cannot hang a block off Alice's activity.
    let (status, json) =
      send(&f.state, "POST", "/api/records/activity-block", Some("bob"), Some(block)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (_, json) = send(&f.state, "GET", "/api/records/activity-block", Some("bob"), None).await;
    assert_eq!(json, json!([]));
    let (_, json) = send(&f.state, "GET", "/api/records/activity-block", Some("alice"), None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let uri = format!("/api/records/activity/{activity_id}");
    let (status, _) = send(&f.state, "DELETE", &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, json) = send(&f.state, "GET", "/api/records/activity-block", Some("alice"), None).await;
    assert_eq!(json, json!([]));
  }

  #[tokio::test]
  async fn manager_sees_only_own_credits() {
    let f = fixture().await;
    let credit = json!({
      "owner": f.bob,
      "data": { "date": "2021-01-01", "duration_minutes": 120 },
    });
    let (status, _) =
      send(&f.state, "POST", "/api/records/overtime-credit", Some("admin"), Some(credit)).await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/api/records/overtime-credit?user_id={}", f.bob);
    let (_, json) = send(&f.state, "GET", &uri, Some("manager"), None).await;
    assert_eq!(json, json!([]));
    let (_, json) = send(&f.state, "GET", &uri, Some("bob"), None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let uri = format!("/api/records/overtime-credit?user_id={}", f.manager);
    let (_, json) = send(&f.state, "GET", &uri, Some("manager"), None).await;
    assert_eq!(json, json!([]));
  }

  // ── Configuration ───────────────────────────────────────────────────────────

  #[test]
  fn policy_loads_from_toml() {
    const TOML: &str = r#"
      host       = "127.0.0.1"
      port       = 8000
      store_path = "timed.sqlite"

      [[users]]
      username      = "manager"
      password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
      user_id       = "0b9d2f64-8c3a-4e57-b1d2-6e0f4a9c7d12"
      roles         = ["project-admin"]

      [policy.report]
      read    = "own"
      writers = { create = ["regular"] }

      [policy.report.read_overrides]
      project-admin = "all"
    "#;

    let config: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(TOML, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();

    assert_eq!(config.port, 8000);
    assert_eq!(config.users.len(), 1);
    let manager = config.users[0].principal();
    assert!(manager.has_role(Role::ProjectAdmin));

    assert_eq!(config.policy.scope(&manager, EntityType::Report), Scope::All);
    assert!(config.policy.authorize(&manager, Action::Create, EntityType::Report).is_ok());
    assert!(config.policy.authorize(&manager, Action::Delete, EntityType::Report).is_err());
    // A configured policy replaces the built-in table.
    assert!(config.policy.rule(EntityType::Absence).is_none());
  }
}
