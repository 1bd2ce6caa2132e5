//! HTTP Basic-auth extractor producing the request's [`Principal`].

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use timed_core::{
  principal::{Principal, Role},
  store::TimedStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// One account allowed to use this server instance.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub user_id:       Uuid,
  /// Extra roles; every user is implicitly [`Role::Regular`].
  #[serde(default)]
  pub roles:         Vec<Role>,
}

impl UserConfig {
  pub fn principal(&self) -> Principal {
    Principal::new(self.user_id, self.roles.iter().copied())
  }
}

/// Credentials accepted as valid for this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub users: Vec<UserConfig>,
}

impl AuthConfig {
  pub fn new(users: Vec<UserConfig>) -> Self { Self { users } }

  fn find(&self, username: &str) -> Option<&UserConfig> {
    self.users.iter().find(|u| u.username == username)
  }
}

/// The authenticated principal behind a request.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

/// Verify credentials from headers and resolve the matching principal.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Principal, ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let user = config.find(username).ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&user.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(user.principal())
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: TimedStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let principal = verify_auth(&parts.headers, &state.auth)?;
    tracing::debug!(principal = %principal.identity, "authenticated");
    Ok(Authenticated(principal))
  }
}
