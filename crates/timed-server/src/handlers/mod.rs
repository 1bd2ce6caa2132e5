//! JSON handlers, one module per resource.
//!
//! Every handler authenticates through [`crate::auth::Authenticated`], asks
//! the configured [`AccessPolicy`](timed_core::access::AccessPolicy) for a
//! scope or a write capability, and only then calls the store.

pub mod employments;
pub mod records;

use axum::{
  Router,
  routing::{get, post},
};
use timed_core::store::TimedStore;

use crate::AppState;

/// Routes mounted under `/api`.
pub fn api_router<S>() -> Router<AppState<S>>
where
  S: TimedStore + Clone + 'static,
{
  Router::new()
    // Employments
    .route("/employments", get(employments::list::<S>).post(employments::create::<S>))
    .route("/employments/at", get(employments::at::<S>))
    .route("/employments/{id}", get(employments::get_one::<S>))
    .route("/employments/{id}/close", post(employments::close::<S>))
    .route("/employments/{id}/archive", post(employments::archive::<S>))
    // Owned and catalogue records
    .route(
      "/records/{entity_type}",
      get(records::list::<S>).post(records::create::<S>),
    )
    .route(
      "/records/{entity_type}/{id}",
      get(records::get_one::<S>)
        .put(records::update::<S>)
        .delete(records::delete::<S>),
    )
}
