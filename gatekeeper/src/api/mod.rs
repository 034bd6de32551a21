//! External API Adapter (C7): the control-plane HTTP surface (SPEC_FULL.md
//! §4.7). Every mutating route shares one bearer-token auth layer; `health`
//! is the only unauthenticated route.

pub mod auth;
pub mod batch;
pub mod cancel;
pub mod clear_finished;
pub mod delete;
pub mod health;
pub mod retry;
pub mod status;
pub mod submit;

use crate::AppState;
use axum::{middleware, Router};

/// Assemble every route group and layer the shared-token auth middleware
/// over everything except `health`.
pub fn build_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .merge(submit::routes())
        .merge(retry::routes())
        .merge(cancel::routes())
        .merge(batch::routes())
        .merge(delete::routes())
        .merge(clear_finished::routes())
        .merge(status::routes())
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_token));

    Router::new().merge(health::routes()).merge(authenticated).with_state(state)
}
