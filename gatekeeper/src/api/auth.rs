//! Shared-token authentication for every mutating C7 route (SPEC_FULL.md
//! §6): a single bearer token configured at bootstrap, checked against the
//! `Authorization` header. `health` is mounted outside this layer and never
//! sees it.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Response> {
    let provided = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if !state.api_token.is_empty() && token == state.api_token => Ok(next.run(request).await),
        _ => Err(forbidden()),
    }
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": { "code": "FORBIDDEN", "message": "missing or invalid bearer token" } })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest, StatusCode as HttpStatus};
    use axum::routing::get;
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "ok"
    }

    fn guarded_app(state: AppState) -> axum::Router {
        axum::Router::new()
            .route("/protected", get(ok_handler))
            .layer(axum::middleware::from_fn_with_state(state.clone(), require_token))
            .with_state(state)
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let state = test_state("secret").await;
        let app = guarded_app(state);
        let res = app
            .oneshot(HttpRequest::builder().uri("/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), HttpStatus::FORBIDDEN);
    }

    #[tokio::test]
    async fn rejects_wrong_token() {
        let state = test_state("secret").await;
        let app = guarded_app(state);
        let res = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/protected")
                    .header(header::AUTHORIZATION, "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), HttpStatus::FORBIDDEN);
    }

    #[tokio::test]
    async fn accepts_correct_token() {
        let state = test_state("secret").await;
        let app = guarded_app(state);
        let res = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/protected")
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), HttpStatus::OK);
    }
}
