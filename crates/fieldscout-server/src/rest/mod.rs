mod handlers;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef, State};
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, patch, post, put};
use fieldscout_storage::Store;

const MAX_REQUEST_BODY_SIZE: usize = 4 * 1024 * 1024; // 4 MB

use crate::metrics::{Metrics, metrics_handler};
use crate::middleware::auth::{AuthState, rest_auth_middleware};
use crate::service::ScoutService;

pub struct AppState<S: Store> {
    pub service: Arc<ScoutService<S>>,
    pub metrics: Arc<Metrics>,
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: Store> FromRef<AppState<S>> for Arc<Metrics> {
    fn from_ref(state: &AppState<S>) -> Self {
        Arc::clone(&state.metrics)
    }
}

async fn metrics_middleware<S: Store>(
    State(state): State<AppState<S>>,
    request: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> Response {
    state.metrics.record_request();

    let response = next.run(request).await;

    if response.status().is_success() {
        state.metrics.record_success();
    } else {
        state.metrics.record_error();
    }
    response
}

pub fn create_router<S: Store + 'static>(state: AppState<S>, auth: AuthState) -> Router {
    Router::new()
        .route("/authenticate", post(handlers::authenticate))
        .route(
            "/realms",
            post(handlers::create_realm).get(handlers::list_realms),
        )
        .route("/realms/{id}", patch(handlers::patch_realm))
        .route("/users", post(handlers::create_user).get(handlers::list_users))
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .patch(handlers::patch_user)
                .delete(handlers::delete_user),
        )
        .route("/events/{event}/matches/{match}", put(handlers::put_match))
        .route(
            "/events/{event}/matches/{match}/alliances",
            get(handlers::alliances),
        )
        .route(
            "/events/{event}/matches/{match}/teams/{team}/comments",
            get(handlers::match_team_comments).put(handlers::put_comment),
        )
        .route(
            "/events/{event}/teams/{team}/comments",
            get(handlers::team_comments),
        )
        .route(
            "/events/{event}/matches/{match}/teams/{team}/reports",
            get(handlers::match_team_reports).put(handlers::put_report),
        )
        .route("/events/{event}/reports", get(handlers::event_reports))
        .route(
            "/events/{event}/teams/{team}/reports",
            get(handlers::team_reports),
        )
        .route(
            "/schemas",
            post(handlers::create_schema).get(handlers::list_schemas),
        )
        .route("/schemas/{id}", get(handlers::get_schema))
        .route("/schemas/year/{year}", get(handlers::schema_for_year))
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(auth, rest_auth_middleware))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .with_state(state)
}
