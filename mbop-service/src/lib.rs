pub mod config;
pub mod db;
pub mod directory;
pub mod fallback;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use service_core::axum::{
    body::Body,
    extract::{Request, State},
    middleware::{from_fn, from_fn_with_state},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::{http_request_span, request_id_middleware};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::MbopConfig;
use crate::directory::{BackendKind, Dispatcher};
use crate::fallback::FallbackHandler;
use crate::services::TokenIssuer;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub config: MbopConfig,
    pub store: Arc<dyn Store>,
    pub directory: Dispatcher,
    pub fallback: Arc<dyn FallbackHandler>,
    pub tokens: TokenIssuer,
}

impl AppState {
    /// Assemble state around an already connected store.
    pub fn new(config: MbopConfig, store: Arc<dyn Store>) -> Result<Self, AppError> {
        let directory = Dispatcher::new(
            BackendKind::from_module(&config.users_module),
            config.directory.clone(),
        );
        let fallback = fallback::from_config(&config.catchall)?;
        let tokens = TokenIssuer::new(&config.token)?;

        Ok(Self {
            config,
            store,
            directory,
            fallback,
            tokens,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    // Routes acting on the caller's own organization
    let identity_routes = Router::new()
        .route(
            "/v1/registrations",
            get(handlers::registrations::list_registrations)
                .post(handlers::registrations::create_registration),
        )
        .route(
            "/v1/registrations/token",
            get(handlers::token::issue_token)
                .patch(handlers::registrations::update_token_registration)
                .delete(handlers::registrations::delete_token_registration),
        )
        .route(
            "/v1/registrations/:uid",
            patch(handlers::registrations::update_registration)
                .delete(handlers::registrations::delete_registration),
        )
        .route(
            "/api/mbop/v1/allowlist",
            get(handlers::allowlist::list_allowlist)
                .post(handlers::allowlist::create_allowlist)
                .delete(handlers::allowlist::delete_allowlist),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::require_identity,
        ));

    // User-directory routes, forwarded untouched when no backend is configured
    let directory_routes = Router::new()
        .route("/v1/users", post(handlers::users::users_v1))
        .route(
            "/v3/accounts/:org_id/users",
            get(handlers::users::accounts_v3_users),
        )
        .route(
            "/v3/accounts/:org_id/usersBy",
            post(handlers::users::accounts_v3_users_by),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::directory_passthrough,
        ));

    Router::new()
        .route("/", get(handlers::status::root))
        .route("/health", get(handlers::status::health_check))
        .route("/v1/auth", get(handlers::auth::auth_v1))
        .merge(identity_routes)
        .merge(directory_routes)
        .fallback(catch_all)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(http_request_span::<Body>))
        .layer(from_fn(request_id_middleware))
}

async fn catch_all(State(state): State<AppState>, req: Request) -> Response {
    state.fallback.forward(req).await
}
