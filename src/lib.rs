//! Taskpad Backend Library
//!
//! Multi-user task tracking: JWT token-pair authentication and
//! owner-scoped todo CRUD over SQLite. The router factory lives here so
//! the server binary and the integration tests drive the same app.

pub mod auth;
pub mod middleware;
pub mod storage;
pub mod todos;

use auth::{auth_middleware, AuthState, JwtHandler, UserStore};
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use axum_extra::routing::RouterExt;
use std::sync::Arc;
use todos::{TodoApiState, TodoStore};
use tower_http::cors::CorsLayer;

/// Build the full application router.
///
/// Trailing-slash paths are canonical; each slashless twin answers with a
/// 307 redirect. Everything except `/health`, register, and the token
/// endpoints sits behind the auth gate.
pub fn app(
    user_store: Arc<UserStore>,
    todo_store: Arc<TodoStore>,
    jwt_handler: Arc<JwtHandler>,
) -> Router {
    let auth_state = AuthState::new(user_store, jwt_handler.clone());
    let todo_state = TodoApiState::new(todo_store);

    // Public routes: liveness probe plus the credential endpoints
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route_with_tsr("/api/register/", post(auth::api::register))
        .route_with_tsr("/api/token/", post(auth::api::login))
        .route_with_tsr("/api/token/refresh/", post(auth::api::refresh))
        .with_state(auth_state.clone());

    // Admin surface (the handlers check the privilege flag themselves)
    let admin_routes = Router::new()
        .route_with_tsr("/api/users/", get(auth::api::list_users))
        .route_with_tsr("/api/users/:id/", delete(auth::api::delete_user))
        .route_layer(axum_middleware::from_fn_with_state(
            jwt_handler.clone(),
            auth_middleware,
        ))
        .with_state(auth_state);

    // Owner-scoped todo CRUD
    let todo_routes = Router::new()
        .route_with_tsr(
            "/api/todos/",
            get(todos::api::list_todos).post(todos::api::create_todo),
        )
        .route_with_tsr(
            "/api/todos/:id/",
            get(todos::api::get_todo)
                .put(todos::api::put_todo)
                .patch(todos::api::patch_todo)
                .delete(todos::api::delete_todo),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            jwt_handler,
            auth_middleware,
        ))
        .with_state(todo_state);

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(todo_routes)
        .layer(axum_middleware::from_fn(middleware::request_logging))
        .layer(CorsLayer::permissive())
}

async fn health_check() -> &'static str {
    "🚀 Taskpad Operational"
}
