use axum::{middleware, routing, Router};
use tower_http::cors::CorsLayer;

use crate::auth::middleware::JwtSecret;
use crate::chat::history;
use crate::identity::routes as identity_routes;
use crate::moderation::actions as moderation_actions;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new()
        .route("/register", routing::post(identity_routes::register))
        .route("/login", routing::post(identity_routes::login))
        .route("/messages", routing::get(history::public_messages));

    // Authenticated routes (bearer token via the Claims extractor)
    let authenticated_routes = Router::new()
        .route("/me", routing::get(identity_routes::me))
        .route("/users", routing::get(identity_routes::list_users))
        .route("/private/messages", routing::get(history::private_messages));

    // Admin moderation routes (Claims extractor + admin re-check per request)
    let admin_routes = Router::new()
        .route(
            "/admin/users",
            routing::get(moderation_actions::admin_list_users),
        )
        .route(
            "/admin/users/{id}/mute",
            routing::post(moderation_actions::mute_user),
        )
        .route(
            "/admin/users/{id}/unmute",
            routing::post(moderation_actions::unmute_user),
        )
        .route(
            "/admin/users/{id}/ban",
            routing::post(moderation_actions::ban_user),
        )
        .route(
            "/admin/users/{id}/unban",
            routing::post(moderation_actions::unban_user),
        )
        .route(
            "/admin/users/{id}",
            routing::delete(moderation_actions::delete_user),
        );

    // WebSocket endpoint (auth via query param, not bearer header)
    let ws_routes = Router::new().route("/ws", routing::get(ws_handler::ws_upgrade));

    // Health check
    let health = Router::new().route("/health", routing::get(health_check));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .merge(admin_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
