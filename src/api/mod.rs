use axum::Router;
use axum::http::StatusCode;

use crate::AppState;
use crate::middleware::AuthLayer;

mod auth;
mod belvo;

pub fn routes(state: AppState) -> Router {
    let auth_layer = AuthLayer::new(state.auth.clone());
    let protected_routes = Router::new()
        .merge(auth::protected_routes())
        .nest("/belvo", belvo::routes())
        .route_layer(auth_layer);

    Router::new()
        .merge(auth::public_routes())
        .merge(protected_routes)
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(state)
}
