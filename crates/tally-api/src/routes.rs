use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tally_gateway::connection;
use tally_types::api::Claims;

use crate::auth::{self, AppState};
use crate::error::ApiError;
use crate::ledger;
use crate::middleware::require_auth;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/login", post(auth::login))
        .route("/gateway", get(ws_upgrade));

    let protected_routes = Router::new()
        .route("/state", get(ledger::get_state))
        .route("/stats/{person}", get(ledger::get_stats))
        .route("/setup", post(ledger::setup))
        .route("/images", put(ledger::update_images))
        .route("/history", post(ledger::award_point))
        .route("/history/{entry_id}", patch(ledger::edit_reason))
        .route("/history/{entry_id}/dispute", post(ledger::dispute_entry))
        .route("/disputes/{dispute_id}/resolve", post(ledger::resolve_dispute))
        .route("/reset", post(ledger::reset))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
}

/// With `?token=` the JWT is validated at upgrade time; without it the
/// client must send Identify as its first message.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let dispatcher = state.dispatcher.clone();

    match query.token {
        Some(token) => {
            let claims = Claims::verify(&token, &state.jwt_secret)
                .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;
            Ok(ws.on_upgrade(move |socket| {
                connection::handle_connection_authenticated(socket, dispatcher, claims)
            }))
        }
        None => {
            let jwt_secret = state.jwt_secret.clone();
            Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret)))
        }
    }
}
