use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use tally_types::Person;
use tally_types::api::{
    AwardPointRequest, AwardPointResponse, Claims, DisputeEntryRequest, DisputeEntryResponse,
    EditReasonRequest, ImagesRequest, ResetRequest, ResolveDisputeRequest, ResolveDisputeResponse,
};
use tally_types::events::GatewayEvent;
use tally_types::ledger::compute_stats;

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// Page size of the original scoreboard view.
fn default_limit() -> u32 {
    20
}

pub async fn get_state(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = run_blocking(&state, move |s| Ok(s.db.snapshot(query.limit)?)).await?;
    Ok(Json(snapshot))
}

pub async fn get_stats(
    State(state): State<AppState>,
    Path(person): Path<Person>,
    Query(query): Query<HistoryQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let history = run_blocking(&state, move |s| Ok(s.db.get_history(query.limit)?)).await?;
    let stats = compute_stats(person, &history).map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(stats))
}

pub async fn setup(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<ImagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let game = run_blocking(&state, move |s| {
        Ok(s.db.setup(req.my_image.as_deref(), req.their_image.as_deref())?)
    })
    .await?;

    state.dispatcher.broadcast(GatewayEvent::GameStateChanged { state: game.clone() });
    Ok(Json(game))
}

pub async fn update_images(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<ImagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.my_image.is_none() && req.their_image.is_none() {
        return Err(ApiError::BadRequest("No image given".into()));
    }

    let game = run_blocking(&state, move |s| {
        Ok(s.db.update_images(req.my_image.as_deref(), req.their_image.as_deref())?)
    })
    .await?;

    state.dispatcher.broadcast(GatewayEvent::GameStateChanged { state: game.clone() });
    Ok(Json(game))
}

/// The actor is whoever the token says, never a request field.
pub async fn award_point(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AwardPointRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.profile;
    let (entry, game) = run_blocking(&state, move |s| {
        Ok(s.db.award_point(Some(actor), req.person, req.amount, &req.reason)?)
    })
    .await?;

    state.dispatcher.broadcast(GatewayEvent::HistoryInserted { entry: entry.clone() });
    state.dispatcher.broadcast(GatewayEvent::GameStateChanged { state: game.clone() });

    Ok((StatusCode::CREATED, Json(AwardPointResponse { entry, state: game })))
}

pub async fn edit_reason(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<EditReasonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = run_blocking(&state, move |s| Ok(s.db.edit_reason(entry_id, &req.reason)?)).await?;

    state.dispatcher.broadcast(GatewayEvent::HistoryUpdated { entry: entry.clone() });
    Ok(Json(entry))
}

pub async fn dispute_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<DisputeEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (entry, dispute) =
        run_blocking(&state, move |s| Ok(s.db.dispute_entry(entry_id, &req.reason)?)).await?;

    state.dispatcher.broadcast(GatewayEvent::HistoryUpdated { entry: entry.clone() });
    state.dispatcher.broadcast(GatewayEvent::DisputeInserted { dispute: dispute.clone() });

    Ok((StatusCode::CREATED, Json(DisputeEntryResponse { entry, dispute })))
}

pub async fn resolve_dispute(
    State(state): State<AppState>,
    Path(dispute_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<ResolveDisputeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (dispute, game) =
        run_blocking(&state, move |s| Ok(s.db.resolve_dispute(dispute_id, req.approved)?)).await?;

    state.dispatcher.broadcast(GatewayEvent::DisputeUpdated { dispute: dispute.clone() });
    if !req.approved {
        state.dispatcher.broadcast(GatewayEvent::GameStateChanged { state: game.clone() });
    }

    Ok(Json(ResolveDisputeResponse { dispute, state: game }))
}

/// Irreversible, so the caller has to say so explicitly.
pub async fn reset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !req.confirm {
        return Err(ApiError::BadRequest("Reset must be confirmed".into()));
    }

    let game = run_blocking(&state, |s| Ok(s.db.reset_all()?)).await?;
    tracing::info!("Reset requested by {}", claims.profile);

    state.dispatcher.broadcast(GatewayEvent::Reset { state: game.clone() });
    Ok(Json(game))
}
