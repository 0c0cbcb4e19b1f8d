use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use gallery::ImageSummary;
use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    identity::ClientIdentity,
    sampler::sample_pair,
    state::AppState,
    utils::{get_vote_from_body, leaderboard_limit},
    votes::submit_vote,
};

#[derive(Serialize)]
pub struct Comparison {
    pub left: ImageSummary,
    pub right: ImageSummary,
}

#[derive(Serialize)]
pub struct VoteResponse {
    pub success: bool,
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
pub struct Leaderboard {
    pub top: Vec<ImageSummary>,
    pub bottom: Vec<ImageSummary>,
}

pub async fn comparison_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Comparison>, AppError> {
    // Thread rng is not Send, seed a local one before the first await
    let mut rng = SmallRng::from_rng(&mut rand::rng());

    let (left, right) = sample_pair(state.store.as_ref(), &mut rng).await?;

    Ok(Json(Comparison {
        left: left.into(),
        right: right.into(),
    }))
}

pub async fn votes_handler(
    State(state): State<Arc<AppState>>,
    identity: ClientIdentity,
    body: Bytes,
) -> Result<Json<VoteResponse>, AppError> {
    let payload = get_vote_from_body(&body)?;

    submit_vote(&state, &identity, payload).await?;

    Ok(Json(VoteResponse { success: true }))
}

pub async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Leaderboard>, AppError> {
    let limit = leaderboard_limit(query.limit);

    let top = state.store.top(limit).await?;
    let bottom = state.store.bottom(limit).await?;

    Ok(Json(Leaderboard {
        top: top.into_iter().map(ImageSummary::from).collect(),
        bottom: bottom.into_iter().map(ImageSummary::from).collect(),
    }))
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok").into_response()
}
