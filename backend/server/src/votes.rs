use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{error::AppError, identity::ClientIdentity, state::AppState};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotePayload {
    pub winner_id: i64,
    pub loser_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingChange {
    pub id: u64,
    pub before: f64,
    pub after: f64,
}

impl RatingChange {
    pub fn delta(&self) -> f64 {
        self.after - self.before
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoteOutcome {
    pub winner: RatingChange,
    pub loser: RatingChange,
}

fn parse_id(raw: i64, field: &str) -> Result<u64, AppError> {
    u64::try_from(raw)
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::InvalidInput(format!("{field} must be a positive integer")))
}

pub fn validate_ids(winner_id: i64, loser_id: i64) -> Result<(u64, u64), AppError> {
    let winner_id = parse_id(winner_id, "winnerId")?;
    let loser_id = parse_id(loser_id, "loserId")?;

    if winner_id == loser_id {
        return Err(AppError::InvalidInput(
            "winner and loser must be different images".to_string(),
        ));
    }

    Ok((winner_id, loser_id))
}

/// Validates, throttles, then applies one vote against the ratings as they are right now.
///
/// Two votes racing on the same image can both read the old rating, the later write wins.
pub async fn submit_vote(
    state: &AppState,
    identity: &ClientIdentity,
    payload: VotePayload,
) -> Result<VoteOutcome, AppError> {
    let (winner_id, loser_id) = validate_ids(payload.winner_id, payload.loser_id)?;

    state.limiter.check(identity).inspect_err(|_| {
        warn!(ip = %identity.ip, "Vote rate limited");
    })?;

    let winner = state
        .store
        .get_by_id(winner_id)
        .await?
        .ok_or(AppError::NotFound(winner_id))?;
    let loser = state
        .store
        .get_by_id(loser_id)
        .await?
        .ok_or(AppError::NotFound(loser_id))?;

    let (winner_after, loser_after) = state.elo.update(winner.rating, loser.rating);

    state
        .store
        .apply_update(winner_id, winner_after, loser_id, loser_after)
        .await?;

    debug!(
        winner = winner_id,
        loser = loser_id,
        "Vote applied: {:.2} -> {:.2}, {:.2} -> {:.2}",
        winner.rating,
        winner_after,
        loser.rating,
        loser_after
    );

    Ok(VoteOutcome {
        winner: RatingChange {
            id: winner_id,
            before: winner.rating,
            after: winner_after,
        },
        loser: RatingChange {
            id: loser_id,
            before: loser.rating,
            after: loser_after,
        },
    })
}
