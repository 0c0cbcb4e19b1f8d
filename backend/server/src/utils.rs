use axum::body::Bytes;

use crate::{
    error::AppError::{self, InvalidInput},
    votes::VotePayload,
};

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
pub const MAX_LEADERBOARD_LIMIT: usize = 100;

/// Non-integer ids, missing fields and broken JSON all come back as [`AppError::InvalidInput`].
pub fn get_vote_from_body(body: &Bytes) -> Result<VotePayload, AppError> {
    serde_json::from_slice(body).map_err(|e| InvalidInput(format!("malformed payload: {e}")))
}

pub fn leaderboard_limit(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &'static str) -> Result<VotePayload, AppError> {
        get_vote_from_body(&Bytes::from_static(raw.as_bytes()))
    }

    #[test]
    fn test_well_formed() {
        let payload = parse(r#"{"winnerId": 4, "loserId": 9}"#).unwrap();

        assert_eq!(payload.winner_id, 4);
        assert_eq!(payload.loser_id, 9);
    }

    #[test]
    fn test_malformed() {
        for raw in [
            "",
            "not json",
            r#"{"winnerId": 4}"#,
            r#"{"winnerId": "4", "loserId": 9}"#,
            r#"{"winnerId": 4.5, "loserId": 9}"#,
        ] {
            assert!(matches!(parse(raw), Err(InvalidInput(_))), "{raw}");
        }
    }

    #[test]
    fn test_leaderboard_limit() {
        assert_eq!(leaderboard_limit(None), DEFAULT_LEADERBOARD_LIMIT);
        assert_eq!(leaderboard_limit(Some(0)), 1);
        assert_eq!(leaderboard_limit(Some(25)), 25);
        assert_eq!(leaderboard_limit(Some(10_000)), MAX_LEADERBOARD_LIMIT);
    }
}
