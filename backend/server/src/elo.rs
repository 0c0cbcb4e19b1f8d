//! # Elo
//!
//! Rating update for a single pairwise outcome.
//!
//! - Expected score of the winner: `1 / (1 + 10^((loser - winner) / 400))`
//! - Winner moves by `K * (1 - expected)`, loser by `K * (0 - (1 - expected))`
//! - Both results floor at zero, so the sum is conserved only while no one hits the floor
//!
//! Pure arithmetic, no I/O. The vote handler reads current ratings from the store and feeds
//! them through here.

pub const DEFAULT_K_FACTOR: f64 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloCalculator {
    k_factor: f64,
}

impl Default for EloCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_K_FACTOR)
    }
}

impl EloCalculator {
    pub fn new(k_factor: f64) -> Self {
        Self { k_factor }
    }

    pub fn k_factor(&self) -> f64 {
        self.k_factor
    }

    /// Probability that `rating` beats `opponent`.
    pub fn expected_score(rating: f64, opponent: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
    }

    /// Returns `(new_winner, new_loser)`.
    pub fn update(&self, winner: f64, loser: f64) -> (f64, f64) {
        let expected_winner = Self::expected_score(winner, loser);
        let expected_loser = 1.0 - expected_winner;

        let new_winner = winner + self.k_factor * (1.0 - expected_winner);
        let new_loser = loser + self.k_factor * (0.0 - expected_loser);

        (new_winner.max(0.0), new_loser.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_equal_ratings_move_half_k() {
        let elo = EloCalculator::default();

        for rating in [100.0, 1200.0, 2400.0] {
            let (winner, loser) = elo.update(rating, rating);

            assert!((winner - rating - 16.0).abs() < EPSILON);
            assert!((loser - rating + 16.0).abs() < EPSILON);
        }
    }

    #[test]
    fn test_equal_ratings_clamp_at_zero() {
        let elo = EloCalculator::default();

        let (winner, loser) = elo.update(10.0, 10.0);

        assert!((winner - 26.0).abs() < EPSILON);
        assert_eq!(loser, 0.0);
    }

    #[test]
    fn test_never_negative() {
        let elo = EloCalculator::new(64.0);

        for (winner, loser) in [(0.0, 0.0), (3000.0, 1.0), (0.0, 5.0), (1200.0, 15.9)] {
            let (new_winner, new_loser) = elo.update(winner, loser);

            assert!(new_winner >= 0.0);
            assert!(new_loser >= 0.0);
        }
    }

    #[test]
    fn test_symmetric_under_role_swap() {
        let elo = EloCalculator::default();

        for (x, y) in [(1200.0, 1400.0), (1550.0, 980.0), (700.0, 700.0)] {
            let (x_won, y_lost) = elo.update(x, y);
            let (y_won, x_lost) = elo.update(y, x);

            // Whatever one side gains the other loses, whichever way round
            assert!(((x_won - x) + (y_lost - y)).abs() < EPSILON);
            assert!(((y_won - y) + (x_lost - x)).abs() < EPSILON);

            // Both possible wins for a pairing add up to K
            assert!(((x_won - x) + (y_won - y) - elo.k_factor()).abs() < EPSILON);
        }
    }

    #[test]
    fn test_upset_moves_more_than_expected_win() {
        let elo = EloCalculator::default();

        let (favourite_after, _) = elo.update(1600.0, 1200.0);
        let (underdog_after, _) = elo.update(1200.0, 1600.0);

        assert!(underdog_after - 1200.0 > favourite_after - 1600.0);
    }

    #[test]
    fn test_repeated_votes_are_not_idempotent() {
        let elo = EloCalculator::default();

        let (a1, b1) = elo.update(1200.0, 1200.0);
        let (a2, b2) = elo.update(a1, b1);

        assert!(a2 > a1);
        assert!(b2 < b1);
        assert!((a1 - 1200.0) - (a2 - a1) > EPSILON);
    }

    #[test]
    fn test_zero_sum_above_floor() {
        let elo = EloCalculator::default();

        let (winner, loser) = elo.update(1350.0, 1275.0);

        assert!((winner + loser - 2625.0).abs() < EPSILON);
    }
}
