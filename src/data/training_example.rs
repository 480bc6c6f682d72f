use serde::{Deserialize, Serialize};

use crate::game::BoardEncoding;

/// One position produced by self-play, with its training targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub board: BoardEncoding,
    /// Game result for the player to move on `board`: -1, 0 or 1 (averaged once merged)
    pub result: f32,
    /// Search value estimate of the position before the move was played
    pub q: f32,
    /// Visit-count policy over the whole action space
    pub pi: Vec<f32>,
    /// How many raw examples were merged into this one
    pub times_seen: u32,
}

impl TrainingExample {
    pub fn new(board: BoardEncoding, result: f32, q: f32, pi: Vec<f32>) -> Self {
        TrainingExample {
            board,
            result,
            q,
            pi,
            times_seen: 1,
        }
    }

    /// Value target blending the search estimate with the game result:
    /// `percent_q × q + (1 − percent_q) × result`
    pub fn value_target(&self, percent_q: f32) -> f32 {
        percent_q * self.q + (1.0 - percent_q) * self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_target_blend() {
        let example = TrainingExample::new(vec![0; 9], 1.0, 0.2, vec![0.0; 9]);
        assert_eq!(example.value_target(0.0), 1.0);
        assert!((example.value_target(1.0) - 0.2).abs() < 1e-6);
        assert!((example.value_target(0.5) - 0.6).abs() < 1e-6);
    }
}
