//! Rules-engine capability set consumed by the search.
//!
//! The search never looks inside a position: it only asks for legal actions,
//! applies actions, checks for game over and encodes boards for the evaluator.

pub mod tictactoe;
pub mod ultimate;

pub use tictactoe::TicTacToe;
pub use ultimate::UltimateTicTacToe;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Result;

/// Fixed-length board encoding handed to the evaluator.
///
/// Cells are written from the perspective of the player to move:
/// `1` for the mover, `-1` for the opponent, `0` for empty.
pub type BoardEncoding = Vec<i8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    First,
    Second,
}

impl Player {
    pub fn opponent(self) -> Self {
        match self {
            Player::First => Player::Second,
            Player::Second => Player::First,
        }
    }

    /// Cell value used by the absolute board representation
    pub fn sign(self) -> i8 {
        match self {
            Player::First => 1,
            Player::Second => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Ongoing,
    Won(Player),
    Draw,
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        !matches!(self, GameStatus::Ongoing)
    }

    /// Converts a finished status into the `{-1, 0, +1}` result convention
    /// from `player`'s point of view. `None` while the game is still running.
    pub fn outcome_for(self, player: Player) -> Option<f32> {
        match self {
            GameStatus::Ongoing => None,
            GameStatus::Draw => Some(0.0),
            GameStatus::Won(winner) if winner == player => Some(1.0),
            GameStatus::Won(_) => Some(-1.0),
        }
    }
}

/// Shape of a board encoding, used to apply the square's symmetries.
///
/// An encoding is a concatenation of square planes (row-major, one side
/// length per plane) followed by `trailer` values that no symmetry moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingLayout {
    pub planes: Vec<usize>,
    pub trailer: usize,
    /// Side of the square action grid; the policy has `action_side²` slots.
    pub action_side: usize,
}

impl EncodingLayout {
    pub fn board_len(&self) -> usize {
        self.planes.iter().map(|side| side * side).sum::<usize>() + self.trailer
    }

    pub fn action_size(&self) -> usize {
        self.action_side * self.action_side
    }
}

/// Trait defining the rules engine of a two-player, alternating-move game.
///
/// Actions are identified by their index in `0..ACTION_SIZE`.
pub trait Game: Clone + Send + fmt::Display + 'static {
    /// Number of action slots in every policy vector.
    const ACTION_SIZE: usize;

    /// Creates the initial position.
    fn new() -> Self;

    /// Legal actions in ascending order. Empty once the game is over.
    fn legal_actions(&self) -> Vec<usize>;

    /// Plays `action` for the player to move.
    ///
    /// # Errors
    /// `SelfPlayError::InvalidAction` if the action is not legal here.
    fn apply_action(&mut self, action: usize) -> Result<()>;

    fn status(&self) -> GameStatus;

    fn to_move(&self) -> Player;

    /// Encodes the position from the perspective of the player to move.
    fn encode(&self) -> BoardEncoding;

    fn layout() -> EncodingLayout;

    fn is_terminal(&self) -> bool {
        self.status().is_over()
    }

    /// Value of a finished position for the player who would move next.
    fn terminal_value(&self) -> Option<f32> {
        self.status().outcome_for(self.to_move())
    }
}

/// Checks the eight lines of a 3x3 grid stored row-major.
///
/// Returns the sign of the owner of a completed line.
pub(crate) fn three_in_a_row(cells: &[i8]) -> Option<i8> {
    const LINES: [[usize; 3]; 8] = [
        [0, 1, 2],
        [3, 4, 5],
        [6, 7, 8],
        [0, 3, 6],
        [1, 4, 7],
        [2, 5, 8],
        [0, 4, 8],
        [2, 4, 6],
    ];

    LINES.iter().find_map(|line| {
        let first = cells[line[0]];
        if (first == 1 || first == -1) && line.iter().all(|&i| cells[i] == first) {
            Some(first)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_conversion() {
        assert_eq!(GameStatus::Ongoing.outcome_for(Player::First), None);
        assert_eq!(GameStatus::Draw.outcome_for(Player::Second), Some(0.0));
        assert_eq!(GameStatus::Won(Player::First).outcome_for(Player::First), Some(1.0));
        assert_eq!(GameStatus::Won(Player::First).outcome_for(Player::Second), Some(-1.0));
    }

    #[test]
    fn test_three_in_a_row() {
        assert_eq!(three_in_a_row(&[1, 1, 1, 0, 0, 0, 0, 0, 0]), Some(1));
        assert_eq!(three_in_a_row(&[-1, 0, 0, 0, -1, 0, 0, 0, -1]), Some(-1));
        assert_eq!(three_in_a_row(&[1, -1, 1, 0, 0, 0, 0, 0, 0]), None);
        // Drawn macro cells (2) never complete a line
        assert_eq!(three_in_a_row(&[2, 2, 2, 0, 0, 0, 0, 0, 0]), None);
    }

    #[test]
    fn test_layout_sizes() {
        let layout = EncodingLayout {
            planes: vec![9, 9, 3],
            trailer: 1,
            action_side: 9,
        };
        assert_eq!(layout.board_len(), 81 + 81 + 9 + 1);
        assert_eq!(layout.action_size(), 81);
    }
}
