use std::fmt;

use crate::game::{three_in_a_row, BoardEncoding, EncodingLayout, Game, GameStatus, Player};
use crate::{Result, SelfPlayError};

/// Plain 3x3 Tic-Tac-Toe. Small enough to play whole self-play games in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicTacToe {
    cells: [i8; 9],
    to_move: Player,
    status: GameStatus,
}

impl TicTacToe {
    /// Absolute cell contents: `1` first player, `-1` second player, `0` empty.
    pub fn cells(&self) -> &[i8; 9] {
        &self.cells
    }

    fn refresh_status(&mut self) {
        self.status = match three_in_a_row(&self.cells) {
            Some(1) => GameStatus::Won(Player::First),
            Some(_) => GameStatus::Won(Player::Second),
            None if self.cells.iter().all(|&c| c != 0) => GameStatus::Draw,
            None => GameStatus::Ongoing,
        };
    }
}

impl Game for TicTacToe {
    const ACTION_SIZE: usize = 9;

    fn new() -> Self {
        TicTacToe {
            cells: [0; 9],
            to_move: Player::First,
            status: GameStatus::Ongoing,
        }
    }

    fn legal_actions(&self) -> Vec<usize> {
        if self.status.is_over() {
            return Vec::new();
        }
        (0..9).filter(|&i| self.cells[i] == 0).collect()
    }

    fn apply_action(&mut self, action: usize) -> Result<()> {
        if self.status.is_over() || action >= 9 || self.cells[action] != 0 {
            return Err(SelfPlayError::InvalidAction(action));
        }
        self.cells[action] = self.to_move.sign();
        self.to_move = self.to_move.opponent();
        self.refresh_status();
        Ok(())
    }

    fn status(&self) -> GameStatus {
        self.status
    }

    fn to_move(&self) -> Player {
        self.to_move
    }

    fn encode(&self) -> BoardEncoding {
        let sign = self.to_move.sign();
        self.cells.iter().map(|&c| c * sign).collect()
    }

    fn layout() -> EncodingLayout {
        EncodingLayout {
            planes: vec![3],
            trailer: 0,
            action_side: 3,
        }
    }
}

impl fmt::Display for TicTacToe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(3) {
            let line: String = row
                .iter()
                .map(|&c| match c {
                    1 => 'X',
                    -1 => 'O',
                    _ => '.',
                })
                .collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
