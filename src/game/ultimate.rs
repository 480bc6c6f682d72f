//! Ultimate Tic-Tac-Toe: a 3x3 grid of Tic-Tac-Toe boards.
//!
//! Action `a` is the cell at `(a / 9, a % 9)` of the full 9x9 grid. The cell
//! played inside its sub-board decides which sub-board the opponent must play
//! in next; when that sub-board is already closed the opponent may play in
//! any open sub-board.

use std::fmt;

use crate::game::{three_in_a_row, BoardEncoding, EncodingLayout, Game, GameStatus, Player};
use crate::{Result, SelfPlayError};

const SIDE: usize = 9;
const CELLS: usize = SIDE * SIDE;
/// Macro-board marker for a sub-board that filled up without a winner
const DRAWN: i8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UltimateTicTacToe {
    cells: [i8; CELLS],
    macro_board: [i8; 9],
    forced: Option<usize>,
    to_move: Player,
    status: GameStatus,
}

/// Grid action of `cell` inside sub-board `board`.
fn action_of(board: usize, cell: usize) -> usize {
    let row = (board / 3) * 3 + cell / 3;
    let col = (board % 3) * 3 + cell % 3;
    row * SIDE + col
}

/// Inverse of [`action_of`]: `(sub-board, cell within sub-board)`.
fn locate(action: usize) -> (usize, usize) {
    let (row, col) = (action / SIDE, action % SIDE);
    ((row / 3) * 3 + col / 3, (row % 3) * 3 + col % 3)
}

impl UltimateTicTacToe {
    /// Macro board: `0` open, `±1` won by that side, `2` drawn.
    pub fn macro_board(&self) -> &[i8; 9] {
        &self.macro_board
    }

    /// Sub-board the player to move is sent to, if it is still open.
    pub fn forced_board(&self) -> Option<usize> {
        self.forced.filter(|&b| self.macro_board[b] == 0)
    }

    fn sub_board(&self, board: usize) -> [i8; 9] {
        let mut cells = [0; 9];
        for (cell, slot) in cells.iter_mut().enumerate() {
            *slot = self.cells[action_of(board, cell)];
        }
        cells
    }

    fn open_moves(&self) -> Vec<usize> {
        let boards: Vec<usize> = match self.forced_board() {
            Some(b) => vec![b],
            None => (0..9).filter(|&b| self.macro_board[b] == 0).collect(),
        };
        let mut actions: Vec<usize> = boards
            .into_iter()
            .flat_map(|b| (0..9).map(move |cell| action_of(b, cell)))
            .filter(|&a| self.cells[a] == 0)
            .collect();
        actions.sort_unstable();
        actions
    }

    fn refresh_status(&mut self) {
        self.status = match three_in_a_row(&self.macro_board) {
            Some(1) => GameStatus::Won(Player::First),
            Some(_) => GameStatus::Won(Player::Second),
            None if self.open_moves().is_empty() => GameStatus::Draw,
            None => GameStatus::Ongoing,
        };
    }
}

impl Game for UltimateTicTacToe {
    const ACTION_SIZE: usize = CELLS;

    fn new() -> Self {
        UltimateTicTacToe {
            cells: [0; CELLS],
            macro_board: [0; 9],
            forced: None,
            to_move: Player::First,
            status: GameStatus::Ongoing,
        }
    }

    fn legal_actions(&self) -> Vec<usize> {
        if self.status.is_over() {
            return Vec::new();
        }
        self.open_moves()
    }

    fn apply_action(&mut self, action: usize) -> Result<()> {
        if action >= CELLS || self.legal_actions().binary_search(&action).is_err() {
            return Err(SelfPlayError::InvalidAction(action));
        }

        let (board, cell) = locate(action);
        self.cells[action] = self.to_move.sign();

        let sub = self.sub_board(board);
        if let Some(owner) = three_in_a_row(&sub) {
            self.macro_board[board] = owner;
        } else if sub.iter().all(|&c| c != 0) {
            self.macro_board[board] = DRAWN;
        }

        self.forced = Some(cell);
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

    /// Cells plane (9x9), legal-move plane (9x9) and macro plane (3x3),
    /// all from the mover's perspective.
    fn encode(&self) -> BoardEncoding {
        let sign = self.to_move.sign();
        let mut encoded = Vec::with_capacity(Self::layout().board_len());

        encoded.extend(self.cells.iter().map(|&c| c * sign));

        let mut legal = [0i8; CELLS];
        for a in self.legal_actions() {
            legal[a] = 1;
        }
        encoded.extend_from_slice(&legal);

        encoded.extend(self.macro_board.iter().map(|&m| if m == DRAWN { m } else { m * sign }));
        encoded
    }

    fn layout() -> EncodingLayout {
        EncodingLayout {
            planes: vec![SIDE, SIDE, 3],
            trailer: 0,
            action_side: SIDE,
        }
    }
}

impl fmt::Display for UltimateTicTacToe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..SIDE {
            if row > 0 && row % 3 == 0 {
                writeln!(f, "---+---+---")?;
            }
            let mut line = String::with_capacity(11);
            for col in 0..SIDE {
                if col > 0 && col % 3 == 0 {
                    line.push('|');
                }
                line.push(match self.cells[row * SIDE + col] {
                    1 => 'X',
                    -1 => 'O',
                    _ => '.',
                });
            }
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_mapping_roundtrip() {
        for a in 0..CELLS {
            let (board, cell) = locate(a);
            assert_eq!(action_of(board, cell), a);
        }
        assert_eq!(locate(10), (0, 4));
        assert_eq!(locate(40), (4, 4));
        assert_eq!(locate(8), (2, 2));
    }

    #[test]
    fn test_opening_allows_every_cell() {
        let game = UltimateTicTacToe::new();
        assert_eq!(game.legal_actions().len(), CELLS);
    }

    #[test]
    fn test_forced_sub_board() {
        let mut game = UltimateTicTacToe::new();
        game.apply_action(0).unwrap();
        assert_eq!(game.forced_board(), Some(0));
        assert_eq!(game.legal_actions(), vec![1, 2, 9, 10, 11, 18, 19, 20]);

        // Centre cell of sub-board 0 sends the opponent to the centre board
        game.apply_action(10).unwrap();
        assert_eq!(game.forced_board(), Some(4));
        assert_eq!(
            game.legal_actions(),
            vec![30, 31, 32, 39, 40, 41, 48, 49, 50]
        );
        assert!(matches!(game.apply_action(0), Err(SelfPlayError::InvalidAction(0))));
    }

    #[test]
    fn test_closed_board_frees_the_mover() {
        let mut game = UltimateTicTacToe::new();
        game.macro_board[4] = 1;
        game.forced = Some(4);
        assert_eq!(game.forced_board(), None);
        let legal = game.legal_actions();
        assert_eq!(legal.len(), CELLS - 9);
        assert!(!legal.contains(&40));
    }

    #[test]
    fn test_macro_row_wins_the_game() {
        let mut game = UltimateTicTacToe::new();
        game.macro_board[0] = 1;
        game.macro_board[1] = 1;
        // Two in a row on the top line of sub-board 2
        game.cells[6] = 1;
        game.cells[7] = 1;
        game.forced = Some(2);

        game.apply_action(8).unwrap();
        assert_eq!(game.macro_board()[2], 1);
        assert_eq!(game.status(), GameStatus::Won(Player::First));
        assert!(game.legal_actions().is_empty());
        assert_eq!(game.terminal_value(), Some(-1.0));
    }

    #[test]
    fn test_encoding_shape_and_perspective() {
        let mut game = UltimateTicTacToe::new();
        game.apply_action(40).unwrap();
        let encoded = game.encode();
        assert_eq!(encoded.len(), UltimateTicTacToe::layout().board_len());
        assert_eq!(encoded[40], -1);
        // Legal plane marks the centre board minus the played cell
        let legal: usize = encoded[CELLS..2 * CELLS].iter().map(|&v| v as usize).sum();
        assert_eq!(legal, 8);
    }

    #[test]
    fn test_display_has_separators() {
        let rendered = UltimateTicTacToe::new().to_string();
        assert_eq!(rendered.lines().count(), 11);
        assert!(rendered.contains("---+---+---"));
    }
}
