//! Symmetries of the square board
//!
//! The eight elements of the dihedral group: identity, three rotations and
//! the same four composed with a horizontal mirror. Every square plane of an
//! encoding is transformed with the same element, each at its own side
//! length, so a 9x9 cell grid and its 3x3 macro board stay consistent.

use crate::game::{BoardEncoding, EncodingLayout};

/// Element of the dihedral group of the square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symmetry {
    /// Quarter turns clockwise, applied after the mirror
    pub rotations: u8,
    pub mirrored: bool,
}

impl Symmetry {
    pub const IDENTITY: Symmetry = Symmetry {
        rotations: 0,
        mirrored: false,
    };

    /// All 8 symmetries; index 0 is the identity
    pub fn all() -> [Self; 8] {
        let mut out = [Self::IDENTITY; 8];
        for (i, sym) in out.iter_mut().enumerate() {
            *sym = Self::from_index(i);
        }
        out
    }

    pub fn from_index(index: usize) -> Self {
        Symmetry {
            rotations: (index % 4) as u8,
            mirrored: index >= 4,
        }
    }

    pub fn index(self) -> usize {
        self.rotations as usize + if self.mirrored { 4 } else { 0 }
    }

    /// Image of cell `(row, col)` on a `side × side` grid
    pub fn map_cell(self, side: usize, row: usize, col: usize) -> (usize, usize) {
        let (mut r, mut c) = (row, col);
        if self.mirrored {
            c = side - 1 - c;
        }
        for _ in 0..self.rotations {
            let rotated = (c, side - 1 - r);
            r = rotated.0;
            c = rotated.1;
        }
        (r, c)
    }
}

/// `perm[i]` is where index `i` lands after the transform
fn square_permutation(sym: Symmetry, side: usize, offset: usize, perm: &mut Vec<usize>) {
    for row in 0..side {
        for col in 0..side {
            let (r, c) = sym.map_cell(side, row, col);
            perm.push(offset + r * side + c);
        }
    }
}

/// Precomputed index permutations of every symmetry for one encoding layout
#[derive(Debug, Clone)]
pub struct SymmetryTable {
    board: Vec<Vec<usize>>,
    policy: Vec<Vec<usize>>,
}

impl SymmetryTable {
    pub fn new(layout: &EncodingLayout) -> Self {
        let mut board = Vec::with_capacity(8);
        let mut policy = Vec::with_capacity(8);

        for sym in Symmetry::all() {
            let mut perm = Vec::with_capacity(layout.board_len());
            let mut offset = 0;
            for &side in &layout.planes {
                square_permutation(sym, side, offset, &mut perm);
                offset += side * side;
            }
            // Trailing values are not spatial
            perm.extend(offset..offset + layout.trailer);
            board.push(perm);

            let mut action_perm = Vec::with_capacity(layout.action_size());
            square_permutation(sym, layout.action_side, 0, &mut action_perm);
            policy.push(action_perm);
        }

        SymmetryTable { board, policy }
    }

    pub fn board_len(&self) -> usize {
        self.board[0].len()
    }

    pub fn transform_board(&self, sym: Symmetry, board: &[i8]) -> BoardEncoding {
        permute(&self.board[sym.index()], board)
    }

    pub fn transform_policy(&self, sym: Symmetry, pi: &[f32]) -> Vec<f32> {
        permute(&self.policy[sym.index()], pi)
    }

    /// Image of a single action under `sym`
    pub fn transform_action(&self, sym: Symmetry, action: usize) -> usize {
        self.policy[sym.index()][action]
    }
}

fn permute<T: Copy>(perm: &[usize], values: &[T]) -> Vec<T> {
    let mut out = values.to_vec();
    for (i, &v) in values.iter().enumerate() {
        if let Some(&dest) = perm.get(i) {
            out[dest] = v;
        }
    }
    out
}
