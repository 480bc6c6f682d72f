//! Canonical forms and duplicate merging
//!
//! The canonical form of a board is its lexicographically smallest image
//! under the eight symmetries; the lowest symmetry index wins ties. The
//! policy is carried through the same transform so it keeps pointing at the
//! same moves.

use crate::data::augmentation::{Symmetry, SymmetryTable};
use crate::data::training_example::TrainingExample;
use crate::game::BoardEncoding;

/// Symmetry that maps `board` onto its canonical form
pub fn canonical_symmetry(table: &SymmetryTable, board: &[i8]) -> Symmetry {
    let mut best = Symmetry::IDENTITY;
    let mut best_board: BoardEncoding = board.to_vec();

    for sym in Symmetry::all().into_iter().skip(1) {
        let image = table.transform_board(sym, board);
        if image < best_board {
            best = sym;
            best_board = image;
        }
    }
    best
}

/// Returns `example` rewritten in canonical form
pub fn canonicalize(table: &SymmetryTable, example: &TrainingExample) -> TrainingExample {
    let sym = canonical_symmetry(table, &example.board);
    TrainingExample {
        board: table.transform_board(sym, &example.board),
        pi: table.transform_policy(sym, &example.pi),
        ..example.clone()
    }
}

/// Folds `incoming` into `existing` as a running weighted average.
///
/// Each side weighs by its `times_seen`, so merging raw examples one at a
/// time gives `(x × seen + new) / (seen + 1)`, and the order of merges does
/// not matter.
pub fn merge_duplicate(existing: &mut TrainingExample, incoming: &TrainingExample) {
    let old = existing.times_seen as f32;
    let new = incoming.times_seen as f32;
    let total = old + new;

    for (p, &q) in existing.pi.iter_mut().zip(incoming.pi.iter()) {
        *p = (*p * old + q * new) / total;
    }
    existing.result = (existing.result * old + incoming.result * new) / total;
    existing.q = (existing.q * old + incoming.q * new) / total;
    existing.times_seen += incoming.times_seen;
}

/// All eight symmetric images of `example`, identity first
pub fn symmetric_variants(
    table: &SymmetryTable,
    example: &TrainingExample,
) -> Vec<TrainingExample> {
    Symmetry::all()
        .into_iter()
        .map(|sym| TrainingExample {
            board: table.transform_board(sym, &example.board),
            pi: table.transform_policy(sym, &example.pi),
            ..example.clone()
        })
        .collect()
}
