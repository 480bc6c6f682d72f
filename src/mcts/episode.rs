//! One self-play game with its own search tree.
//!
//! A simulation is split in two so a worker can interleave many episodes
//! around a single batched evaluation:
//! - `request_evaluation` descends to a leaf and hands back its encoding
//! - `resume_with_evaluation` expands that leaf and backpropagates the value

use log::debug;

use crate::data::TrainingExample;
use crate::game::{BoardEncoding, Game, Player};
use crate::mcts::node::{NodeId, SearchTree};
use crate::mcts::selection::{backpropagate, select};
use crate::{Result, SelfPlayError};

/// Outcome of the first simulation phase
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationRequest {
    /// The leaf needs the evaluator; carries its board encoding
    Needed(BoardEncoding),
    /// The leaf was terminal and its known value has already been backpropagated
    NotNeeded,
}

/// Position recorded when a move is played, before the outcome is known
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryStep {
    pub board: BoardEncoding,
    pub pi: Vec<f32>,
    pub q: f32,
}

#[derive(Debug, Clone)]
pub struct Episode<G> {
    tree: SearchTree<G>,
    /// Leaf waiting for its evaluation between the two phases
    pending: Option<NodeId>,
    trajectory: Vec<TrajectoryStep>,
    first_player: Player,
    c_puct: f32,
    retired: bool,
}

impl<G: Game> Episode<G> {
    pub fn new(c_puct: f32) -> Self {
        Self::from_state(G::new(), c_puct)
    }

    pub fn from_state(state: G, c_puct: f32) -> Self {
        let first_player = state.to_move();
        Episode {
            tree: SearchTree::new(state),
            pending: None,
            trajectory: Vec::new(),
            first_player,
            c_puct,
            retired: false,
        }
    }

    /// First phase of a simulation.
    ///
    /// # Errors
    /// - `EvaluationPending` if the previous request was never resumed
    /// - `NoLegalActions` if the selected leaf is neither terminal nor playable
    pub fn request_evaluation(&mut self) -> Result<EvaluationRequest> {
        if self.pending.is_some() {
            return Err(SelfPlayError::EvaluationPending);
        }

        let leaf = select(&self.tree, self.tree.root_id(), self.c_puct);
        let node = self.tree.get(leaf);

        if node.terminal {
            let value = node.state.terminal_value().unwrap_or(0.0);
            backpropagate(&mut self.tree, leaf, value);
            return Ok(EvaluationRequest::NotNeeded);
        }
        if node.state.legal_actions().is_empty() {
            return Err(SelfPlayError::NoLegalActions);
        }

        let board = node.state.encode();
        self.pending = Some(leaf);
        Ok(EvaluationRequest::Needed(board))
    }

    /// Second phase: expands the cached leaf with `policy` and backpropagates
    /// `value`, given from the perspective of the player to move at the leaf.
    pub fn resume_with_evaluation(&mut self, policy: &[f32], value: f32) -> Result<()> {
        let leaf = self.pending.take().ok_or(SelfPlayError::NoPendingEvaluation)?;
        self.tree.expand(leaf, policy)?;
        backpropagate(&mut self.tree, leaf, value);
        Ok(())
    }

    /// Root visit counts normalized into a policy over the whole action space.
    ///
    /// Uniform over the expanded children when none has been visited yet;
    /// all zeros if the root was never expanded.
    pub fn action_distribution(&self) -> Vec<f32> {
        let mut pi = vec![0.0; G::ACTION_SIZE];
        let root = self.tree.root();

        let total: u32 = root.children.iter().map(|&c| self.tree.get(c).n).sum();
        for &c in &root.children {
            let child = self.tree.get(c);
            if let Some(action) = child.action {
                pi[action] = if total > 0 {
                    child.n as f32 / total as f32
                } else {
                    1.0 / root.children.len() as f32
                };
            }
        }
        pi
    }

    /// Mean value of the live position for the player to move
    pub fn root_q(&self) -> f32 {
        self.tree.root().q()
    }

    /// Records the position and plays `action`. The search tree restarts
    /// from the new position; no subtree is carried over.
    pub fn apply_action(&mut self, action: usize) -> Result<()> {
        let root = self.tree.root();
        let mut next = root.state.clone();
        next.apply_action(action)?;

        let step = TrajectoryStep {
            board: root.state.encode(),
            pi: self.action_distribution(),
            q: root.q(),
        };
        let visits = root.n;
        self.trajectory.push(step);
        debug!(
            "move {} played action {} (root visits {})",
            self.trajectory.len(),
            action,
            visits
        );

        self.tree = SearchTree::new(next);
        self.pending = None;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.tree.root().state.is_terminal()
    }

    /// Game result from the perspective of the player who moved first,
    /// `None` while the game is running
    pub fn outcome(&self) -> Option<f32> {
        self.tree.root().state.status().outcome_for(self.first_player)
    }

    /// Turns the trajectory into training examples.
    ///
    /// `outcome` is from the first mover's perspective; its sign flips on
    /// every ply since consecutive positions belong to alternating movers.
    pub fn finalize(&mut self, outcome: f32) -> Vec<TrainingExample> {
        self.retired = true;
        std::mem::take(&mut self.trajectory)
            .into_iter()
            .enumerate()
            .map(|(ply, step)| {
                let result = if ply % 2 == 0 { outcome } else { -outcome };
                TrainingExample::new(step.board, result, step.q, step.pi)
            })
            .collect()
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub fn moves_played(&self) -> usize {
        self.trajectory.len()
    }

    pub fn trajectory(&self) -> &[TrajectoryStep] {
        &self.trajectory
    }

    pub fn state(&self) -> &G {
        &self.tree.root().state
    }

    pub fn legal_actions(&self) -> Vec<usize> {
        self.tree.root().state.legal_actions()
    }

    pub fn tree(&self) -> &SearchTree<G> {
        &self.tree
    }
}
