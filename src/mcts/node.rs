//! Arena-backed search tree
//!
//! Nodes live in a single `Vec` owned by the tree and refer to each other
//! through `NodeId` indices. Dropping the tree frees every node at once.

use crate::game::Game;
use crate::{Result, SelfPlayError};

/// Stable index of a node inside its `SearchTree`
pub type NodeId = usize;

/// A node in the search tree
#[derive(Debug, Clone)]
pub struct Node<G> {
    /// Position reached at this node
    pub state: G,

    /// Parent index, used only to walk back up during backpropagation
    pub parent: Option<NodeId>,

    /// Action that led from the parent to this node
    pub action: Option<usize>,

    /// Children in ascending action order, created on first expansion
    pub children: Vec<NodeId>,

    /// Number of times this node has been visited
    pub n: u32,

    /// Sum of backpropagated values, from the perspective of the player to move here
    pub w: f32,

    /// Prior probability assigned by the evaluator
    pub p: f32,

    pub terminal: bool,
}

impl<G: Game> Node<G> {
    fn new(state: G, parent: Option<NodeId>, action: Option<usize>, p: f32) -> Self {
        let terminal = state.is_terminal();
        Node {
            state,
            parent,
            action,
            children: Vec::new(),
            n: 0,
            w: 0.0,
            p,
            terminal,
        }
    }

    /// Mean value `w/n`, 0 before the first visit
    pub fn q(&self) -> f32 {
        if self.n == 0 {
            0.0
        } else {
            self.w / self.n as f32
        }
    }

    pub fn is_expanded(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Search tree for one episode, rooted at the live game position
#[derive(Debug, Clone)]
pub struct SearchTree<G> {
    nodes: Vec<Node<G>>,
    root: NodeId,
}

impl<G: Game> SearchTree<G> {
    pub fn new(state: G) -> Self {
        SearchTree {
            nodes: vec![Node::new(state, None, None, 1.0)],
            root: 0,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> &Node<G> {
        &self.nodes[self.root]
    }

    pub fn get(&self, id: NodeId) -> &Node<G> {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node<G> {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Creates one child per legal action of `id`.
    ///
    /// Priors come from `policy` restricted to the legal actions and
    /// renormalized over them. If the legal actions carry no policy mass at
    /// all, priors fall back to uniform.
    ///
    /// # Errors
    /// - `PolicyLength` if `policy` does not cover the whole action space
    /// - `NoLegalActions` if the position is not terminal but has no moves
    pub fn expand(&mut self, id: NodeId, policy: &[f32]) -> Result<()> {
        if policy.len() != G::ACTION_SIZE {
            return Err(SelfPlayError::PolicyLength {
                expected: G::ACTION_SIZE,
                got: policy.len(),
            });
        }
        if self.nodes[id].is_expanded() || self.nodes[id].terminal {
            return Ok(());
        }

        let legal = self.nodes[id].state.legal_actions();
        if legal.is_empty() {
            return Err(SelfPlayError::NoLegalActions);
        }

        let mass: f32 = legal.iter().map(|&a| policy[a].max(0.0)).sum();
        let uniform = 1.0 / legal.len() as f32;

        let mut children = Vec::with_capacity(legal.len());
        for action in legal {
            let prior = if mass > 0.0 {
                policy[action].max(0.0) / mass
            } else {
                uniform
            };
            let mut state = self.nodes[id].state.clone();
            state.apply_action(action)?;

            let child_id = self.nodes.len();
            self.nodes.push(Node::new(state, Some(id), Some(action), prior));
            children.push(child_id);
        }
        self.nodes[id].children = children;
        Ok(())
    }

    /// Child of `id` reached by `action`, if it has been created
    pub fn child_for_action(&self, id: NodeId, action: usize) -> Option<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].action == Some(action))
    }
}
