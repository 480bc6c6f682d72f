//! PUCT selection and backpropagation over the arena tree

use crate::game::Game;
use crate::mcts::node::{Node, NodeId, SearchTree};

/// PUCT score of `child` seen from its parent.
///
/// Formula: Q + c_puct × P × sqrt(N_parent) / (1 + N_child)
///
/// Q is the child's mean value negated, since the child stores values from
/// the opponent's point of view.
pub fn puct_score<G>(parent_visits: u32, child: &Node<G>, c_puct: f32) -> f32
where
    G: Game,
{
    let q = -child.q();
    let exploration = c_puct * child.p * (parent_visits as f32).sqrt() / (1.0 + child.n as f32);
    q + exploration
}

/// Index of the best child of `id`, first one wins on ties
pub fn select_best_child<G: Game>(tree: &SearchTree<G>, id: NodeId, c_puct: f32) -> Option<NodeId> {
    let node = tree.get(id);
    let mut best: Option<(NodeId, f32)> = None;

    for &child_id in &node.children {
        let score = puct_score(node.n, tree.get(child_id), c_puct);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((child_id, score)),
        }
    }

    best.map(|(child_id, _)| child_id)
}

/// Descends from `from` until reaching an unexpanded or terminal node.
pub fn select<G: Game>(tree: &SearchTree<G>, from: NodeId, c_puct: f32) -> NodeId {
    let mut current = from;
    loop {
        let node = tree.get(current);
        if node.terminal {
            return current;
        }
        match select_best_child(tree, current, c_puct) {
            Some(child) => current = child,
            None => return current,
        }
    }
}

/// Adds `value` to every node from `leaf` up to the root, flipping its sign
/// each ply. `value` is from the perspective of the player to move at `leaf`.
pub fn backpropagate<G: Game>(tree: &mut SearchTree<G>, leaf: NodeId, value: f32) {
    let mut current = Some(leaf);
    let mut value = value;

    while let Some(id) = current {
        let node = tree.get_mut(id);
        node.n += 1;
        node.w += value;
        value = -value;
        current = node.parent;
    }
}
