//! Gradient snapshot container.

use crate::graph::NodeId;

/// Adjoints of every node after one reverse sweep.
///
/// Indexed by [`NodeId`]; ids from another arena or from before a reset
/// are not found.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    generation: u64,
    adjoints: Vec<f64>,
}

impl Gradients {
    pub(crate) fn new(generation: u64, adjoints: Vec<f64>) -> Self {
        Self {
            generation,
            adjoints,
        }
    }

    /// Get the adjoint of a node.
    pub fn get(&self, id: NodeId) -> Option<f64> {
        if id.generation() != self.generation {
            return None;
        }
        self.adjoints.get(id.index()).copied()
    }

    /// Number of stored adjoints (one per node at sweep time).
    pub fn len(&self) -> usize {
        self.adjoints.len()
    }

    /// Check if no adjoints are stored.
    pub fn is_empty(&self) -> bool {
        self.adjoints.is_empty()
    }

    /// Adjoints in node creation order.
    pub fn as_slice(&self) -> &[f64] {
        &self.adjoints
    }

    /// Iterate over `(node index, adjoint)` pairs with a nonzero adjoint.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.adjoints
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, adjoint)| adjoint != 0.0)
    }
}
