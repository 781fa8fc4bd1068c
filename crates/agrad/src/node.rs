//! Graph nodes and their backward-propagation rule.

use smallvec::SmallVec;
use std::fmt;

/// Inline operand capacity of an [`NodeKind::Nary`] node before it spills to the heap.
pub const NARY_INLINE: usize = 4;

/// Operation that produced a single-operand node.
///
/// The tag is informational; propagation only uses the stored partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `x + c` or `c + x`
    AddConst,
    /// `x - c`
    SubConst,
    /// `c - x`
    ConstSub,
    /// `x * c` or `c * x`
    MulConst,
    /// `x / c`
    DivConst,
    /// `c / x`
    ConstDiv,
    /// `-x`
    Neg,
    /// Node built by an extension through [`Arena::unary`](crate::Arena::unary).
    Custom,
}

/// Operation that produced a two-operand node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Operand edges of a node together with their local partial derivatives.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Independent input or constant; nothing to propagate.
    Leaf,
    /// One differentiable operand.
    Unary {
        op: UnaryOp,
        operand: usize,
        partial: f64,
    },
    /// Two differentiable operands.
    Binary {
        op: BinaryOp,
        lhs: usize,
        rhs: usize,
        partials: [f64; 2],
    },
    /// Any number of operands with caller-supplied partials.
    Nary {
        operands: SmallVec<[usize; NARY_INLINE]>,
        partials: SmallVec<[f64; NARY_INLINE]>,
    },
}

impl NodeKind {
    /// Largest operand index, if any.
    pub(crate) fn max_operand(&self) -> Option<usize> {
        match self {
            NodeKind::Leaf => None,
            NodeKind::Unary { operand, .. } => Some(*operand),
            NodeKind::Binary { lhs, rhs, .. } => Some((*lhs).max(*rhs)),
            NodeKind::Nary { operands, .. } => operands.iter().copied().max(),
        }
    }
}

/// A node in the computation graph.
///
/// The forward value is fixed at construction. The adjoint lives in the
/// arena's adjoint buffer at the same index as the node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    value: f64,
    kind: NodeKind,
}

impl Node {
    pub(crate) fn new(value: f64, kind: NodeKind) -> Self {
        Self { value, kind }
    }

    /// Forward value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Operand edges.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Push `adjoint` (this node's own adjoint) into the operands' adjoints.
    ///
    /// Contributions are added, so a node used by several downstream nodes
    /// collects all of them before it is visited itself.
    #[inline]
    pub fn chain(&self, adjoint: f64, adjoints: &mut [f64]) {
        match &self.kind {
            NodeKind::Leaf => {}
            NodeKind::Unary {
                operand, partial, ..
            } => {
                adjoints[*operand] += adjoint * partial;
            }
            NodeKind::Binary {
                lhs, rhs, partials, ..
            } => {
                adjoints[*lhs] += adjoint * partials[0];
                adjoints[*rhs] += adjoint * partials[1];
            }
            NodeKind::Nary { operands, partials } => {
                for (&operand, &partial) in operands.iter().zip(partials.iter()) {
                    adjoints[operand] += adjoint * partial;
                }
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Leaf => write!(f, "leaf value={}", self.value),
            NodeKind::Unary {
                op,
                operand,
                partial,
            } => write!(f, "{op:?}(%{operand}) value={} d=[{partial}]", self.value),
            NodeKind::Binary {
                op,
                lhs,
                rhs,
                partials,
            } => write!(
                f,
                "{op:?}(%{lhs}, %{rhs}) value={} d=[{}, {}]",
                self.value, partials[0], partials[1]
            ),
            NodeKind::Nary { operands, partials } => {
                write!(f, "Nary(")?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "%{operand}")?;
                }
                write!(f, ") value={} d={:?}", self.value, partials.as_slice())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_leaf_chain_is_noop() {
        let node = Node::new(3.0, NodeKind::Leaf);
        let mut adjoints = vec![0.5, 0.25];
        node.chain(1.0, &mut adjoints);
        assert_eq!(adjoints, vec![0.5, 0.25]);
    }

    #[test]
    fn test_unary_chain_scales_by_partial() {
        let node = Node::new(
            6.0,
            NodeKind::Unary {
                op: UnaryOp::MulConst,
                operand: 0,
                partial: 3.0,
            },
        );
        let mut adjoints = vec![0.0, 2.0];
        node.chain(2.0, &mut adjoints);
        assert_eq!(adjoints[0], 6.0);
    }

    #[test]
    fn test_binary_chain_accumulates() {
        let node = Node::new(
            6.0,
            NodeKind::Binary {
                op: BinaryOp::Mul,
                lhs: 0,
                rhs: 1,
                partials: [3.0, 2.0],
            },
        );
        let mut adjoints = vec![1.0, 1.0, 1.0];
        node.chain(1.0, &mut adjoints);
        assert_eq!(adjoints, vec![4.0, 3.0, 1.0]);
    }

    #[test]
    fn test_binary_chain_same_operand_twice() {
        let node = Node::new(
            4.0,
            NodeKind::Binary {
                op: BinaryOp::Add,
                lhs: 0,
                rhs: 0,
                partials: [1.0, 1.0],
            },
        );
        let mut adjoints = vec![0.0, 1.0];
        node.chain(1.0, &mut adjoints);
        assert_eq!(adjoints[0], 2.0);
    }

    #[test]
    fn test_nary_chain() {
        let node = Node::new(
            0.0,
            NodeKind::Nary {
                operands: smallvec![0, 1, 2],
                partials: smallvec![1.0, -1.0, 0.5],
            },
        );
        let mut adjoints = vec![0.0; 4];
        node.chain(2.0, &mut adjoints);
        assert_eq!(adjoints, vec![2.0, -2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_max_operand() {
        assert_eq!(NodeKind::Leaf.max_operand(), None);
        let kind = NodeKind::Binary {
            op: BinaryOp::Sub,
            lhs: 4,
            rhs: 2,
            partials: [1.0, -1.0],
        };
        assert_eq!(kind.max_operand(), Some(4));
    }

    #[test]
    fn test_display() {
        let node = Node::new(
            5.0,
            NodeKind::Binary {
                op: BinaryOp::Add,
                lhs: 0,
                rhs: 1,
                partials: [1.0, 1.0],
            },
        );
        assert_eq!(node.to_string(), "Add(%0, %1) value=5 d=[1, 1]");

        let node = Node::new(
            12.0,
            NodeKind::Unary {
                op: UnaryOp::AddConst,
                operand: 0,
                partial: 1.0,
            },
        );
        assert_eq!(node.to_string(), "AddConst(%0) value=12 d=[1]");
    }
}
