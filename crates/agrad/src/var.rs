//! Var - differentiable scalar handle into an arena.

use crate::backward::grad;
use crate::error::AdError;
use crate::graph::{Arena, NodeId};
use crate::node::{BinaryOp, NodeKind, UnaryOp};
use std::cmp::Ordering;
use std::fmt;

/// A differentiable scalar.
///
/// This is the main user-facing type. It is a copyable reference to a node
/// in an [`Arena`]; arithmetic on it appends nodes to that arena.
///
/// Assignment operators rebind the variable to a new node. Copies taken
/// before the assignment keep referring to the old node:
///
/// ```
/// use agrad::Arena;
///
/// let arena = Arena::new();
/// let mut a = arena.var(5.0);
/// let b = arena.var(-1.0);
/// let a0 = a;
///
/// a += b;
/// assert_eq!(a.val(), 4.0);
/// assert_eq!(a0.val(), 5.0);
/// assert_eq!(a.grad(&[a0, b]).unwrap(), vec![1.0, 1.0]);
/// ```
#[derive(Clone, Copy)]
pub struct Var<'a> {
    arena: &'a Arena,
    id: NodeId,
}

impl<'a> Var<'a> {
    pub(crate) fn from_parts(arena: &'a Arena, id: NodeId) -> Self {
        Self { arena, id }
    }

    /// Forward value.
    pub fn val(&self) -> f64 {
        self.arena.value_at(self.id.index())
    }

    /// Adjoint left on this node by the most recent sweep.
    pub fn adj(&self) -> f64 {
        self.arena.adjoint_at(self.id.index())
    }

    /// Node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Arena the node lives in.
    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    /// Check whether this handle points into `arena`.
    pub fn belongs_to(&self, arena: &Arena) -> bool {
        std::ptr::eq(self.arena, arena)
    }

    /// Gradient of `self` with respect to each of `inputs`, in order.
    ///
    /// # Errors
    /// See [`grad`].
    pub fn grad(&self, inputs: &[Var<'a>]) -> Result<Vec<f64>, AdError> {
        grad(self, inputs)
    }

    fn same_arena(&self, other: &Var<'a>) {
        assert!(
            std::ptr::eq(self.arena, other.arena),
            "operands of a binary operation belong to different arenas"
        );
    }

    pub(crate) fn unary(self, op: UnaryOp, value: f64, partial: f64) -> Var<'a> {
        self.arena.push(
            value,
            NodeKind::Unary {
                op,
                operand: self.id.index(),
                partial,
            },
        )
    }

    /// Append a two-operand node.
    ///
    /// # Panics
    /// Panics if `rhs` lives in another arena.
    pub(crate) fn binary(
        self,
        op: BinaryOp,
        rhs: Var<'a>,
        value: f64,
        partials: [f64; 2],
    ) -> Var<'a> {
        self.same_arena(&rhs);
        self.arena.push(
            value,
            NodeKind::Binary {
                op,
                lhs: self.id.index(),
                rhs: rhs.id.index(),
                partials,
            },
        )
    }
}

impl fmt::Debug for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("index", &self.id.index())
            .field("value", &self.val())
            .finish()
    }
}

impl fmt::Display for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.val(), f)
    }
}

// Comparisons look at forward values only and record nothing.

impl PartialEq for Var<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.val() == other.val()
    }
}

impl PartialEq<f64> for Var<'_> {
    fn eq(&self, other: &f64) -> bool {
        self.val() == *other
    }
}

impl PartialEq<Var<'_>> for f64 {
    fn eq(&self, other: &Var<'_>) -> bool {
        *self == other.val()
    }
}

impl PartialOrd for Var<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.val().partial_cmp(&other.val())
    }
}

impl PartialOrd<f64> for Var<'_> {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.val().partial_cmp(other)
    }
}

impl PartialOrd<Var<'_>> for f64 {
    fn partial_cmp(&self, other: &Var<'_>) -> Option<Ordering> {
        self.partial_cmp(&other.val())
    }
}
