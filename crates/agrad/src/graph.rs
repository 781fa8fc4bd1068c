//! Append-only arena holding the computation graph.

use crate::config::ArenaConfig;
use crate::error::AdError;
use crate::node::{Node, NodeKind, UnaryOp};
use crate::var::Var;
use smallvec::SmallVec;
use std::cell::{RefCell, RefMut};
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(0);

/// Draw a generation number that no other arena or epoch has used.
fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Identifier of a node in an arena.
///
/// Carries the generation of the arena epoch it was issued in, so ids that
/// outlive a [`Arena::reset`] or come from another arena are rejected by the
/// checked accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u64,
}

impl NodeId {
    /// Position of the node in creation order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Arena generation the id was issued in.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Node storage plus the parallel adjoint buffer.
#[derive(Debug, Default)]
pub(crate) struct Tape {
    pub(crate) nodes: Vec<Node>,
    pub(crate) adjoints: Vec<f64>,
}

/// Append-only store of every node created during one evaluation.
///
/// Creation order is a topological order: a node can only reference nodes
/// that already exist. Nodes are never removed one at a time; [`Arena::reset`]
/// drops all of them at once and keeps the allocation for the next
/// evaluation.
///
/// The arena is `Send` but not `Sync`. Handles borrow it, so one arena is
/// confined to one thread while any [`Var`] is alive.
///
/// # Example
///
/// ```
/// use agrad::Arena;
///
/// let arena = Arena::new();
/// let x = arena.var(3.0);
/// let y = x * x + 1.0;
/// assert_eq!(y.val(), 10.0);
/// assert_eq!(y.grad(&[x]).unwrap(), vec![6.0]);
/// ```
pub struct Arena {
    tape: RefCell<Tape>,
    generation: u64,
    config: ArenaConfig,
}

impl Arena {
    /// Create an arena with the default configuration.
    pub fn new() -> Self {
        Self::build(ArenaConfig::default())
    }

    /// Create an arena with an explicit configuration.
    ///
    /// # Errors
    /// Returns [`AdError::InvalidConfig`] if the configuration does not validate.
    pub fn with_config(config: ArenaConfig) -> Result<Self, AdError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ArenaConfig) -> Self {
        let generation = next_generation();
        log::debug!(
            "creating arena generation {generation} (capacity {}, limit {:?})",
            config.initial_capacity,
            config.max_nodes
        );
        Self {
            tape: RefCell::new(Tape {
                nodes: Vec::with_capacity(config.initial_capacity),
                adjoints: Vec::with_capacity(config.initial_capacity),
            }),
            generation,
            config,
        }
    }

    /// Configuration the arena was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Current generation; changes on every reset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.tape.borrow().nodes.len()
    }

    /// Check if the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.tape.borrow().nodes.is_empty()
    }

    /// Append a node and return its id.
    ///
    /// # Errors
    /// - [`AdError::ArenaExhausted`] if the node limit is reached
    /// - [`AdError::UnknownNode`] if `kind` references a node that does not exist yet
    /// - [`AdError::PartialsMismatch`] if an `Nary` kind has operand and partial
    ///   lists of different lengths
    pub fn create_node(&self, value: f64, kind: NodeKind) -> Result<NodeId, AdError> {
        let mut tape = self.tape.borrow_mut();
        let len = tape.nodes.len();

        if let Some(limit) = self.config.max_nodes {
            if len >= limit {
                log::warn!(
                    "arena generation {} exhausted at {limit} nodes",
                    self.generation
                );
                return Err(AdError::ArenaExhausted { limit });
            }
        }
        if let Some(index) = kind.max_operand() {
            if index >= len {
                return Err(AdError::UnknownNode { index, len });
            }
        }
        if let NodeKind::Nary { operands, partials } = &kind {
            if operands.len() != partials.len() {
                return Err(AdError::PartialsMismatch {
                    operands: operands.len(),
                    partials: partials.len(),
                });
            }
        }

        tape.nodes.push(Node::new(value, kind));
        tape.adjoints.push(0.0);
        Ok(NodeId {
            index: len,
            generation: self.generation,
        })
    }

    /// Append a node built by the operator layer, whose operands are known to exist.
    ///
    /// # Panics
    /// Panics if the arena's node limit is reached.
    pub(crate) fn push(&self, value: f64, kind: NodeKind) -> Var<'_> {
        match self.create_node(value, kind) {
            Ok(id) => Var::from_parts(self, id),
            Err(err) => panic!("{err}"),
        }
    }

    /// Create an independent variable.
    ///
    /// # Panics
    /// Panics if the arena's node limit is reached; see [`Arena::try_var`].
    pub fn var(&self, value: f64) -> Var<'_> {
        self.push(value, NodeKind::Leaf)
    }

    /// Create an independent variable, reporting exhaustion as an error.
    ///
    /// # Errors
    /// Returns [`AdError::ArenaExhausted`] if the node limit is reached.
    pub fn try_var(&self, value: f64) -> Result<Var<'_>, AdError> {
        let id = self.create_node(value, NodeKind::Leaf)?;
        Ok(Var::from_parts(self, id))
    }

    /// Bind each value to a fresh independent variable, in order.
    ///
    /// # Panics
    /// Panics if the arena's node limit is reached.
    pub fn vars(&self, values: &[f64]) -> Vec<Var<'_>> {
        values.iter().map(|&value| self.var(value)).collect()
    }

    /// Append a single-operand node with a caller-computed partial derivative.
    ///
    /// `value` is the function value at `operand` and `partial` its
    /// derivative there.
    ///
    /// # Errors
    /// - [`AdError::ForeignHandle`] if `operand` belongs to another arena
    /// - [`AdError::ArenaExhausted`] if the node limit is reached
    pub fn unary<'a>(
        &'a self,
        value: f64,
        operand: Var<'a>,
        partial: f64,
    ) -> Result<Var<'a>, AdError> {
        if !operand.belongs_to(self) {
            return Err(AdError::ForeignHandle { position: 0 });
        }
        let id = self.create_node(
            value,
            NodeKind::Unary {
                op: UnaryOp::Custom,
                operand: operand.id().index(),
                partial,
            },
        )?;
        Ok(Var::from_parts(self, id))
    }

    /// Append a node with any number of operands and caller-computed partials.
    ///
    /// `partials[i]` is the derivative of `value` with respect to `operands[i]`.
    ///
    /// # Errors
    /// - [`AdError::PartialsMismatch`] if the two slices differ in length
    /// - [`AdError::ForeignHandle`] if an operand belongs to another arena
    /// - [`AdError::ArenaExhausted`] if the node limit is reached
    ///
    /// # Example
    ///
    /// ```
    /// use agrad::Arena;
    ///
    /// let arena = Arena::new();
    /// let xs = arena.vars(&[1.0, 2.0, 3.0]);
    /// // sum of squares with its gradient 2x supplied directly
    /// let value: f64 = xs.iter().map(|x| x.val() * x.val()).sum();
    /// let partials: Vec<f64> = xs.iter().map(|x| 2.0 * x.val()).collect();
    /// let f = arena.precomputed(value, &xs, &partials).unwrap();
    /// assert_eq!(f.val(), 14.0);
    /// assert_eq!(f.grad(&xs).unwrap(), vec![2.0, 4.0, 6.0]);
    /// ```
    pub fn precomputed<'a>(
        &'a self,
        value: f64,
        operands: &[Var<'a>],
        partials: &[f64],
    ) -> Result<Var<'a>, AdError> {
        if let Some(position) = operands.iter().position(|v| !v.belongs_to(self)) {
            return Err(AdError::ForeignHandle { position });
        }
        let kind = NodeKind::Nary {
            operands: operands.iter().map(|v| v.id().index()).collect::<SmallVec<_>>(),
            partials: SmallVec::from_slice(partials),
        };
        let id = self.create_node(value, kind)?;
        Ok(Var::from_parts(self, id))
    }

    fn check(&self, id: NodeId, len: usize) -> Result<usize, AdError> {
        if id.generation != self.generation {
            return Err(AdError::StaleNode {
                index: id.index,
                generation: id.generation,
                current: self.generation,
            });
        }
        if id.index >= len {
            return Err(AdError::UnknownNode {
                index: id.index,
                len,
            });
        }
        Ok(id.index)
    }

    /// Forward value of a node.
    ///
    /// # Errors
    /// Returns [`AdError::StaleNode`] or [`AdError::UnknownNode`] for ids that
    /// do not name a live node of this arena.
    pub fn value(&self, id: NodeId) -> Result<f64, AdError> {
        let tape = self.tape.borrow();
        let index = self.check(id, tape.nodes.len())?;
        Ok(tape.nodes[index].value())
    }

    /// Adjoint of a node as left by the last sweep.
    ///
    /// # Errors
    /// Same as [`Arena::value`].
    pub fn adjoint(&self, id: NodeId) -> Result<f64, AdError> {
        let tape = self.tape.borrow();
        let index = self.check(id, tape.adjoints.len())?;
        Ok(tape.adjoints[index])
    }

    pub(crate) fn value_at(&self, index: usize) -> f64 {
        self.tape.borrow().nodes[index].value()
    }

    pub(crate) fn adjoint_at(&self, index: usize) -> f64 {
        self.tape.borrow().adjoints[index]
    }

    pub(crate) fn tape_mut(&self) -> RefMut<'_, Tape> {
        self.tape.borrow_mut()
    }

    /// Set every adjoint to zero, keeping all nodes.
    pub fn zero_adjoints(&self) {
        self.tape.borrow_mut().adjoints.fill(0.0);
    }

    /// Drop every node and start a new generation.
    ///
    /// Allocated capacity is kept for the next evaluation. Taking `&mut self`
    /// guarantees no [`Var`] into this arena is still alive.
    pub fn reset(&mut self) {
        let tape = self.tape.get_mut();
        let dropped = tape.nodes.len();
        tape.nodes.clear();
        tape.adjoints.clear();
        let previous = self.generation;
        self.generation = next_generation();
        log::debug!(
            "reset arena generation {previous} -> {}: dropped {dropped} nodes",
            self.generation
        );
    }

    /// Render every node in creation order, one per line.
    ///
    /// ```text
    /// %0 = leaf value=5 adj=1
    /// %1 = leaf value=-1 adj=1
    /// %2 = Add(%0, %1) value=4 d=[1, 1] adj=1
    /// ```
    pub fn dump(&self) -> String {
        let tape = self.tape.borrow();
        let mut out = String::new();
        let rows = tape.nodes.iter().zip(tape.adjoints.iter()).enumerate();
        for (index, (node, adjoint)) in rows {
            out.push_str(&format!("%{index} = {node} adj={adjoint}\n"));
        }
        out
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("num_nodes", &self.len())
            .field("generation", &self.generation)
            .field("config", &self.config)
            .finish()
    }
}

// Thread-local default arena
thread_local! {
    static ARENA: RefCell<Arena> = RefCell::new(Arena::new());
}

/// Run `f` against this thread's default arena, creating it on first use.
///
/// Handles cannot escape `f`; copy out values or gradients instead.
///
/// # Example
///
/// ```
/// use agrad::{reset_arena, with_arena};
///
/// let grad = with_arena(|arena| {
///     let a = arena.var(2.0);
///     let b = arena.var(4.0);
///     (a * b).grad(&[a, b]).unwrap()
/// });
/// assert_eq!(grad, vec![4.0, 2.0]);
/// reset_arena().unwrap();
/// ```
pub fn with_arena<R>(f: impl FnOnce(&Arena) -> R) -> R {
    ARENA.with(|arena| f(&*arena.borrow()))
}

/// Reset this thread's default arena.
///
/// # Errors
/// Returns [`AdError::ArenaBusy`] when called from inside [`with_arena`].
pub fn reset_arena() -> Result<(), AdError> {
    ARENA.with(|arena| match arena.try_borrow_mut() {
        Ok(mut arena) => {
            arena.reset();
            Ok(())
        }
        Err(_) => Err(AdError::ArenaBusy),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BinaryOp;

    #[test]
    fn test_create_leaf() {
        let arena = Arena::new();

        let id1 = arena.create_node(1.0, NodeKind::Leaf).unwrap();
        let id2 = arena.create_node(2.0, NodeKind::Leaf).unwrap();

        assert_eq!(id1.index(), 0);
        assert_eq!(id2.index(), 1);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.value(id2).unwrap(), 2.0);
        assert_eq!(arena.adjoint(id1).unwrap(), 0.0);
    }

    #[test]
    fn test_create_node_rejects_forward_reference() {
        let arena = Arena::new();
        arena.create_node(1.0, NodeKind::Leaf).unwrap();

        let kind = NodeKind::Binary {
            op: BinaryOp::Add,
            lhs: 0,
            rhs: 1,
            partials: [1.0, 1.0],
        };
        let err = arena.create_node(2.0, kind).unwrap_err();
        assert_eq!(err, AdError::UnknownNode { index: 1, len: 1 });
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_create_node_rejects_unpaired_partials() {
        let arena = Arena::new();
        arena.create_node(1.0, NodeKind::Leaf).unwrap();
        arena.create_node(2.0, NodeKind::Leaf).unwrap();

        let kind = NodeKind::Nary {
            operands: [0, 1].into_iter().collect(),
            partials: [1.0].into_iter().collect(),
        };
        let err = arena.create_node(3.0, kind).unwrap_err();
        assert_eq!(
            err,
            AdError::PartialsMismatch {
                operands: 2,
                partials: 1
            }
        );
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_node_limit() {
        let config = ArenaConfig::default()
            .with_initial_capacity(2)
            .with_max_nodes(2);
        let arena = Arena::with_config(config).unwrap();

        arena.try_var(1.0).unwrap();
        arena.try_var(2.0).unwrap();
        let err = arena.try_var(3.0).unwrap_err();
        assert_eq!(err, AdError::ArenaExhausted { limit: 2 });
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.value_at(1), 2.0);
    }

    #[test]
    #[should_panic(expected = "arena exhausted")]
    fn test_operator_panics_when_exhausted() {
        let config = ArenaConfig::default()
            .with_initial_capacity(1)
            .with_max_nodes(1);
        let arena = Arena::with_config(config).unwrap();
        let x = arena.var(1.0);
        let _ = x + 1.0;
    }

    #[test]
    fn test_invalid_config() {
        let config = ArenaConfig::default()
            .with_initial_capacity(10)
            .with_max_nodes(1);
        assert!(Arena::with_config(config).is_err());
    }

    #[test]
    fn test_reset() {
        let mut arena = Arena::new();
        let id = arena.var(1.0).id();
        arena.var(2.0);
        assert_eq!(arena.len(), 2);

        let before = arena.generation();
        arena.reset();
        assert!(arena.is_empty());
        assert_ne!(arena.generation(), before);

        let err = arena.value(id).unwrap_err();
        assert!(matches!(err, AdError::StaleNode { index: 0, .. }));
    }

    #[test]
    fn test_foreign_id_is_stale() {
        let a = Arena::new();
        let b = Arena::new();
        let id = a.var(1.0).id();
        b.var(1.0);
        assert!(matches!(b.value(id), Err(AdError::StaleNode { .. })));
    }

    #[test]
    fn test_vars_preserve_order() {
        let arena = Arena::new();
        let xs = arena.vars(&[3.0, 1.0, 2.0]);
        let values: Vec<f64> = xs.iter().map(|x| x.val()).collect();
        assert_eq!(values, vec![3.0, 1.0, 2.0]);
        assert_eq!(xs[2].id().index(), 2);
    }

    #[test]
    fn test_precomputed_mismatch() {
        let arena = Arena::new();
        let xs = arena.vars(&[1.0, 2.0]);
        let err = arena.precomputed(3.0, &xs, &[1.0]).unwrap_err();
        assert_eq!(
            err,
            AdError::PartialsMismatch {
                operands: 2,
                partials: 1
            }
        );
    }

    #[test]
    fn test_precomputed_foreign_operand() {
        let arena = Arena::new();
        let other = Arena::new();
        let x = arena.var(1.0);
        let y = other.var(2.0);
        let err = arena.precomputed(3.0, &[x, y], &[1.0, 1.0]).unwrap_err();
        assert_eq!(err, AdError::ForeignHandle { position: 1 });
    }

    #[test]
    fn test_unary_extension_node() {
        let arena = Arena::new();
        let x = arena.var(0.0);
        // cos at 0 and -sin(0)
        let y = arena.unary(1.0, x, -0.0).unwrap();
        assert_eq!(y.val(), 1.0);
        assert_eq!(y.grad(&[x]).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_zero_adjoints() {
        let arena = Arena::new();
        let x = arena.var(2.0);
        let y = x * 3.0;
        y.grad(&[x]).unwrap();
        assert_eq!(x.adj(), 3.0);

        arena.zero_adjoints();
        assert_eq!(x.adj(), 0.0);
        assert_eq!(y.adj(), 0.0);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_dump() {
        let arena = Arena::new();
        let a = arena.var(5.0);
        let b = arena.var(-1.0);
        let _ = a + b;
        let dump = arena.dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "%0 = leaf value=5 adj=0");
        assert_eq!(lines[2], "%2 = Add(%0, %1) value=4 d=[1, 1] adj=0");
    }

    #[test]
    fn test_thread_local_arena() {
        reset_arena().unwrap();

        with_arena(|arena| {
            arena.var(1.0);
            arena.var(2.0);
        });

        let count = with_arena(|arena| arena.len());
        assert_eq!(count, 2);

        reset_arena().unwrap();

        let count = with_arena(|arena| arena.len());
        assert_eq!(count, 0);
    }

    #[test]
    fn test_reset_inside_with_arena_is_busy() {
        let result = with_arena(|_| reset_arena());
        assert_eq!(result, Err(AdError::ArenaBusy));
    }

    #[test]
    fn test_arenas_on_separate_threads() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    let arena = Arena::new();
                    let x = arena.var(i as f64);
                    let y = x * x;
                    y.grad(&[x]).unwrap()[0]
                })
            })
            .collect();
        let grads: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(grads, vec![0.0, 2.0, 4.0, 6.0]);
    }
}
