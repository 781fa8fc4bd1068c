//! Error types for agrad.

use thiserror::Error;

/// Errors that can occur while building or differentiating a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdError {
    /// The arena refused a new node because its node limit was reached.
    #[error("arena exhausted: node limit of {limit} reached")]
    ArenaExhausted { limit: usize },

    /// A handle passed alongside the output lives in a different arena.
    #[error("handle at position {position} belongs to a different arena than the output")]
    ForeignHandle { position: usize },

    /// A node id was issued before the arena was last reset.
    #[error("node {index} is from arena generation {generation}, arena is at generation {current}")]
    StaleNode {
        index: usize,
        generation: u64,
        current: u64,
    },

    /// A node id does not name any node in the arena.
    #[error("node {index} does not exist in an arena of {len} nodes")]
    UnknownNode { index: usize, len: usize },

    /// Operand and partial-derivative lists of a precomputed node disagree.
    #[error("precomputed node has {operands} operands but {partials} partials")]
    PartialsMismatch { operands: usize, partials: usize },

    /// The thread-local arena is borrowed and cannot be reset.
    #[error("thread-local arena is in use and cannot be reset")]
    ArenaBusy,

    /// Arena configuration values are inconsistent.
    #[error("invalid arena config: {message}")]
    InvalidConfig { message: String },
}
