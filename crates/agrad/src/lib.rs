//! agrad - reverse-mode automatic differentiation for scalar computations.
//!
//! Write ordinary arithmetic over [`Var`] handles, then ask for exact partial
//! derivatives of the result with respect to any of the inputs.
//!
//! # Architecture
//!
//! ```text
//! Var<'a> ──(&'a Arena, NodeId)──►  Arena
//!    │                                │
//!    ▼                                ▼
//! std::ops (+ - * / neg, +=..)    Vec<Node>   ──  Vec<f64> adjoints
//!    │                                │
//!    └──── appends one Node ─────────►│
//!                                     ▼
//!                           grad / backward: reverse sweep
//! ```
//!
//! Every operation appends one [`Node`] recording its forward value and the
//! local partial derivatives with respect to its operands. A node can only
//! reference nodes created before it, so walking the arena backwards from
//! the output visits every node after all of its consumers.
//!
//! # Example
//!
//! ```
//! use agrad::{Arena, grad};
//!
//! let arena = Arena::new();
//! let mut a = arena.var(5.0);
//! let b = arena.var(-1.0);
//! let x = [a, b];
//!
//! a += b;
//! let f = a;
//! assert_eq!(f.val(), 4.0);
//! assert_eq!(b.val(), -1.0);
//!
//! let g = grad(&f, &x).unwrap();
//! assert_eq!(g, vec![1.0, 1.0]);
//! ```
//!
//! # Key Types
//!
//! - [`Arena`]: append-only node store for one evaluation
//! - [`Var`]: differentiable scalar handle
//! - [`grad`]: gradient of an output with respect to chosen inputs
//! - [`backward`] / [`Gradients`]: full adjoint snapshot
//! - [`gradient`] / [`jacobian`]: closure-based evaluation on a private arena
//!
//! # Design Notes
//!
//! - Handles borrow their arena, so an arena cannot be reset while any
//!   handle into it is alive, and cannot be shared across threads
//! - An opt-in thread-local arena is available through [`with_arena`]
//! - Adjoints accumulate, so values used on several paths get the sum

mod backward;
mod config;
mod error;
mod functional;
mod gradients;
mod graph;
mod node;
mod ops;
mod var;

pub use backward::{backward, grad};
pub use config::{ArenaConfig, DEFAULT_INITIAL_CAPACITY};
pub use error::AdError;
pub use functional::{gradient, gradient_in, jacobian};
pub use gradients::Gradients;
pub use graph::{Arena, NodeId, reset_arena, with_arena};
pub use node::{BinaryOp, NARY_INLINE, Node, NodeKind, UnaryOp};
pub use var::Var;
