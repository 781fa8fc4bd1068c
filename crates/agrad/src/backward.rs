//! Reverse sweep for reverse-mode automatic differentiation.

use crate::error::AdError;
use crate::gradients::Gradients;
use crate::graph::{Arena, Tape};
use crate::var::Var;

/// Zero all adjoints, seed `output` with 1 and propagate in reverse creation order.
///
/// Every node is chained, including those with a zero adjoint.
fn sweep(arena: &Arena, output: usize) {
    let mut tape = arena.tape_mut();
    let Tape { nodes, adjoints } = &mut *tape;

    log::trace!("reverse sweep from node {output} over {} nodes", nodes.len());

    adjoints.fill(0.0);
    adjoints[output] = 1.0;

    for (index, node) in nodes.iter().enumerate().rev() {
        node.chain(adjoints[index], adjoints);
    }

    log::trace!("reverse sweep from node {output} done");
}

/// Compute the gradient of `output` with respect to `inputs`.
///
/// Runs one reverse sweep over the arena and returns the adjoint of each
/// input, in the order given. An input that does not feed into `output`
/// gets 0. Calling it twice without changing the graph returns the same
/// result, since every sweep starts from zeroed adjoints.
///
/// # Errors
/// Returns [`AdError::ForeignHandle`] if an input belongs to another arena.
///
/// # Example
///
/// ```
/// use agrad::{Arena, grad};
///
/// let arena = Arena::new();
/// let x = arena.vars(&[1.0, 2.0, 3.0]);
/// let f = x[0] * x[1] + x[2];
/// assert_eq!(grad(&f, &x).unwrap(), vec![2.0, 1.0, 1.0]);
/// ```
pub fn grad<'a>(output: &Var<'a>, inputs: &[Var<'a>]) -> Result<Vec<f64>, AdError> {
    let arena = output.arena();
    if let Some(position) = inputs.iter().position(|v| !v.belongs_to(arena)) {
        return Err(AdError::ForeignHandle { position });
    }

    sweep(arena, output.id().index());

    Ok(inputs.iter().map(Var::adj).collect())
}

/// Run a reverse sweep from `output` and snapshot every adjoint.
///
/// # Example
///
/// ```
/// use agrad::{Arena, backward};
///
/// let arena = Arena::new();
/// let a = arena.var(3.0);
/// let b = arena.var(4.0);
/// let loss = a * b;
///
/// let grads = backward(&loss);
/// assert_eq!(grads.get(a.id()), Some(4.0));
/// assert_eq!(grads.get(b.id()), Some(3.0));
/// ```
pub fn backward(output: &Var<'_>) -> Gradients {
    let arena = output.arena();
    sweep(arena, output.id().index());
    let adjoints = arena.tape_mut().adjoints.clone();
    Gradients::new(arena.generation(), adjoints)
}
