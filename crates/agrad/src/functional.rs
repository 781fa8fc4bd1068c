//! Closure-based gradient and Jacobian evaluation.
//!
//! These helpers own the arena lifecycle: inputs are bound, the closure
//! builds the expression, one reverse sweep per output runs, and only plain
//! numbers come back.
//!
//! # Example
//!
//! ```
//! use agrad::gradient;
//!
//! // f(x, y) = x^2 y + y
//! let (fx, grad) = gradient(|x| x[0] * x[0] * x[1] + x[1], &[3.0, 2.0]).unwrap();
//! assert_eq!(fx, 20.0);
//! assert_eq!(grad, vec![12.0, 10.0]);
//! ```

use crate::backward::grad;
use crate::error::AdError;
use crate::graph::Arena;
use crate::var::Var;

/// Value and gradient of `f` at `x`, evaluated on a fresh arena.
///
/// # Errors
/// Returns [`AdError::ForeignHandle`] if `f` returns a variable that does
/// not live in the arena it was given.
pub fn gradient<F>(f: F, x: &[f64]) -> Result<(f64, Vec<f64>), AdError>
where
    F: for<'a> Fn(&[Var<'a>]) -> Var<'a>,
{
    let mut arena = Arena::new();
    gradient_in(&mut arena, f, x)
}

/// Value and gradient of `f` at `x`, reusing `arena`.
///
/// The arena is reset first, so repeated calls (an optimizer loop, say)
/// keep one allocation instead of growing a new one each time.
///
/// # Errors
/// Same as [`gradient`].
pub fn gradient_in<F>(arena: &mut Arena, f: F, x: &[f64]) -> Result<(f64, Vec<f64>), AdError>
where
    F: for<'a> Fn(&[Var<'a>]) -> Var<'a>,
{
    arena.reset();
    let arena = &*arena;
    let inputs = arena.vars(x);
    let output = f(&inputs);
    let grad = grad(&output, &inputs)?;
    Ok((output.val(), grad))
}

/// Values and Jacobian of a vector-valued `f` at `x`.
///
/// Each output is treated as an independent scalar: row `i` of the
/// Jacobian is the gradient of output `i`, from its own reverse sweep.
///
/// # Errors
/// Same as [`gradient`].
///
/// # Example
///
/// ```
/// use agrad::jacobian;
///
/// let (values, jac) = jacobian(|x| vec![x[0] * x[1], x[0] - x[1]], &[2.0, 5.0]).unwrap();
/// assert_eq!(values, vec![10.0, -3.0]);
/// assert_eq!(jac, vec![vec![5.0, 2.0], vec![1.0, -1.0]]);
/// ```
pub fn jacobian<F>(f: F, x: &[f64]) -> Result<(Vec<f64>, Vec<Vec<f64>>), AdError>
where
    F: for<'a> Fn(&[Var<'a>]) -> Vec<Var<'a>>,
{
    let arena = Arena::new();
    let inputs = arena.vars(x);
    let outputs = f(&inputs);

    let values = outputs.iter().map(Var::val).collect();
    let rows = outputs
        .iter()
        .map(|output| grad(output, &inputs))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((values, rows))
}
