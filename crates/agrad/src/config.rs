//! Arena configuration.

use crate::error::AdError;

/// Node slots reserved up front by [`ArenaConfig::default`].
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Sizing policy for an [`Arena`](crate::Arena).
///
/// # Example
///
/// ```
/// use agrad::{Arena, ArenaConfig};
///
/// let config = ArenaConfig::default()
///     .with_initial_capacity(64)
///     .with_max_nodes(10_000);
/// let arena = Arena::with_config(config).unwrap();
/// assert!(arena.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Node slots reserved when the arena is created.
    pub initial_capacity: usize,
    /// Hard limit on live nodes; `None` lets the arena grow without bound.
    pub max_nodes: Option<usize>,
}

impl ArenaConfig {
    /// Set the number of node slots reserved at creation.
    #[must_use]
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Cap the arena at `max_nodes` live nodes.
    #[must_use]
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    /// Check that the reserved capacity fits under the node limit.
    ///
    /// # Errors
    /// Returns [`AdError::InvalidConfig`] when `initial_capacity` exceeds
    /// `max_nodes`.
    pub fn validate(&self) -> Result<(), AdError> {
        match self.max_nodes {
            Some(max) if self.initial_capacity > max => Err(AdError::InvalidConfig {
                message: format!(
                    "initial_capacity ({}) exceeds max_nodes ({max})",
                    self.initial_capacity
                ),
            }),
            _ => Ok(()),
        }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_nodes: None,
        }
    }
}
