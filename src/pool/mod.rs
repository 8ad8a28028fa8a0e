//! Virtual stock pool engine: data shapes, registry, link mutation

mod mutator;
mod registry;
mod types;

pub use mutator::LinkMutator;
pub use registry::{PoolRegistry, RegistrySnapshot};
pub use types::{Pool, PoolId, PoolLink};

use crate::backend::BackendError;
use crate::catalog::ProductId;
use thiserror::Error;

/// Errors surfaced by pool and link operations.
///
/// Typed backend refusals (already linked, not linked, delete guard,
/// duplicate name) are lifted into their matching variants so callers see
/// the same error whether the refusal came from the local pre-check or
/// from the remote store.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("product {product} is already linked to pool {pool}")]
    AlreadyLinked { product: ProductId, pool: PoolId },

    #[error("product {product} is not linked to pool {pool}")]
    NotLinked { product: ProductId, pool: PoolId },

    #[error("pool {pool} still has {count} linked products")]
    HasLinkedProducts { pool: PoolId, count: usize },

    #[error("pool name '{0}' is already in use")]
    DuplicateName(String),

    #[error("pool not found: {0}")]
    PoolNotFound(PoolId),

    #[error("no pool link could be resolved for product {0}")]
    NoResolvablePool(ProductId),

    #[error("normalize ratio must be positive, got {0}")]
    InvalidRatio(f64),

    #[error("pool name must not be empty")]
    EmptyName,

    /// The remove half of a ratio update succeeded but the re-add failed:
    /// the product is now unlinked, not linked at the old ratio. The old
    /// ratio is carried so the caller can retry the add or restore the
    /// previous link (`LinkMutator::restore_link`).
    #[error(
        "ratio update on pool {pool} left product {product} unlinked \
         (old ratio {old_ratio}, attempted {attempted_ratio}): {source}"
    )]
    RatioUpdatePartiallyFailed {
        pool: PoolId,
        product: ProductId,
        old_ratio: f64,
        attempted_ratio: f64,
        #[source]
        source: Box<BackendError>,
    },

    /// The create call did not echo a pool ID and the refetch-by-name
    /// fallback found no match
    #[error("created pool '{0}' but could not resolve its identifier")]
    CreatedPoolUnresolvable(String),

    #[error(transparent)]
    Backend(BackendError),
}

impl From<BackendError> for PoolError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::AlreadyLinked { product, pool } => {
                Self::AlreadyLinked { product, pool }
            }
            BackendError::NotLinked { product, pool } => Self::NotLinked { product, pool },
            BackendError::HasLinkedProducts { pool, count } => {
                Self::HasLinkedProducts { pool, count }
            }
            BackendError::DuplicateName(name) => Self::DuplicateName(name),
            BackendError::PoolNotFound(pool) => Self::PoolNotFound(pool),
            other => Self::Backend(other),
        }
    }
}

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;
