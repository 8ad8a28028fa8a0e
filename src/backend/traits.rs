//! Backend trait definitions.
//!
//! `InventoryBackend` is the transport-agnostic contract against the
//! remote store. The core never trusts its own snapshots across a
//! mutation: every successful write is followed by a full refetch
//! through this trait.

use crate::catalog::{InventoryRecord, Product, ProductId};
use crate::overrides::StockOverride;
use crate::pool::{Pool, PoolId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during backend operations
#[derive(Debug, Error)]
pub enum BackendError {
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

    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Remote validation failure, reason verbatim
    #[error("rejected: {0}")]
    Rejected(String),

    /// Transport failure (timeout handling belongs to the transport; this
    /// is the result-or-error shape the core sees)
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Which grouping entity a reassignment or deletion guard targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Pool,
    ProductType,
    Company,
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pool => f.write_str("pool"),
            Self::ProductType => f.write_str("product_type"),
            Self::Company => f.write_str("company"),
        }
    }
}

/// Request shape for pool creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePool {
    pub name: String,
    pub initial_stock: f64,
    /// Optional seed link created together with the pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_product: Option<ProductId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_ratio: Option<f64>,
}

/// What a create call echoes back.
///
/// Some stores do not return the new identifier; callers then fall back
/// to refetching the registry and matching by name (see `LinkMutator`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePoolReceipt {
    pub pool_id: Option<PoolId>,
}

/// Trait for remote inventory stores.
///
/// Implementations must be thread-safe (Send + Sync). Mutations either
/// complete or fail; there is no mid-call cancellation.
#[async_trait]
pub trait InventoryBackend: Send + Sync {
    // === Pool operations ===

    /// List all pools with their links (the authoritative link source)
    async fn list_pools(&self) -> BackendResult<Vec<Pool>>;

    /// Create a pool, optionally with one seed link.
    /// Names are unique; fails with `DuplicateName` otherwise.
    async fn create_pool(&self, req: CreatePool) -> BackendResult<CreatePoolReceipt>;

    /// Rename a pool
    async fn rename_pool(&self, pool_id: PoolId, new_name: &str) -> BackendResult<()>;

    /// Set a pool's virtual stock balance
    async fn set_pool_stock(&self, pool_id: PoolId, new_stock: f64) -> BackendResult<()>;

    /// Delete a pool; fails with `HasLinkedProducts` while links remain
    async fn delete_pool(&self, pool_id: PoolId) -> BackendResult<()>;

    // === Link primitives ===

    /// Append a product link; fails with `AlreadyLinked` if the product is
    /// linked anywhere (single-link invariant)
    async fn add_linked_product(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
        normalize_ratio: f64,
    ) -> BackendResult<()>;

    /// Remove a product link; fails with `NotLinked` if absent
    async fn remove_linked_product(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
    ) -> BackendResult<()>;

    // === Collaborator reads ===

    /// List product records (read-only collaborator call)
    async fn list_products(&self) -> BackendResult<Vec<Product>>;

    /// List inventory records (read-only collaborator call)
    async fn get_inventory(&self) -> BackendResult<Vec<InventoryRecord>>;

    // === Overrides & grouping ===

    /// Commit a stock override to the audit ledger
    async fn submit_stock_override(&self, req: &StockOverride) -> BackendResult<()>;

    /// Move one product to another type/company grouping. Pool moves go
    /// through the link primitives instead.
    async fn reassign_product(
        &self,
        product_id: ProductId,
        kind: GroupKind,
        to_id: &str,
    ) -> BackendResult<()>;
}
