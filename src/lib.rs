//! Stockwell: Inventory Consistency Engine
//!
//! The core of an inventory dashboard where several product SKUs can
//! share one floating stock balance (a "virtual stock pool") and every
//! manual stock edit is audited.
//!
//! # Core Concepts
//!
//! - **Pools**: a shared virtual stock balance; linked products derive
//!   their displayed stock through per-product normalize ratios
//! - **Links**: each product belongs to at most one pool; the registry
//!   is the only authoritative source for that relationship
//! - **Overrides**: manual stock edits carry a mandatory audit payload;
//!   pool-derived fields are read-only
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stockwell::{InventoryApi, MemoryBackend};
//!
//! # tokio_test::block_on(async {
//! let api = InventoryApi::new(Arc::new(MemoryBackend::new()));
//! api.sync().await.unwrap();
//! let pool = api.create_pool("bulk-cola", 120.0).await.unwrap();
//! assert_eq!(pool.virtual_stock, 120.0);
//! # });
//! ```

pub mod api;
pub mod backend;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod overrides;
pub mod pool;
pub mod resolver;

pub use api::InventoryApi;
pub use backend::{
    BackendError, BackendResult, CreatePool, CreatePoolReceipt, GroupKind, InventoryBackend,
    MemoryBackend, SqliteBackend,
};
pub use batch::{BatchFailure, BatchReport, BulkReassignment, GroupRef, ReassignError};
pub use catalog::{InventoryRecord, PoolHint, Product, ProductCatalog, ProductId, StockField};
pub use config::{Config, ConfigError};
pub use overrides::{
    CauseType, ErrorRange, OverrideDraft, OverrideError, OverridePhase, OverrideResult,
    StockOverride, StockOverrideEngine,
};
pub use pool::{
    LinkMutator, Pool, PoolError, PoolId, PoolLink, PoolRegistry, PoolResult, RegistrySnapshot,
};
pub use resolver::{LinkResolver, ResolveContext, ResolveStrategy, TokenCodes};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
