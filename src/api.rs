//! Transport-independent API layer.
//!
//! `InventoryApi` is the single entry point for consumer-facing
//! operations. Frontends (the CLI, a future HTTP layer, direct
//! embedding) call `InventoryApi` methods — they never reach into
//! `PoolRegistry`, `LinkMutator`, or `StockOverrideEngine` directly.

use std::sync::Arc;

use crate::backend::{GroupKind, InventoryBackend};
use crate::batch::{BatchReport, BulkReassignment, GroupRef, ReassignError};
use crate::catalog::{InventoryRecord, Product, ProductCatalog, ProductId, StockField};
use crate::config::Config;
use crate::overrides::{OverrideDraft, OverrideResult, StockOverride, StockOverrideEngine};
use crate::pool::{LinkMutator, Pool, PoolId, PoolRegistry, PoolResult};
use crate::resolver::{LinkResolver, ResolveContext, TokenCodes};

/// Single entry point for all consumer-facing operations
pub struct InventoryApi {
    backend: Arc<dyn InventoryBackend>,
    registry: Arc<PoolRegistry>,
    catalog: Arc<ProductCatalog>,
    resolver: LinkResolver,
    mutator: LinkMutator,
    overrides: StockOverrideEngine,
    batch: BulkReassignment,
    codes: TokenCodes,
}

impl InventoryApi {
    /// Build an API over a backend with default configuration
    pub fn new(backend: Arc<dyn InventoryBackend>) -> Self {
        Self::with_config(backend, &Config::default())
    }

    /// Build an API over a backend with explicit configuration
    pub fn with_config(backend: Arc<dyn InventoryBackend>, config: &Config) -> Self {
        let registry = Arc::new(PoolRegistry::new(backend.clone()));
        let catalog = Arc::new(ProductCatalog::new());
        let overrides =
            StockOverrideEngine::new(backend.clone(), registry.clone(), catalog.clone());
        let batch = BulkReassignment::new(registry.clone(), catalog.clone())
            .with_max_batch(config.max_batch);
        Self {
            backend,
            mutator: LinkMutator::new(registry.clone()),
            registry,
            catalog,
            resolver: LinkResolver::new(),
            overrides,
            batch,
            codes: config.token_codes(),
        }
    }

    /// Refetch everything: registry snapshot, products, inventory.
    /// This is the only synchronization mechanism the core has.
    pub async fn sync(&self) -> PoolResult<()> {
        self.registry.refresh().await?;
        self.catalog
            .replace_products(self.backend.list_products().await?);
        self.catalog
            .replace_inventory(self.backend.get_inventory().await?);
        Ok(())
    }

    // --- Pool reads ---

    pub fn pools(&self) -> Vec<Pool> {
        self.registry.list()
    }

    pub fn pool(&self, pool_id: &PoolId) -> Option<Pool> {
        self.registry.snapshot().pool(pool_id).cloned()
    }

    // --- Pool writes ---

    pub async fn create_pool(&self, name: &str, initial_stock: f64) -> PoolResult<Pool> {
        self.registry.create(name, initial_stock).await
    }

    pub async fn rename_pool(&self, pool_id: PoolId, new_name: &str) -> PoolResult<()> {
        self.registry.rename(pool_id, new_name).await
    }

    pub async fn set_pool_stock(&self, pool_id: PoolId, new_stock: f64) -> PoolResult<()> {
        self.registry.set_virtual_stock(pool_id, new_stock).await
    }

    /// Delete a pool; refused while it still links products
    pub async fn delete_pool(&self, pool_id: PoolId) -> PoolResult<()> {
        self.registry.remove(pool_id).await
    }

    // --- Link operations ---

    pub async fn link_product(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
        normalize_ratio: f64,
    ) -> PoolResult<Pool> {
        let pool = self
            .mutator
            .add_link(pool_id, product_id, normalize_ratio)
            .await?;
        self.catalog.note_pool_hint(&product_id, Some(pool_id));
        Ok(pool)
    }

    pub async fn unlink_product(&self, pool_id: PoolId, product_id: ProductId) -> PoolResult<Pool> {
        let pool = self.mutator.remove_link(pool_id, product_id).await?;
        self.catalog.note_pool_hint(&product_id, None);
        Ok(pool)
    }

    /// Change a product's ratio (remove-then-add; see `LinkMutator`)
    pub async fn set_ratio(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
        new_ratio: f64,
    ) -> PoolResult<Pool> {
        self.mutator.update_ratio(pool_id, product_id, new_ratio).await
    }

    /// Compensation for a partially failed ratio update
    pub async fn restore_link(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
        old_ratio: f64,
    ) -> PoolResult<Pool> {
        self.mutator.restore_link(pool_id, product_id, old_ratio).await
    }

    pub async fn create_pool_and_link(
        &self,
        name: &str,
        initial_stock: f64,
        product_id: ProductId,
        normalize_ratio: f64,
    ) -> PoolResult<Pool> {
        let pool = self
            .mutator
            .create_pool_and_link(name, initial_stock, product_id, normalize_ratio)
            .await?;
        self.catalog.note_pool_hint(&product_id, Some(pool.id));
        Ok(pool)
    }

    // --- Resolution ---

    /// The effective pool for display, with the strategy that answered
    pub fn effective_pool(
        &self,
        product: &Product,
        explicit_selection: Option<PoolId>,
    ) -> Option<(PoolId, &'static str)> {
        let snapshot = self.registry.snapshot();
        let mut ctx = ResolveContext::new(&snapshot, &self.codes);
        ctx.explicit_selection = explicit_selection;
        self.resolver.trace(product, &ctx)
    }

    // --- Catalog reads ---

    pub fn products(&self) -> Vec<Product> {
        self.catalog.list_products()
    }

    pub fn product(&self, product_id: &ProductId) -> Option<Product> {
        self.catalog.product(product_id)
    }

    pub fn inventory(&self, product_id: &ProductId) -> Option<InventoryRecord> {
        self.catalog.inventory(product_id)
    }

    // --- Overrides ---

    pub async fn begin_override(
        &self,
        product_id: ProductId,
        field: StockField,
    ) -> OverrideResult<OverrideDraft> {
        self.overrides.begin(product_id, field).await
    }

    pub async fn submit_override(
        &self,
        draft: &mut OverrideDraft,
    ) -> OverrideResult<StockOverride> {
        self.overrides.submit(draft).await
    }

    // --- Bulk ---

    pub async fn bulk_reassign(
        &self,
        kind: GroupKind,
        from: &GroupRef,
        to: &GroupRef,
        members: &[ProductId],
    ) -> Result<BatchReport, ReassignError> {
        self.batch.move_all(kind, from, to, members).await
    }

    pub async fn ensure_deletable(
        &self,
        kind: GroupKind,
        group: &GroupRef,
    ) -> Result<(), ReassignError> {
        self.batch.ensure_deletable(kind, group).await
    }
}
