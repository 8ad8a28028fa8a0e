//! Common test utilities.
//!
//! `RecordingBackend` wraps the in-memory backend, logging every call
//! and failing the operations a test arms, so tests can assert on call
//! order and on partial-failure behavior.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use stockwell::{
    BackendError, BackendResult, CreatePool, CreatePoolReceipt, GroupKind, InventoryBackend,
    InventoryRecord, MemoryBackend, Pool, PoolId, Product, ProductId, StockOverride,
};

/// An `InventoryBackend` spy: records calls, injects failures
pub struct RecordingBackend {
    inner: MemoryBackend,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            inner: MemoryBackend::new(),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn seed_products(&self, products: Vec<Product>) {
        self.inner.seed_products(products);
    }

    pub fn seed_inventory(&self, records: Vec<InventoryRecord>) {
        self.inner.seed_inventory(records);
    }

    pub fn override_ledger(&self) -> Vec<StockOverride> {
        self.inner.override_ledger()
    }

    /// Make every future call to `op` fail with `Unavailable`
    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls recorded for mutating operations only (reads filtered out)
    pub fn mutation_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("list_") && !c.starts_with("get_"))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn gate(&self, op: &'static str) -> BackendResult<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(BackendError::Unavailable(format!("injected failure in {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryBackend for RecordingBackend {
    async fn list_pools(&self) -> BackendResult<Vec<Pool>> {
        self.record("list_pools".into());
        self.gate("list_pools")?;
        self.inner.list_pools().await
    }

    async fn create_pool(&self, req: CreatePool) -> BackendResult<CreatePoolReceipt> {
        self.record(format!("create_pool {}", req.name));
        self.gate("create_pool")?;
        self.inner.create_pool(req).await
    }

    async fn rename_pool(&self, pool_id: PoolId, new_name: &str) -> BackendResult<()> {
        self.record(format!("rename_pool {pool_id} {new_name}"));
        self.gate("rename_pool")?;
        self.inner.rename_pool(pool_id, new_name).await
    }

    async fn set_pool_stock(&self, pool_id: PoolId, new_stock: f64) -> BackendResult<()> {
        self.record(format!("set_pool_stock {pool_id} {new_stock}"));
        self.gate("set_pool_stock")?;
        self.inner.set_pool_stock(pool_id, new_stock).await
    }

    async fn delete_pool(&self, pool_id: PoolId) -> BackendResult<()> {
        self.record(format!("delete_pool {pool_id}"));
        self.gate("delete_pool")?;
        self.inner.delete_pool(pool_id).await
    }

    async fn add_linked_product(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
        normalize_ratio: f64,
    ) -> BackendResult<()> {
        self.record(format!(
            "add_linked_product {pool_id} {product_id} {normalize_ratio}"
        ));
        self.gate("add_linked_product")?;
        self.inner
            .add_linked_product(pool_id, product_id, normalize_ratio)
            .await
    }

    async fn remove_linked_product(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
    ) -> BackendResult<()> {
        self.record(format!("remove_linked_product {pool_id} {product_id}"));
        self.gate("remove_linked_product")?;
        self.inner.remove_linked_product(pool_id, product_id).await
    }

    async fn list_products(&self) -> BackendResult<Vec<Product>> {
        self.record("list_products".into());
        self.gate("list_products")?;
        self.inner.list_products().await
    }

    async fn get_inventory(&self) -> BackendResult<Vec<InventoryRecord>> {
        self.record("get_inventory".into());
        self.gate("get_inventory")?;
        self.inner.get_inventory().await
    }

    async fn submit_stock_override(&self, req: &StockOverride) -> BackendResult<()> {
        self.record(format!(
            "submit_stock_override {} {}",
            req.product_id, req.field
        ));
        self.gate("submit_stock_override")?;
        self.inner.submit_stock_override(req).await
    }

    async fn reassign_product(
        &self,
        product_id: ProductId,
        kind: GroupKind,
        to_id: &str,
    ) -> BackendResult<()> {
        self.record(format!("reassign_product {product_id} {kind} {to_id}"));
        self.gate("reassign_product")?;
        self.inner.reassign_product(product_id, kind, to_id).await
    }
}

/// Seed one product with an inventory record, returning its ID
pub fn seeded_product(backend: &RecordingBackend, name: &str, stored: f64, active: f64) -> ProductId {
    let product = Product::new(name);
    let id = product.id;
    backend.seed_products(vec![product]);
    backend.seed_inventory(vec![InventoryRecord::new(id, stored, active)]);
    id
}
