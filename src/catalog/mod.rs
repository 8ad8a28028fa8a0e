//! Product catalog collaborator types and the local read cache.
//!
//! The catalog itself (CRUD screens, classification management) is an
//! external system. This module holds the shapes the consistency core
//! reads from it, plus a concurrent cache that is replaced wholesale on
//! every refetch. The only write the core performs against a cached
//! product is `note_pool_hint`, which reflects a linkage decision back
//! onto the copy so open views stay coherent until the next refetch.

use crate::pool::PoolId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(Uuid);

impl ProductId {
    /// Create a new random ProductId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ProductId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProductId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A cached pool reference found on a product record.
///
/// Old write paths recorded the link in several shapes: a structured
/// `{ pool_id }` object or a bare string. Whatever the shape, it is a
/// hint — the registry is the only authoritative source for links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PoolHint {
    /// Structured reference carrying the pool ID directly
    Structured { pool_id: PoolId },
    /// Bare string: either a pool ID or, in the oldest records, a pool name
    Bare(String),
}

/// A product record as read from the catalog.
///
/// Classification fields (`product_type`, `company`) matter to this core
/// only as guard conditions for bulk reassignment. The token fields are
/// side-channel strings written by legacy activation/shipment flows; they
/// may embed a pool reference (see the resolver).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub product_type: Option<String>,
    pub company: Option<String>,
    /// Cached pool reference, hint only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_ref: Option<PoolHint>,
    /// Deprecated alias field kept for records predating `pool_ref`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_pool_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipment_token: Option<String>,
}

impl Product {
    /// Create a new product with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            product_type: None,
            company: None,
            pool_ref: None,
            legacy_pool_alias: None,
            activation_token: None,
            shipment_token: None,
        }
    }

    pub fn with_type(mut self, product_type: impl Into<String>) -> Self {
        self.product_type = Some(product_type.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_pool_ref(mut self, hint: PoolHint) -> Self {
        self.pool_ref = Some(hint);
        self
    }

    pub fn with_activation_token(mut self, token: impl Into<String>) -> Self {
        self.activation_token = Some(token.into());
        self
    }

    pub fn with_shipment_token(mut self, token: impl Into<String>) -> Self {
        self.shipment_token = Some(token.into());
        self
    }
}

/// Which stock field of an inventory record an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockField {
    /// Physical/bulk stock; derived (read-only) while the product is pool-linked
    StoredStock,
    /// Stock released for use or sale; always manually overridable
    ActiveStock,
}

impl StockField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StoredStock => "stored_stock",
            Self::ActiveStock => "active_stock",
        }
    }
}

impl std::fmt::Display for StockField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-product stock levels as read from the inventory collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub stored_stock: f64,
    pub active_stock: f64,
}

impl InventoryRecord {
    pub fn new(product_id: ProductId, stored_stock: f64, active_stock: f64) -> Self {
        Self {
            product_id,
            stored_stock,
            active_stock,
        }
    }

    /// Read the value of one stock field
    pub fn get(&self, field: StockField) -> f64 {
        match field {
            StockField::StoredStock => self.stored_stock,
            StockField::ActiveStock => self.active_stock,
        }
    }

    /// Write the value of one stock field
    pub fn set(&mut self, field: StockField, value: f64) {
        match field {
            StockField::StoredStock => self.stored_stock = value,
            StockField::ActiveStock => self.active_stock = value,
        }
    }
}

/// Concurrent read cache for products and inventory records.
///
/// Both maps are replaced wholesale on refetch; reads clone out, so a
/// held `Product` never observes a later refetch.
#[derive(Debug, Default)]
pub struct ProductCatalog {
    products: DashMap<ProductId, Product>,
    inventory: DashMap<ProductId, InventoryRecord>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full product cache with a fresh fetch
    pub fn replace_products(&self, products: Vec<Product>) {
        self.products.clear();
        for product in products {
            self.products.insert(product.id, product);
        }
    }

    /// Replace the full inventory cache with a fresh fetch
    pub fn replace_inventory(&self, records: Vec<InventoryRecord>) {
        self.inventory.clear();
        for record in records {
            self.inventory.insert(record.product_id, record);
        }
    }

    pub fn product(&self, id: &ProductId) -> Option<Product> {
        self.products.get(id).map(|r| r.clone())
    }

    pub fn inventory(&self, id: &ProductId) -> Option<InventoryRecord> {
        self.inventory.get(id).map(|r| r.clone())
    }

    pub fn list_products(&self) -> Vec<Product> {
        self.products.iter().map(|r| r.clone()).collect()
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    /// Reflect a linkage decision onto the cached product record.
    ///
    /// `Some(pool_id)` writes a structured hint; `None` clears all hint
    /// shapes (including the deprecated alias). The hint is display
    /// convenience only and is overwritten by the next refetch.
    pub fn note_pool_hint(&self, id: &ProductId, pool: Option<PoolId>) {
        if let Some(mut entry) = self.products.get_mut(id) {
            match pool {
                Some(pool_id) => entry.pool_ref = Some(PoolHint::Structured { pool_id }),
                None => {
                    entry.pool_ref = None;
                    entry.legacy_pool_alias = None;
                }
            }
        }
    }

    /// Patch one stock field in place after a committed override.
    ///
    /// Optimistic: the remote accepted the delta, so the local copy is
    /// advanced without a re-read.
    pub fn patch_inventory(&self, id: &ProductId, field: StockField, value: f64) {
        if let Some(mut entry) = self.inventory.get_mut(id) {
            entry.set(field, value);
        }
    }
}
