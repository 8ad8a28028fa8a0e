//! Virtual stock pool data shapes

use crate::catalog::ProductId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolId(Uuid);

impl PoolId {
    /// Create a new random PoolId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a PoolId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for PoolId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PoolId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One product's membership in a pool.
///
/// `normalize_ratio` converts pool virtual-stock units into the product's
/// displayed stock units (a 12-pack SKU sharing a bulk pool with a
/// single-unit SKU carries a different ratio). Strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolLink {
    pub product_id: ProductId,
    pub normalize_ratio: f64,
}

impl PoolLink {
    pub fn new(product_id: ProductId, normalize_ratio: f64) -> Self {
        Self {
            product_id,
            normalize_ratio,
        }
    }
}

/// A shared virtual stock balance referenced by one or more products.
///
/// `virtual_stock` is independent of any one linked product's displayed
/// stock; each linked product derives its stored stock through its ratio.
/// A product appears in at most one pool's `linked_products` at any time —
/// the registry is the only authoritative holder of that relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub name: String,
    pub virtual_stock: f64,
    /// Ordered; insertion order is preserved across refetches
    pub linked_products: Vec<PoolLink>,
}

impl Pool {
    /// Create a new empty pool
    pub fn new(name: impl Into<String>, virtual_stock: f64) -> Self {
        Self {
            id: PoolId::new(),
            name: name.into(),
            virtual_stock,
            linked_products: Vec::new(),
        }
    }

    /// Find the link entry for a product, if present
    pub fn link(&self, product_id: &ProductId) -> Option<&PoolLink> {
        self.linked_products
            .iter()
            .find(|l| l.product_id == *product_id)
    }

    /// Whether this pool links the given product
    pub fn links(&self, product_id: &ProductId) -> bool {
        self.link(product_id).is_some()
    }

    /// Displayed stock for one linked product: `virtual_stock * ratio`
    pub fn derived_stock(&self, product_id: &ProductId) -> Option<f64> {
        self.link(product_id)
            .map(|l| self.virtual_stock * l.normalize_ratio)
    }
}
