//! Effective-pool resolution.
//!
//! A product's pool link may be expressed in several places at once:
//! an in-progress UI selection, token strings written by legacy
//! activation/shipment flows, the registry itself, and deprecated inline
//! fields on the product record. The resolver walks these as an explicit
//! ranked list of strategies, first non-empty answer wins.
//!
//! The registry scan is the only authoritative source. Token hints are
//! re-validated against it and decline once the registry links the
//! product, so a registered product always resolves to its registry pool
//! unless an explicit selection overrides it. Callers making a
//! destructive decision must use `require_authoritative` and fail loudly
//! rather than act on a hint.

mod strategy;
mod token;

pub use strategy::{
    ActivationToken, ExplicitSelection, LegacyFields, RegistryScan, ResolveStrategy,
    ShipmentToken,
};
pub use token::{parse_pool_token, TokenCodes};

use crate::catalog::{Product, ProductId};
use crate::pool::{PoolError, PoolId, PoolResult, RegistrySnapshot};

/// Ambient state a resolution runs against
pub struct ResolveContext<'a> {
    /// An explicit in-progress UI selection, if the user is choosing a
    /// target pool for an operation
    pub explicit_selection: Option<PoolId>,
    /// Registry snapshot; authoritative for link membership
    pub snapshot: &'a RegistrySnapshot,
    /// Operation-code whitelists for token parsing
    pub codes: &'a TokenCodes,
}

impl<'a> ResolveContext<'a> {
    pub fn new(snapshot: &'a RegistrySnapshot, codes: &'a TokenCodes) -> Self {
        Self {
            explicit_selection: None,
            snapshot,
            codes,
        }
    }

    pub fn with_selection(mut self, pool_id: PoolId) -> Self {
        self.explicit_selection = Some(pool_id);
        self
    }
}

/// Ranked strategy chain, first non-empty wins
pub struct LinkResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl LinkResolver {
    /// The standard chain: explicit selection, activation token, shipment
    /// token, registry scan, legacy fields
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(ExplicitSelection),
                Box::new(ActivationToken),
                Box::new(ShipmentToken),
                Box::new(RegistryScan),
                Box::new(LegacyFields),
            ],
        }
    }

    /// The single effective pool the product is currently associated
    /// with, for display purposes
    pub fn effective_pool(&self, product: &Product, ctx: &ResolveContext<'_>) -> Option<PoolId> {
        self.trace(product, ctx).map(|(id, _)| id)
    }

    /// Like `effective_pool`, also naming the strategy that answered
    pub fn trace(
        &self,
        product: &Product,
        ctx: &ResolveContext<'_>,
    ) -> Option<(PoolId, &'static str)> {
        self.strategies
            .iter()
            .find_map(|s| s.resolve(product, ctx).map(|id| (id, s.name())))
    }

    /// Registry-scan answer only — the source for decisions with real
    /// consequences (blocking a stored-stock edit, removing a link)
    pub fn authoritative_pool(
        product_id: &ProductId,
        snapshot: &RegistrySnapshot,
    ) -> Option<PoolId> {
        snapshot.pool_of(product_id).map(|p| p.id)
    }

    /// Authoritative resolution that fails loudly instead of guessing
    pub fn require_authoritative(
        product_id: &ProductId,
        snapshot: &RegistrySnapshot,
    ) -> PoolResult<PoolId> {
        Self::authoritative_pool(product_id, snapshot)
            .ok_or(PoolError::NoResolvablePool(*product_id))
    }
}

impl Default for LinkResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PoolHint;
    use crate::pool::{Pool, PoolLink};
    use chrono::Utc;

    fn snapshot_with(pools: Vec<Pool>) -> RegistrySnapshot {
        RegistrySnapshot {
            pools,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn explicit_selection_beats_everything() {
        let selected = PoolId::new();
        let token_pool = PoolId::new();
        let mut registry_pool = Pool::new("registry", 1.0);
        let product = Product::new("cola").with_activation_token(format!("ACT:{token_pool}"));
        registry_pool
            .linked_products
            .push(PoolLink::new(product.id, 1.0));

        let snapshot = snapshot_with(vec![registry_pool]);
        let codes = TokenCodes::default();
        let ctx = ResolveContext::new(&snapshot, &codes).with_selection(selected);

        let resolver = LinkResolver::new();
        assert_eq!(resolver.effective_pool(&product, &ctx), Some(selected));
    }

    #[test]
    fn registry_supersedes_token_hint() {
        // Without an explicit selection, a registry entry wins over a
        // token hint: the token is re-validated against ground truth.
        let token_pool = PoolId::new();
        let mut registry_pool = Pool::new("registry", 1.0);
        let product = Product::new("cola").with_activation_token(format!("ACT:{token_pool}"));
        registry_pool
            .linked_products
            .push(PoolLink::new(product.id, 1.0));
        let registry_id = registry_pool.id;

        let snapshot = snapshot_with(vec![registry_pool]);
        let codes = TokenCodes::default();
        let ctx = ResolveContext::new(&snapshot, &codes);

        let resolver = LinkResolver::new();
        let (id, source) = resolver.trace(&product, &ctx).unwrap();
        assert_eq!(id, registry_id);
        assert_eq!(source, "registry_scan");
    }

    #[test]
    fn token_answers_for_unregistered_product() {
        // A stale side-channel token is still useful when the registry
        // does not link the product at all.
        let token_pool = PoolId::new();
        let product = Product::new("cola").with_activation_token(format!("ACT:{token_pool}"));

        let snapshot = snapshot_with(vec![]);
        let codes = TokenCodes::default();
        let ctx = ResolveContext::new(&snapshot, &codes);

        let resolver = LinkResolver::new();
        let (id, source) = resolver.trace(&product, &ctx).unwrap();
        assert_eq!(id, token_pool);
        assert_eq!(source, "activation_token");
    }

    #[test]
    fn registry_beats_legacy_fields() {
        let legacy_pool = PoolId::new();
        let mut registry_pool = Pool::new("registry", 1.0);
        let product = Product::new("cola").with_pool_ref(PoolHint::Structured {
            pool_id: legacy_pool,
        });
        registry_pool
            .linked_products
            .push(PoolLink::new(product.id, 1.0));
        let registry_id = registry_pool.id;

        let snapshot = snapshot_with(vec![registry_pool]);
        let codes = TokenCodes::default();
        let ctx = ResolveContext::new(&snapshot, &codes);

        let resolver = LinkResolver::new();
        assert_eq!(resolver.effective_pool(&product, &ctx), Some(registry_id));
    }

    #[test]
    fn legacy_fields_are_last_resort() {
        let legacy_pool = PoolId::new();
        let product = Product::new("cola").with_pool_ref(PoolHint::Structured {
            pool_id: legacy_pool,
        });

        let snapshot = snapshot_with(vec![]);
        let codes = TokenCodes::default();
        let ctx = ResolveContext::new(&snapshot, &codes);

        let resolver = LinkResolver::new();
        let (id, source) = resolver.trace(&product, &ctx).unwrap();
        assert_eq!(id, legacy_pool);
        assert_eq!(source, "legacy_fields");
    }

    #[test]
    fn bare_legacy_string_matches_by_name() {
        let pool = Pool::new("bulk-cola", 1.0);
        let pool_id = pool.id;
        let product = Product::new("cola").with_pool_ref(PoolHint::Bare("bulk-cola".into()));

        let snapshot = snapshot_with(vec![pool]);
        let codes = TokenCodes::default();
        let ctx = ResolveContext::new(&snapshot, &codes);

        let resolver = LinkResolver::new();
        assert_eq!(resolver.effective_pool(&product, &ctx), Some(pool_id));
    }

    #[test]
    fn unresolvable_product_yields_none_and_loud_error() {
        let product = Product::new("cola");
        let snapshot = snapshot_with(vec![]);
        let codes = TokenCodes::default();
        let ctx = ResolveContext::new(&snapshot, &codes);

        let resolver = LinkResolver::new();
        assert_eq!(resolver.effective_pool(&product, &ctx), None);
        assert!(matches!(
            LinkResolver::require_authoritative(&product.id, &snapshot),
            Err(PoolError::NoResolvablePool(_))
        ));
    }
}
