//! Resolver strategies — the contract each link-evidence source implements
//!
//! A strategy inspects one place a pool reference might live and returns
//! `Option<PoolId>`. Strategies are composed by the `LinkResolver` in a
//! fixed priority order; each is testable in isolation.

use super::token::parse_pool_token;
use super::ResolveContext;
use crate::catalog::{PoolHint, Product};
use crate::pool::PoolId;

/// One source of evidence for which pool a product is linked to
pub trait ResolveStrategy: Send + Sync {
    /// Stable identifier, used in the resolution trace
    fn name(&self) -> &'static str;

    /// Attempt to resolve a pool reference for the product
    fn resolve(&self, product: &Product, ctx: &ResolveContext<'_>) -> Option<PoolId>;
}

/// Priority 1: an in-progress UI selection — the user is actively
/// choosing a target pool for an operation
pub struct ExplicitSelection;

impl ResolveStrategy for ExplicitSelection {
    fn name(&self) -> &'static str {
        "explicit_selection"
    }

    fn resolve(&self, _product: &Product, ctx: &ResolveContext<'_>) -> Option<PoolId> {
        ctx.explicit_selection
    }
}

/// A token hint is re-validated against the registry: once the registry
/// links the product anywhere, its answer supersedes the side-channel
/// string, so the token strategies decline and let the scan answer.
fn registry_knows(product: &Product, ctx: &ResolveContext<'_>) -> bool {
    ctx.snapshot.pool_of(&product.id).is_some()
}

/// Priority 2: pool reference embedded in the activation-flow token
pub struct ActivationToken;

impl ResolveStrategy for ActivationToken {
    fn name(&self) -> &'static str {
        "activation_token"
    }

    fn resolve(&self, product: &Product, ctx: &ResolveContext<'_>) -> Option<PoolId> {
        if registry_knows(product, ctx) {
            return None;
        }
        product
            .activation_token
            .as_deref()
            .and_then(|t| parse_pool_token(t, &ctx.codes.activation))
    }
}

/// Priority 3: pool reference embedded in the shipment-flow token
pub struct ShipmentToken;

impl ResolveStrategy for ShipmentToken {
    fn name(&self) -> &'static str {
        "shipment_token"
    }

    fn resolve(&self, product: &Product, ctx: &ResolveContext<'_>) -> Option<PoolId> {
        if registry_knows(product, ctx) {
            return None;
        }
        product
            .shipment_token
            .as_deref()
            .and_then(|t| parse_pool_token(t, &ctx.codes.shipment))
    }
}

/// Priority 4: linear scan of the registry snapshot — the authoritative
/// source, preferred for any decision with real consequences
pub struct RegistryScan;

impl ResolveStrategy for RegistryScan {
    fn name(&self) -> &'static str {
        "registry_scan"
    }

    fn resolve(&self, product: &Product, ctx: &ResolveContext<'_>) -> Option<PoolId> {
        ctx.snapshot.pool_of(&product.id).map(|p| p.id)
    }
}

/// Priority 5: legacy inline fields on the product record, last resort
/// for records predating the registry
pub struct LegacyFields;

impl LegacyFields {
    /// A bare legacy string may be a pool ID or, in the oldest records,
    /// a pool name
    fn from_bare(raw: &str, ctx: &ResolveContext<'_>) -> Option<PoolId> {
        raw.trim()
            .parse()
            .ok()
            .or_else(|| ctx.snapshot.pool_by_name(raw.trim()).map(|p| p.id))
    }
}

impl ResolveStrategy for LegacyFields {
    fn name(&self) -> &'static str {
        "legacy_fields"
    }

    fn resolve(&self, product: &Product, ctx: &ResolveContext<'_>) -> Option<PoolId> {
        match &product.pool_ref {
            Some(PoolHint::Structured { pool_id }) => return Some(*pool_id),
            Some(PoolHint::Bare(raw)) => {
                if let Some(id) = Self::from_bare(raw, ctx) {
                    return Some(id);
                }
            }
            None => {}
        }
        product
            .legacy_pool_alias
            .as_deref()
            .and_then(|raw| Self::from_bare(raw, ctx))
    }
}
