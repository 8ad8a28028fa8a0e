//! Audited manual stock overrides.
//!
//! Every hand edit of a stock field travels through a per-attempt state
//! machine (`Editing -> AwaitingAudit -> Committing -> Committed | Rejected`)
//! and carries a mandatory audit payload. Stock fields derived from a pool
//! are refused before anything reaches the transport.

mod engine;

pub use engine::{OverrideDraft, OverridePhase, StockOverrideEngine};

use crate::catalog::{ProductId, StockField};
use crate::pool::PoolId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What kind of cause an override attributes the discrepancy to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseType {
    Employee,
    Operation,
}

impl CauseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Operation => "operation",
        }
    }
}

impl std::fmt::Display for CauseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CauseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employee" => Ok(Self::Employee),
            "operation" => Ok(Self::Operation),
            other => Err(format!("unknown cause type '{other}'")),
        }
    }
}

/// Timestamp pair bounding when the discrepancy arose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ErrorRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// The override payload as submitted to the remote ledger.
///
/// Carries `delta` (target minus before) rather than a raw absolute value
/// so the ledger can reconstruct a before/after trail independent of races
/// from concurrent editors. Ephemeral: not persisted locally beyond the
/// audit trail the remote keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockOverride {
    pub product_id: ProductId,
    pub field: StockField,
    pub before_value: f64,
    pub target_value: f64,
    pub delta: f64,
    pub explanation: String,
    pub cause_type: CauseType,
    pub category: String,
    pub error_range: ErrorRange,
}

/// Errors surfaced by the override engine
#[derive(Debug, Error)]
pub enum OverrideError {
    /// The field is derived from a pool and must not be hand-edited
    #[error("field {field} of product {product} is managed by pool {pool}")]
    FieldLockedByPool {
        product: ProductId,
        field: StockField,
        pool: PoolId,
    },

    #[error("no inventory record for product {0}")]
    NoInventoryRecord(ProductId),

    /// Raised locally, before any transport call
    #[error("audit payload incomplete, missing: {}", .missing.join(", "))]
    IncompleteAudit { missing: Vec<&'static str> },

    #[error("error range start {start} is after end {end}")]
    InvalidErrorRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("override attempt is in phase {actual}, expected {expected}")]
    InvalidPhase {
        expected: &'static str,
        actual: String,
    },

    /// Remote refusal, reason verbatim
    #[error("override rejected: {0}")]
    Rejected(String),
}

/// Result type for override operations
pub type OverrideResult<T> = Result<T, OverrideError>;
