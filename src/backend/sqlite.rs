//! SQLite backend.
//!
//! Durable stand-in for the remote inventory store, used by the CLI.
//! Single database file, thread-safe via an internal mutex on the
//! connection. Enforces the same invariants as the remote contract:
//! unique pool names, single-link (also backed by a UNIQUE constraint on
//! `pool_links.product_id`), and the deletion guard.

use super::traits::{
    BackendError, BackendResult, CreatePool, CreatePoolReceipt, GroupKind, InventoryBackend,
};
use crate::catalog::{InventoryRecord, PoolHint, Product, ProductId, StockField};
use crate::overrides::{CauseType, ErrorRange, StockOverride};
use crate::pool::{Pool, PoolId, PoolLink};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed inventory store
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing)
    pub fn open_in_memory() -> BackendResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> BackendResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pools (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                virtual_stock REAL NOT NULL
            );

            -- product_id is globally unique: a product links to at most one pool
            CREATE TABLE IF NOT EXISTS pool_links (
                pool_id TEXT NOT NULL,
                product_id TEXT NOT NULL UNIQUE,
                normalize_ratio REAL NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (pool_id, product_id),
                FOREIGN KEY (pool_id) REFERENCES pools(id)
            );

            CREATE INDEX IF NOT EXISTS idx_pool_links_pool
                ON pool_links(pool_id, position);

            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                product_type TEXT,
                company TEXT,
                pool_ref_json TEXT,
                legacy_pool_alias TEXT,
                activation_token TEXT,
                shipment_token TEXT
            );

            CREATE TABLE IF NOT EXISTS inventory (
                product_id TEXT PRIMARY KEY,
                stored_stock REAL NOT NULL,
                active_stock REAL NOT NULL
            );

            -- Append-only audit ledger for manual stock overrides
            CREATE TABLE IF NOT EXISTS stock_overrides (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id TEXT NOT NULL,
                field TEXT NOT NULL,
                before_value REAL NOT NULL,
                target_value REAL NOT NULL,
                delta REAL NOT NULL,
                explanation TEXT NOT NULL,
                cause_type TEXT NOT NULL,
                category TEXT NOT NULL,
                range_start TEXT NOT NULL,
                range_end TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    /// Insert or replace a product record (catalog seeding; the real
    /// catalog screens are a separate system)
    pub fn upsert_product(&self, product: &Product) -> BackendResult<()> {
        let conn = self.conn.lock().unwrap();
        let pool_ref_json = product
            .pool_ref
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        conn.execute(
            "INSERT OR REPLACE INTO products
             (id, name, product_type, company, pool_ref_json, legacy_pool_alias,
              activation_token, shipment_token)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                product.id.to_string(),
                product.name,
                product.product_type,
                product.company,
                pool_ref_json,
                product.legacy_pool_alias,
                product.activation_token,
                product.shipment_token,
            ],
        )?;
        Ok(())
    }

    /// Insert or replace an inventory record
    pub fn upsert_inventory(&self, record: &InventoryRecord) -> BackendResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO inventory (product_id, stored_stock, active_stock)
             VALUES (?1, ?2, ?3)",
            params![
                record.product_id.to_string(),
                record.stored_stock,
                record.active_stock
            ],
        )?;
        Ok(())
    }

    /// Number of override ledger entries (inspection/reporting)
    pub fn override_count(&self) -> BackendResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM stock_overrides", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    fn parse_pool_id(raw: &str) -> BackendResult<PoolId> {
        raw.parse()
            .map_err(|_| BackendError::Corrupt(format!("bad pool id '{raw}'")))
    }

    fn parse_product_id(raw: &str) -> BackendResult<ProductId> {
        raw.parse()
            .map_err(|_| BackendError::Corrupt(format!("bad product id '{raw}'")))
    }

    fn load_links(conn: &Connection, pool_id: &str) -> BackendResult<Vec<PoolLink>> {
        let mut stmt = conn.prepare(
            "SELECT product_id, normalize_ratio FROM pool_links
             WHERE pool_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![pool_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        let mut links = Vec::new();
        for row in rows {
            let (raw_id, ratio) = row?;
            links.push(PoolLink::new(Self::parse_product_id(&raw_id)?, ratio));
        }
        Ok(links)
    }

    /// Which pool currently links this product, if any
    fn link_owner(conn: &Connection, product_id: &ProductId) -> BackendResult<Option<PoolId>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT pool_id FROM pool_links WHERE product_id = ?1",
                params![product_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|r| Self::parse_pool_id(&r)).transpose()
    }

    fn pool_exists(conn: &Connection, pool_id: PoolId) -> BackendResult<()> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM pools WHERE id = ?1",
                params![pool_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        found.map(|_| ()).ok_or(BackendError::PoolNotFound(pool_id))
    }
}

#[async_trait]
impl InventoryBackend for SqliteBackend {
    async fn list_pools(&self) -> BackendResult<Vec<Pool>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, name, virtual_stock FROM pools ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;
        let mut pools = Vec::new();
        for row in rows {
            let (raw_id, name, virtual_stock) = row?;
            let linked_products = Self::load_links(&conn, &raw_id)?;
            pools.push(Pool {
                id: Self::parse_pool_id(&raw_id)?,
                name,
                virtual_stock,
                linked_products,
            });
        }
        Ok(pools)
    }

    async fn create_pool(&self, req: CreatePool) -> BackendResult<CreatePoolReceipt> {
        let mut guard = self.conn.lock().unwrap();
        let tx = guard.transaction()?;
        if req.name.trim().is_empty() {
            return Err(BackendError::Rejected("pool name must not be empty".into()));
        }
        let duplicate: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM pools WHERE name = ?1",
                params![req.name],
                |row| row.get(0),
            )
            .optional()?;
        if duplicate.is_some() {
            return Err(BackendError::DuplicateName(req.name));
        }
        let pool_id = PoolId::new();
        tx.execute(
            "INSERT INTO pools (id, name, virtual_stock) VALUES (?1, ?2, ?3)",
            params![pool_id.to_string(), req.name, req.initial_stock],
        )?;
        if let Some(product_id) = req.seed_product {
            if let Some(owner) = Self::link_owner(&tx, &product_id)? {
                return Err(BackendError::AlreadyLinked {
                    product: product_id,
                    pool: owner,
                });
            }
            let ratio = req.seed_ratio.unwrap_or(1.0);
            if ratio <= 0.0 {
                return Err(BackendError::Rejected(format!(
                    "normalize ratio must be positive, got {ratio}"
                )));
            }
            tx.execute(
                "INSERT INTO pool_links (pool_id, product_id, normalize_ratio, position)
                 VALUES (?1, ?2, ?3, 0)",
                params![pool_id.to_string(), product_id.to_string(), ratio],
            )?;
        }
        tx.commit()?;
        Ok(CreatePoolReceipt {
            pool_id: Some(pool_id),
        })
    }

    async fn rename_pool(&self, pool_id: PoolId, new_name: &str) -> BackendResult<()> {
        let conn = self.conn.lock().unwrap();
        let duplicate: Option<String> = conn
            .query_row(
                "SELECT id FROM pools WHERE name = ?1",
                params![new_name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(raw) = duplicate {
            if Self::parse_pool_id(&raw)? != pool_id {
                return Err(BackendError::DuplicateName(new_name.to_string()));
            }
        }
        let updated = conn.execute(
            "UPDATE pools SET name = ?1 WHERE id = ?2",
            params![new_name, pool_id.to_string()],
        )?;
        if updated == 0 {
            return Err(BackendError::PoolNotFound(pool_id));
        }
        Ok(())
    }

    async fn set_pool_stock(&self, pool_id: PoolId, new_stock: f64) -> BackendResult<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE pools SET virtual_stock = ?1 WHERE id = ?2",
            params![new_stock, pool_id.to_string()],
        )?;
        if updated == 0 {
            return Err(BackendError::PoolNotFound(pool_id));
        }
        Ok(())
    }

    async fn delete_pool(&self, pool_id: PoolId) -> BackendResult<()> {
        let conn = self.conn.lock().unwrap();
        Self::pool_exists(&conn, pool_id)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pool_links WHERE pool_id = ?1",
            params![pool_id.to_string()],
            |row| row.get(0),
        )?;
        if count > 0 {
            return Err(BackendError::HasLinkedProducts {
                pool: pool_id,
                count: count as usize,
            });
        }
        conn.execute(
            "DELETE FROM pools WHERE id = ?1",
            params![pool_id.to_string()],
        )?;
        Ok(())
    }

    async fn add_linked_product(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
        normalize_ratio: f64,
    ) -> BackendResult<()> {
        let conn = self.conn.lock().unwrap();
        if normalize_ratio <= 0.0 {
            return Err(BackendError::Rejected(format!(
                "normalize ratio must be positive, got {normalize_ratio}"
            )));
        }
        Self::pool_exists(&conn, pool_id)?;
        if let Some(owner) = Self::link_owner(&conn, &product_id)? {
            return Err(BackendError::AlreadyLinked {
                product: product_id,
                pool: owner,
            });
        }
        conn.execute(
            "INSERT INTO pool_links (pool_id, product_id, normalize_ratio, position)
             VALUES (?1, ?2, ?3,
                     (SELECT COALESCE(MAX(position), -1) + 1 FROM pool_links WHERE pool_id = ?1))",
            params![
                pool_id.to_string(),
                product_id.to_string(),
                normalize_ratio
            ],
        )?;
        Ok(())
    }

    async fn remove_linked_product(
        &self,
        pool_id: PoolId,
        product_id: ProductId,
    ) -> BackendResult<()> {
        let conn = self.conn.lock().unwrap();
        Self::pool_exists(&conn, pool_id)?;
        let removed = conn.execute(
            "DELETE FROM pool_links WHERE pool_id = ?1 AND product_id = ?2",
            params![pool_id.to_string(), product_id.to_string()],
        )?;
        if removed == 0 {
            return Err(BackendError::NotLinked {
                product: product_id,
                pool: pool_id,
            });
        }
        Ok(())
    }

    async fn list_products(&self) -> BackendResult<Vec<Product>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, product_type, company, pool_ref_json, legacy_pool_alias,
                    activation_token, shipment_token
             FROM products ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })?;
        let mut products = Vec::new();
        for row in rows {
            let (raw_id, name, product_type, company, pool_ref_json, alias, act, shp) = row?;
            let pool_ref: Option<PoolHint> = pool_ref_json
                .map(|json| serde_json::from_str(&json))
                .transpose()?;
            products.push(Product {
                id: Self::parse_product_id(&raw_id)?,
                name,
                product_type,
                company,
                pool_ref,
                legacy_pool_alias: alias,
                activation_token: act,
                shipment_token: shp,
            });
        }
        Ok(products)
    }

    async fn get_inventory(&self) -> BackendResult<Vec<InventoryRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT product_id, stored_stock, active_stock FROM inventory")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;
        let mut records = Vec::new();
        for row in rows {
            let (raw_id, stored, active) = row?;
            records.push(InventoryRecord::new(
                Self::parse_product_id(&raw_id)?,
                stored,
                active,
            ));
        }
        Ok(records)
    }

    async fn submit_stock_override(&self, req: &StockOverride) -> BackendResult<()> {
        let mut guard = self.conn.lock().unwrap();
        let tx = guard.transaction()?;
        let updated = tx.execute(
            &format!(
                "UPDATE inventory SET {} = {} + ?1 WHERE product_id = ?2",
                req.field.as_str(),
                req.field.as_str()
            ),
            params![req.delta, req.product_id.to_string()],
        )?;
        if updated == 0 {
            return Err(BackendError::ProductNotFound(req.product_id));
        }
        tx.execute(
            "INSERT INTO stock_overrides
             (product_id, field, before_value, target_value, delta, explanation,
              cause_type, category, range_start, range_end, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                req.product_id.to_string(),
                req.field.as_str(),
                req.before_value,
                req.target_value,
                req.delta,
                req.explanation,
                req.cause_type.as_str(),
                req.category,
                req.error_range.start.to_rfc3339(),
                req.error_range.end.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn reassign_product(
        &self,
        product_id: ProductId,
        kind: GroupKind,
        to_id: &str,
    ) -> BackendResult<()> {
        let conn = self.conn.lock().unwrap();
        let column = match kind {
            GroupKind::ProductType => "product_type",
            GroupKind::Company => "company",
            GroupKind::Pool => {
                return Err(BackendError::Rejected(
                    "pool reassignment goes through the link primitives".into(),
                ))
            }
        };
        let updated = conn.execute(
            &format!("UPDATE products SET {column} = ?1 WHERE id = ?2"),
            params![to_id, product_id.to_string()],
        )?;
        if updated == 0 {
            return Err(BackendError::ProductNotFound(product_id));
        }
        Ok(())
    }
}

/// Read back the most recent ledger rows (reporting/debugging)
impl SqliteBackend {
    pub fn recent_overrides(&self, limit: usize) -> BackendResult<Vec<StockOverride>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT product_id, field, before_value, target_value, delta, explanation,
                    cause_type, category, range_start, range_end
             FROM stock_overrides ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?;
        let mut overrides = Vec::new();
        for row in rows {
            let (raw_id, field, before, target, delta, explanation, cause, category, start, end) =
                row?;
            let field = match field.as_str() {
                "stored_stock" => StockField::StoredStock,
                "active_stock" => StockField::ActiveStock,
                other => return Err(BackendError::Corrupt(format!("bad field '{other}'"))),
            };
            let cause_type: CauseType = cause
                .parse()
                .map_err(|e: String| BackendError::Corrupt(e))?;
            let parse_ts = |raw: &str| -> BackendResult<DateTime<Utc>> {
                DateTime::parse_from_rfc3339(raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| BackendError::Corrupt(format!("bad timestamp '{raw}': {e}")))
            };
            overrides.push(StockOverride {
                product_id: Self::parse_product_id(&raw_id)?,
                field,
                before_value: before,
                target_value: target,
                delta,
                explanation,
                cause_type,
                category,
                error_range: ErrorRange::new(parse_ts(&start)?, parse_ts(&end)?),
            });
        }
        Ok(overrides)
    }
}
