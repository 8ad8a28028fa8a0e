//! Stockwell CLI — inventory consistency engine over a local store.
//!
//! Usage:
//!   stockwell pool <subcommand> [--db path]
//!   stockwell link <subcommand> [--db path]
//!   stockwell override submit ... [--db path]
//!   stockwell reassign <kind> <from> <to> <product>... [--db path]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use stockwell::{
    CauseType, Config, GroupKind, GroupRef, InventoryApi, InventoryRecord, PoolId, Product,
    ProductId, SqliteBackend, StockField,
};

#[derive(Parser)]
#[command(
    name = "stockwell",
    version,
    about = "Inventory consistency engine: virtual stock pools and audited overrides"
)]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage virtual stock pools
    Pool {
        #[command(subcommand)]
        action: PoolAction,
    },
    /// Manage product-to-pool links
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },
    /// Submit an audited stock override
    Override {
        #[command(subcommand)]
        action: OverrideAction,
    },
    /// Move every listed product from one grouping entity to another
    Reassign {
        /// Group kind: pool, type, or company
        kind: String,
        /// Source group (pool ID, or type/company name)
        from: String,
        /// Target group (pool ID, or type/company name)
        to: String,
        /// Member product IDs
        #[arg(required = true)]
        products: Vec<String>,
    },
    /// Manage seeded product/inventory records
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Show the effective pool a product resolves to
    Resolve {
        /// Product ID
        product: String,
        /// Simulate an explicit in-progress selection of this pool
        #[arg(long)]
        select: Option<String>,
    },
}

#[derive(Subcommand)]
enum PoolAction {
    /// Create a new empty pool
    Create { name: String, stock: f64 },
    /// List all pools
    List,
    /// Rename a pool
    Rename { pool: String, new_name: String },
    /// Set a pool's virtual stock balance
    SetStock { pool: String, stock: f64 },
    /// Delete a pool (refused while products are linked)
    Delete { pool: String },
}

#[derive(Subcommand)]
enum LinkAction {
    /// Link a product to a pool
    Add {
        pool: String,
        product: String,
        ratio: f64,
    },
    /// Unlink a product from a pool
    Remove { pool: String, product: String },
    /// Change a product's normalize ratio
    SetRatio {
        pool: String,
        product: String,
        ratio: f64,
    },
}

#[derive(Subcommand)]
enum OverrideAction {
    /// Validate and commit one stock override
    Submit {
        product: String,
        /// Stock field: stored or active
        field: String,
        target: f64,
        #[arg(long)]
        explanation: String,
        /// Cause type: employee or operation
        #[arg(long)]
        cause: String,
        #[arg(long)]
        category: String,
        /// Start of the discrepancy window (RFC 3339)
        #[arg(long)]
        from: String,
        /// End of the discrepancy window (RFC 3339)
        #[arg(long)]
        to: String,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Seed a product record
    Add {
        name: String,
        #[arg(long)]
        product_type: Option<String>,
        #[arg(long)]
        company: Option<String>,
    },
    /// List products with their effective pools
    List,
    /// Seed or replace a product's inventory record
    SetStock {
        product: String,
        stored: f64,
        active: f64,
    },
}

fn parse_pool_id(raw: &str) -> Result<PoolId, String> {
    PoolId::from_str(raw).map_err(|_| format!("'{raw}' is not a valid pool id"))
}

fn parse_product_id(raw: &str) -> Result<ProductId, String> {
    ProductId::from_str(raw).map_err(|_| format!("'{raw}' is not a valid product id"))
}

fn parse_field(raw: &str) -> Result<StockField, String> {
    match raw {
        "stored" | "stored_stock" => Ok(StockField::StoredStock),
        "active" | "active_stock" => Ok(StockField::ActiveStock),
        other => Err(format!("unknown stock field '{other}' (stored|active)")),
    }
}

fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, String> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| format!("'{raw}' is not an RFC 3339 timestamp: {e}"))
}

async fn cmd_pool(api: &InventoryApi, action: PoolAction) -> i32 {
    match action {
        PoolAction::Create { name, stock } => match api.create_pool(&name, stock).await {
            Ok(pool) => {
                println!("Created pool '{}' ({})", pool.name, pool.id);
                0
            }
            Err(e) => {
                eprintln!("Error: {e}");
                1
            }
        },
        PoolAction::List => {
            let pools = api.pools();
            if pools.is_empty() {
                println!("No pools defined.");
                return 0;
            }
            println!("{:<36}  {:<24}  {:>12}  {:>6}", "ID", "NAME", "STOCK", "LINKS");
            println!("{}", "-".repeat(84));
            for pool in pools {
                println!(
                    "{:<36}  {:<24}  {:>12.2}  {:>6}",
                    pool.id,
                    pool.name,
                    pool.virtual_stock,
                    pool.linked_products.len()
                );
            }
            0
        }
        PoolAction::Rename { pool, new_name } => {
            let pool = match parse_pool_id(&pool) {
                Ok(id) => id,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return 1;
                }
            };
            match api.rename_pool(pool, &new_name).await {
                Ok(()) => {
                    println!("Renamed pool to '{new_name}'");
                    0
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    1
                }
            }
        }
        PoolAction::SetStock { pool, stock } => {
            let pool = match parse_pool_id(&pool) {
                Ok(id) => id,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return 1;
                }
            };
            match api.set_pool_stock(pool, stock).await {
                Ok(()) => {
                    println!("Set virtual stock to {stock}");
                    0
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    1
                }
            }
        }
        PoolAction::Delete { pool } => {
            let pool = match parse_pool_id(&pool) {
                Ok(id) => id,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return 1;
                }
            };
            match api.delete_pool(pool).await {
                Ok(()) => {
                    println!("Deleted pool");
                    0
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    1
                }
            }
        }
    }
}

async fn cmd_link(api: &InventoryApi, action: LinkAction) -> i32 {
    let result = match action {
        LinkAction::Add {
            pool,
            product,
            ratio,
        } => match (parse_pool_id(&pool), parse_product_id(&product)) {
            (Ok(pool), Ok(product)) => api.link_product(pool, product, ratio).await,
            (Err(e), _) | (_, Err(e)) => {
                eprintln!("Error: {e}");
                return 1;
            }
        },
        LinkAction::Remove { pool, product } => {
            match (parse_pool_id(&pool), parse_product_id(&product)) {
                (Ok(pool), Ok(product)) => api.unlink_product(pool, product).await,
                (Err(e), _) | (_, Err(e)) => {
                    eprintln!("Error: {e}");
                    return 1;
                }
            }
        }
        LinkAction::SetRatio {
            pool,
            product,
            ratio,
        } => match (parse_pool_id(&pool), parse_product_id(&product)) {
            (Ok(pool), Ok(product)) => match api.set_ratio(pool, product, ratio).await {
                Err(stockwell::PoolError::RatioUpdatePartiallyFailed {
                    pool,
                    product,
                    old_ratio,
                    ..
                }) => {
                    eprintln!(
                        "Error: ratio update left product unlinked; \
                         restoring previous link at ratio {old_ratio}"
                    );
                    api.restore_link(pool, product, old_ratio).await
                }
                other => other,
            },
            (Err(e), _) | (_, Err(e)) => {
                eprintln!("Error: {e}");
                return 1;
            }
        },
    };
    match result {
        Ok(pool) => {
            println!(
                "Pool '{}' now links {} product(s)",
                pool.name,
                pool.linked_products.len()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

async fn cmd_override(api: &InventoryApi, action: OverrideAction) -> i32 {
    let OverrideAction::Submit {
        product,
        field,
        target,
        explanation,
        cause,
        category,
        from,
        to,
    } = action;

    let parsed = (|| -> Result<_, String> {
        Ok((
            parse_product_id(&product)?,
            parse_field(&field)?,
            CauseType::from_str(&cause)?,
            parse_timestamp(&from)?,
            parse_timestamp(&to)?,
        ))
    })();
    let (product, field, cause, start, end) = match parsed {
        Ok(values) => values,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    let mut draft = match api.begin_override(product, field).await {
        Ok(draft) => draft,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };
    draft.set_target(target);
    draft.set_explanation(explanation);
    draft.set_cause_type(cause);
    draft.set_category(category);
    draft.set_error_range(start, end);

    match api.submit_override(&mut draft).await {
        Ok(committed) => {
            println!(
                "Committed override on {}: {} -> {} (delta {:+})",
                committed.field, committed.before_value, committed.target_value, committed.delta
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

async fn cmd_reassign(
    api: &InventoryApi,
    kind: &str,
    from: &str,
    to: &str,
    products: &[String],
) -> i32 {
    let kind = match kind {
        "pool" => GroupKind::Pool,
        "type" => GroupKind::ProductType,
        "company" => GroupKind::Company,
        other => {
            eprintln!("Error: unknown group kind '{other}' (pool|type|company)");
            return 1;
        }
    };
    let (from, to) = if kind == GroupKind::Pool {
        match (parse_pool_id(from), parse_pool_id(to)) {
            (Ok(f), Ok(t)) => (GroupRef::Pool(f), GroupRef::Pool(t)),
            (Err(e), _) | (_, Err(e)) => {
                eprintln!("Error: {e}");
                return 1;
            }
        }
    } else {
        (
            GroupRef::Named(from.to_string()),
            GroupRef::Named(to.to_string()),
        )
    };
    let mut members = Vec::new();
    for raw in products {
        match parse_product_id(raw) {
            Ok(id) => members.push(id),
            Err(e) => {
                eprintln!("Error: {e}");
                return 1;
            }
        }
    }

    match api.bulk_reassign(kind, &from, &to, &members).await {
        Ok(report) => {
            println!("Succeeded: {}", report.succeeded);
            if !report.is_complete() {
                println!("Failed:");
                for failure in &report.failed {
                    println!("  {}  {}", failure.product_id, failure.error);
                }
                return 1;
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

async fn cmd_product(api: &InventoryApi, backend: &SqliteBackend, action: ProductAction) -> i32 {
    match action {
        ProductAction::Add {
            name,
            product_type,
            company,
        } => {
            let mut product = Product::new(name);
            product.product_type = product_type;
            product.company = company;
            let id = product.id;
            match backend.upsert_product(&product) {
                Ok(()) => {
                    println!("Added product '{}' ({})", product.name, id);
                    0
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    1
                }
            }
        }
        ProductAction::List => {
            if let Err(e) = api.sync().await {
                eprintln!("Error: {e}");
                return 1;
            }
            let products = api.products();
            if products.is_empty() {
                println!("No products defined.");
                return 0;
            }
            println!("{:<36}  {:<24}  {:<36}", "ID", "NAME", "EFFECTIVE POOL");
            println!("{}", "-".repeat(100));
            for product in products {
                let pool = api
                    .effective_pool(&product, None)
                    .map(|(id, _)| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<36}  {:<24}  {:<36}", product.id, product.name, pool);
            }
            0
        }
        ProductAction::SetStock {
            product,
            stored,
            active,
        } => {
            let product = match parse_product_id(&product) {
                Ok(id) => id,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return 1;
                }
            };
            match backend.upsert_inventory(&InventoryRecord::new(product, stored, active)) {
                Ok(()) => {
                    println!("Set inventory to stored={stored} active={active}");
                    0
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    1
                }
            }
        }
    }
}

async fn cmd_resolve(api: &InventoryApi, product: &str, select: Option<&str>) -> i32 {
    let product_id = match parse_product_id(product) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };
    let selection = match select.map(parse_pool_id).transpose() {
        Ok(sel) => sel,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };
    let product = match api.product(&product_id) {
        Some(p) => p,
        None => {
            eprintln!("Error: product {product_id} not found");
            return 1;
        }
    };
    match api.effective_pool(&product, selection) {
        Some((pool, source)) => {
            println!("{pool}  (via {source})");
            0
        }
        None => {
            println!("No pool resolves for '{}'", product.name);
            0
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = {
        let mut config = Config::load_or_default(cli.config.as_deref());
        if let Some(db) = cli.db {
            config.db_path = Some(db);
        }
        config
    };

    let backend = match SqliteBackend::open(config.resolve_db_path()) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            eprintln!("Error: failed to open database: {e}");
            std::process::exit(1);
        }
    };
    let api = InventoryApi::with_config(backend.clone(), &config);
    if let Err(e) = api.sync().await {
        eprintln!("Error: failed to load state: {e}");
        std::process::exit(1);
    }

    let code = match cli.command {
        Commands::Pool { action } => cmd_pool(&api, action).await,
        Commands::Link { action } => cmd_link(&api, action).await,
        Commands::Override { action } => cmd_override(&api, action).await,
        Commands::Reassign {
            kind,
            from,
            to,
            products,
        } => cmd_reassign(&api, &kind, &from, &to, &products).await,
        Commands::Product { action } => cmd_product(&api, &backend, action).await,
        Commands::Resolve { product, select } => {
            cmd_resolve(&api, &product, select.as_deref()).await
        }
    };
    std::process::exit(code);
}
