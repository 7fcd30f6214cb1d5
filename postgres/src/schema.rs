//! Table creation and catalog seeding.

use crate::StorageError;
use loginapp_core::catalog::SEED_PRODUCTS;
use sqlx::PgPool;

/// Result of [`init_product_schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The table was empty and the reference rows were inserted
    Seeded(usize),
    /// The table already held this many rows; nothing was inserted
    AlreadyPopulated(i64),
}

/// Create the `users` table if it does not exist.
///
/// # Errors
///
/// Returns [`StorageError`] if the database is unreachable or the statement fails.
pub async fn init_user_schema(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMPTZ DEFAULT now()
        )
        ",
    )
    .execute(pool)
    .await?;

    tracing::info!("users table ready");
    Ok(())
}

/// Create the `products` table and seed it when empty.
///
/// Count and inserts share one transaction, so a failure part-way leaves the
/// table empty and the next attempt seeds from scratch.
///
/// # Errors
///
/// Returns [`StorageError`] if the database is unreachable or a statement fails.
pub async fn init_product_schema(pool: &PgPool) -> Result<SeedOutcome, StorageError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS products (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            price DECIMAL(10, 2) NOT NULL,
            stock INTEGER DEFAULT 0,
            category TEXT,
            created_at TIMESTAMPTZ DEFAULT now()
        )
        ",
    )
    .execute(pool)
    .await?;

    let mut tx = pool.begin().await?;

    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(&mut *tx)
        .await?;

    if existing > 0 {
        tx.commit().await?;
        tracing::info!(rows = existing, "products table already populated");
        return Ok(SeedOutcome::AlreadyPopulated(existing));
    }

    for product in &SEED_PRODUCTS {
        sqlx::query(
            r"
            INSERT INTO products (name, description, price, stock, category)
            VALUES ($1, $2, $3::numeric, $4, $5)
            ",
        )
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.category)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(rows = SEED_PRODUCTS.len(), "products table seeded");
    metrics::counter!("loginapp_catalog_seeded_rows_total").increment(SEED_PRODUCTS.len() as u64);

    Ok(SeedOutcome::Seeded(SEED_PRODUCTS.len()))
}
