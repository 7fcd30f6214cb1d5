//! `products` table repository.

use crate::store_error;
use loginapp_core::catalog::{Product, ProductCatalog};
use loginapp_core::users::{StoreError, StoreFuture};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Catalog backed by the `products` table.
///
/// Prices are selected as `price::text` so the decimal keeps its two digits
/// without going through a float.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_product(row: &PgRow) -> Result<Product, StoreError> {
        let column = |e: sqlx::Error| StoreError::Query(format!("Malformed product row: {e}"));
        Ok(Product {
            id: row.try_get("id").map_err(column)?,
            name: row.try_get("name").map_err(column)?,
            description: row.try_get("description").map_err(column)?,
            price: row.try_get("price").map_err(column)?,
            stock: row.try_get("stock").map_err(column)?,
            category: row.try_get("category").map_err(column)?,
            created_at: row.try_get("created_at").map_err(column)?,
        })
    }
}

impl ProductCatalog for PostgresCatalog {
    fn list(&self) -> StoreFuture<'_, Vec<Product>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT id, name, description, price::text AS price, stock, category,
                       COALESCE(created_at, now()) AS created_at
                FROM products
                ORDER BY created_at DESC, id DESC
                ",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error(&e))?;

            rows.iter().map(Self::row_to_product).collect()
        })
    }

    fn get(&self, id: i32) -> StoreFuture<'_, Option<Product>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT id, name, description, price::text AS price, stock, category,
                       COALESCE(created_at, now()) AS created_at
                FROM products
                WHERE id = $1
                ",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error(&e))?;

            row.as_ref().map(Self::row_to_product).transpose()
        })
    }
}
