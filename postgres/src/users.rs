//! `users` table repository.

use crate::store_error;
use loginapp_core::users::{NewUser, StoreError, StoreFuture, User, UserStore};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const USER_COLUMNS: &str = "id, email, password_hash, COALESCE(created_at, now()) AS created_at";

/// Credential store backed by the `users` table.
#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &PgRow) -> Result<User, StoreError> {
        let column = |e: sqlx::Error| StoreError::Query(format!("Malformed user row: {e}"));
        Ok(User {
            id: row.try_get("id").map_err(column)?,
            email: row.try_get("email").map_err(column)?,
            password_hash: row.try_get("password_hash").map_err(column)?,
            created_at: row.try_get("created_at").map_err(column)?,
        })
    }

    async fn fetch_one_where(&self, clause: &str, bind: Bound<'_>) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
        let query = sqlx::query(&sql);
        let query = match bind {
            Bound::Email(email) => query.bind(email),
            Bound::Id(id) => query.bind(id),
        };
        let row = query.fetch_optional(&self.pool).await.map_err(|e| store_error(&e))?;
        row.as_ref().map(Self::row_to_user).transpose()
    }
}

enum Bound<'a> {
    Email(&'a str),
    Id(i32),
}

impl UserStore for PostgresUserStore {
    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(self.fetch_one_where("email = $1", Bound::Email(email)))
    }

    fn find_by_id(&self, id: i32) -> StoreFuture<'_, Option<User>> {
        Box::pin(self.fetch_one_where("id = $1", Bound::Id(id)))
    }

    fn create<'a>(&'a self, user: &'a NewUser) -> StoreFuture<'a, User> {
        Box::pin(async move {
            let sql = format!(
                "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
            );
            let row = sqlx::query(&sql)
                .bind(&user.email)
                .bind(&user.password_hash)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| match &e {
                    sqlx::Error::Database(db) if db.is_unique_violation() => {
                        StoreError::DuplicateEmail(user.email.clone())
                    }
                    _ => store_error(&e),
                })?;

            let created = Self::row_to_user(&row)?;
            tracing::info!(user_id = created.id, email = %created.email, "User created");
            metrics::counter!("loginapp_users_created_total").increment(1);
            Ok(created)
        })
    }
}
