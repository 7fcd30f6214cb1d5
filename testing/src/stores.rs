//! In-memory credential and catalog stores.

use chrono::{DateTime, Utc};
use loginapp_core::catalog::{Product, ProductCatalog, SEED_PRODUCTS};
use loginapp_core::users::{NewUser, StoreError, StoreFuture, User, UserStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Credential store backed by a vector.
///
/// Call [`set_unavailable`](Self::set_unavailable) to make every operation fail
/// like an unreachable database.
pub struct InMemoryUserStore {
    users: Mutex<Vec<User>>,
    created_at: DateTime<Utc>,
    unavailable: AtomicBool,
}

impl InMemoryUserStore {
    /// Empty store stamping rows with `created_at`.
    #[must_use]
    pub const fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            created_at,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Toggle simulated unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove every user (simulates a user deleted after login).
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<User>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.lock().iter().find(|u| u.email == email).cloned())
        })
    }

    fn find_by_id(&self, id: i32) -> StoreFuture<'_, Option<User>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.lock().iter().find(|u| u.id == id).cloned())
        })
    }

    fn create<'a>(&'a self, user: &'a NewUser) -> StoreFuture<'a, User> {
        Box::pin(async move {
            self.check()?;
            let mut users = self.lock();
            if users.iter().any(|u| u.email == user.email) {
                return Err(StoreError::DuplicateEmail(user.email.clone()));
            }
            let id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
            let created = User {
                id,
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                created_at: self.created_at,
            };
            users.push(created.clone());
            Ok(created)
        })
    }
}

/// Catalog seeded with the reference products.
pub struct InMemoryCatalog {
    products: Vec<Product>,
    unavailable: AtomicBool,
}

impl InMemoryCatalog {
    /// Catalog holding the fifteen reference products, all created at `created_at`.
    #[must_use]
    pub fn seeded(created_at: DateTime<Utc>) -> Self {
        let products = SEED_PRODUCTS
            .iter()
            .zip(1..)
            .map(|(seed, id)| Product {
                id,
                name: seed.name.to_string(),
                description: Some(seed.description.to_string()),
                price: seed.price.to_string(),
                stock: Some(seed.stock),
                category: Some(seed.category.to_string()),
                created_at,
            })
            .collect();
        Self {
            products,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Toggle simulated unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory catalog marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn list(&self) -> StoreFuture<'_, Vec<Product>> {
        Box::pin(async move {
            self.check()?;
            let mut products = self.products.clone();
            products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(products)
        })
    }

    fn get(&self, id: i32) -> StoreFuture<'_, Option<Product>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.products.iter().find(|p| p.id == id).cloned())
        })
    }
}
