//! Product catalog types and the fifteen reference rows seeded into an empty store.

use crate::users::StoreFuture;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog item.
///
/// `price` is the decimal rendered as text (`"1299.99"`), matching how the
/// `DECIMAL(10, 2)` column is read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Database id
    pub id: i32,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// Decimal price as text
    pub price: String,
    /// Units in stock
    pub stock: Option<i32>,
    /// Category label
    pub category: Option<String>,
    /// Row creation time
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A row inserted when the catalog is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductSeed {
    /// Display name
    pub name: &'static str,
    /// Free-text description
    pub description: &'static str,
    /// Decimal price as text
    pub price: &'static str,
    /// Units in stock
    pub stock: i32,
    /// Category label
    pub category: &'static str,
}

const fn seed(
    name: &'static str,
    description: &'static str,
    price: &'static str,
    stock: i32,
    category: &'static str,
) -> ProductSeed {
    ProductSeed { name, description, price, stock, category }
}

/// Reference data for an empty catalog.
pub const SEED_PRODUCTS: [ProductSeed; 15] = [
    seed("Laptop Pro 15", "High-performance laptop with 16GB RAM and 512GB SSD", "1299.99", 25, "Electronics"),
    seed("Wireless Mouse", "Ergonomic wireless mouse with USB receiver", "29.99", 150, "Accessories"),
    seed("Mechanical Keyboard", "RGB backlit mechanical keyboard with blue switches", "89.99", 75, "Accessories"),
    seed("USB-C Hub", "7-in-1 USB-C hub with HDMI, USB 3.0, and SD card reader", "45.99", 100, "Accessories"),
    seed("Noise Cancelling Headphones", "Premium over-ear headphones with active noise cancellation", "249.99", 50, "Audio"),
    seed("Smartphone X", "Latest flagship smartphone with 128GB storage", "899.99", 40, "Electronics"),
    seed("Portable SSD 1TB", "Fast external SSD with USB 3.1 interface", "119.99", 80, "Storage"),
    seed("Webcam HD", "1080p HD webcam with built-in microphone", "69.99", 120, "Electronics"),
    seed("Desk Lamp LED", "Adjustable LED desk lamp with touch controls", "39.99", 200, "Office"),
    seed("Monitor 27\"", "27-inch 4K monitor with IPS panel", "399.99", 35, "Electronics"),
    seed("Gaming Chair", "Ergonomic gaming chair with lumbar support", "299.99", 20, "Furniture"),
    seed("Bluetooth Speaker", "Portable waterproof Bluetooth speaker", "59.99", 90, "Audio"),
    seed("Graphics Tablet", "Digital drawing tablet with pressure sensitivity", "179.99", 45, "Creative"),
    seed("External Battery 20000mAh", "High-capacity portable charger with fast charging", "49.99", 110, "Accessories"),
    seed("Smart Watch", "Fitness tracking smartwatch with heart rate monitor", "199.99", 65, "Wearables"),
];

/// Read-only catalog queries.
pub trait ProductCatalog: Send + Sync {
    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::users::StoreError) if the query fails.
    fn list(&self) -> StoreFuture<'_, Vec<Product>>;

    /// One product by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::users::StoreError) if the query fails. A
    /// missing product is `Ok(None)`.
    fn get(&self, id: i32) -> StoreFuture<'_, Option<Product>>;
}
