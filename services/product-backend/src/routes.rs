//! HTTP handlers and router for the catalog service.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use loginapp_core::catalog::{Product, ProductCatalog};
use loginapp_runtime::ReadinessFlag;
use loginapp_web::{AppError, WebResult, health_routes};
use serde::Serialize;
use std::sync::Arc;

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "product-backend";

/// `{"products": [...]}`
#[derive(Debug, Serialize)]
pub struct ProductList {
    /// Newest first
    pub products: Vec<Product>,
}

/// `{"product": {...}}`
#[derive(Debug, Serialize)]
pub struct ProductEnvelope {
    /// The requested product
    pub product: Product,
}

/// All products, newest first.
pub async fn list_products(State(catalog): State<Arc<dyn ProductCatalog>>) -> WebResult<Json<ProductList>> {
    let products = catalog
        .list()
        .await
        .map_err(|e| AppError::internal("Failed to fetch products").with_source(e.into()))?;
    Ok(Json(ProductList { products }))
}

/// One product. A non-numeric id cannot match a row, so it is a 404 as well.
pub async fn get_product(
    State(catalog): State<Arc<dyn ProductCatalog>>,
    Path(id): Path<String>,
) -> WebResult<Json<ProductEnvelope>> {
    let Ok(id) = id.parse::<i32>() else {
        return Err(AppError::not_found("Product not found"));
    };

    catalog
        .get(id)
        .await
        .map_err(|e| AppError::internal("Failed to fetch product").with_source(e.into()))?
        .map(|product| Json(ProductEnvelope { product }))
        .ok_or_else(|| AppError::not_found("Product not found"))
}

/// Build the service router, `/health` included.
pub fn build_router(catalog: Arc<dyn ProductCatalog>, storage: ReadinessFlag) -> Router {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/:id", get(get_product))
        .with_state(catalog)
        .merge(health_routes(SERVICE_NAME, storage))
}
