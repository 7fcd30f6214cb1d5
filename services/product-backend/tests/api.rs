//! HTTP tests for the catalog service against the in-memory catalog.

#![allow(clippy::expect_used)]

use axum::http::StatusCode;
use axum_test::TestServer;
use loginapp_core::environment::Clock;
use loginapp_runtime::ReadinessFlag;
use loginapp_testing::{InMemoryCatalog, test_clock};
use product_backend::build_router;
use serde_json::{Value, json};
use std::sync::Arc;

fn server() -> (TestServer, Arc<InMemoryCatalog>) {
    let catalog = Arc::new(InMemoryCatalog::seeded(test_clock().now()));
    let server = TestServer::new(build_router(catalog.clone(), ReadinessFlag::new())).expect("test server");
    (server, catalog)
}

#[tokio::test]
async fn lists_seeded_products() {
    let (server, _) = server();

    let response = server.get("/api/products").await;

    response.assert_status_ok();
    let body: Value = response.json();
    let products = body["products"].as_array().expect("products array");
    assert_eq!(products.len(), 15);
    let laptop = products
        .iter()
        .find(|p| p["name"] == "Laptop Pro 15")
        .expect("laptop listed");
    assert_eq!(laptop["price"], "1299.99");
    assert_eq!(laptop["stock"], 25);
    assert_eq!(laptop["category"], "Electronics");
    assert_eq!(laptop["created_at"], "2025-01-01T00:00:00.000Z");
}

#[tokio::test]
async fn gets_one_product() {
    let (server, _) = server();

    let response = server.get("/api/products/1").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["product"]["id"], 1);
    assert!(body["product"]["name"].is_string());
}

#[tokio::test]
async fn missing_and_non_numeric_ids_are_not_found() {
    let (server, _) = server();

    for path in ["/api/products/999", "/api/products/abc"] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({"error": "Product not found", "code": "NOT_FOUND"}));
    }
}

#[tokio::test]
async fn storage_failure_is_internal() {
    let (server, catalog) = server();
    catalog.set_unavailable(true);

    let list = server.get("/api/products").await;
    list.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(list.json::<Value>()["error"], "Failed to fetch products");

    let one = server.get("/api/products/1").await;
    one.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(one.json::<Value>()["error"], "Failed to fetch product");
}

#[tokio::test]
async fn health_names_the_service() {
    let (server, _) = server();

    let body: Value = server.get("/health").await.json();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "product-backend");
}
