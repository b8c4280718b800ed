//! HTTP-level tests for the product catalog endpoints.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use cartline_integration_tests::TestApp;

#[tokio::test]
async fn test_product_crud() {
    let app = TestApp::with_products(&[]).await;

    let created = app
        .post(
            "/products",
            json!({
                "id": "tee",
                "name": "Pineapple Tee",
                "price": {"amount": "24.00", "currencyCode": "USD"},
                "imageUrl": "https://cdn.example/tee.png"
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["id"], "tee");
    assert_eq!(created.body["price"]["currencyCode"], "USD");

    let shown = app.get("/products/tee").await;
    assert_eq!(shown.status, StatusCode::OK);
    assert_eq!(shown.body["name"], "Pineapple Tee");

    let listed = app.get("/products").await;
    assert_eq!(listed.body.as_array().unwrap().len(), 1);

    let deleted = app.delete("/products/tee").await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(app.get("/products/tee").await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete("/products/tee").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_generates_id_and_rejects_duplicates() {
    let app = TestApp::with_products(&["p1"]).await;

    let generated = app.post("/products", json!({"name": "Sticker"})).await;
    assert_eq!(generated.status, StatusCode::CREATED);
    assert!(!generated.body["id"].as_str().unwrap().is_empty());

    let duplicate = app
        .post("/products", json!({"id": "p1", "name": "Again"}))
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let blank = app.post("/products", json!({"name": "  "})).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let missing_name = app.post("/products", json!({"id": "p9"})).await;
    assert_eq!(missing_name.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_snapshot_survives_product_deletion() {
    let app = TestApp::with_products(&["p1"]).await;
    app.post(
        "/cart",
        json!({"userIdentity": "a@x.com", "productIdentity": "p1"}),
    )
    .await;

    assert_eq!(app.delete("/products/p1").await.status, StatusCode::OK);

    // Merging into the existing line needs no catalog lookup
    let merged = app
        .post(
            "/cart",
            json!({"userIdentity": "a@x.com", "productIdentity": "p1"}),
        )
        .await;
    assert_eq!(merged.status, StatusCode::CREATED);
    assert_eq!(merged.body["quantity"], 2);
    assert_eq!(merged.body["productSnapshot"]["name"], "Product p1");
}
