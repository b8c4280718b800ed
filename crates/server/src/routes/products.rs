//! Product catalog route handlers.
//!
//! The catalog exists so cart lines can carry a product snapshot; these
//! routes are plain CRUD over it.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};
use tracing::instrument;

use cartline_core::ProductIdentity;

use crate::error::{AppError, Result};
use crate::models::{NewProduct, Product};
use crate::state::AppState;

fn product_id(raw: &str) -> Result<ProductIdentity> {
    ProductIdentity::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// List the catalog.
///
/// GET /products
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().list().await?))
}

/// Show one product.
///
/// GET /products/{id}
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Product>> {
    let id = product_id(&id)?;
    let product = state
        .catalog()
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    Ok(Json(product))
}

/// Create a product.
///
/// POST /products
#[instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>)> {
    let Json(product) = body?;
    if product.validated_name().is_none() {
        return Err(AppError::BadRequest("name is required".to_owned()));
    }

    let created = state.catalog().create(product).await?;
    tracing::info!(product = %created.id, "Created product");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Delete a product. Cart lines that refer to it are kept.
///
/// DELETE /products/{id}
#[instrument(skip(state))]
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let id = product_id(&id)?;
    if !state.catalog().delete(&id).await? {
        return Err(AppError::NotFound(format!("product {id}")));
    }
    tracing::info!(product = %id, "Deleted product");
    Ok(Json(json!({ "message": "Product deleted" })))
}
