//! Cart route handlers.
//!
//! Thin adapters: parse the request, call the engine, map the outcome to a
//! status code. All cart semantics live in [`crate::cart`].

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use cartline_core::{ProductIdentity, UserIdentity};

use crate::cart::{AddToCartRequest, CartError, UpdateQuantityRequest};
use crate::error::{Result, add_breadcrumb, set_sentry_user};
use crate::models::CartLine;
use crate::state::AppState;

/// Query parameters for removal.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveParams {
    #[serde(default, alias = "userEmail")]
    pub user_identity: Option<String>,
}

/// Confirmation body for a removal.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResponse {
    pub message: String,
    pub deleted_count: u64,
}

/// List a user's cart.
///
/// GET /cart/{userIdentity}
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<Vec<CartLine>>> {
    let user = UserIdentity::parse(&user).map_err(CartError::from)?;
    set_sentry_user(&user);
    let lines = state.engine().list(&user).await?;
    Ok(Json(lines))
}

/// Add a product to a cart, merging with an existing line.
///
/// POST /cart
///
/// Answers 201 whether the line was created or merged.
#[instrument(skip(state, body))]
pub async fn add(
    State(state): State<AppState>,
    body: std::result::Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CartLine>)> {
    let Json(request) = body?;
    let reconciled = state.engine().add_or_merge(request).await?;

    let line = reconciled.into_line();
    set_sentry_user(&line.user_identity);
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product", line.product_identity.as_str())]),
    );

    Ok((StatusCode::CREATED, Json(line)))
}

/// Overwrite the quantity of a cart line.
///
/// PATCH /cart/{productIdentity}
#[instrument(skip(state, body))]
pub async fn update(
    State(state): State<AppState>,
    Path(product): Path<String>,
    body: std::result::Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<Json<CartLine>> {
    let product = ProductIdentity::parse(&product).map_err(CartError::from)?;
    let Json(request) = body?;
    let line = state.engine().set_quantity(product, request).await?;
    Ok(Json(line))
}

/// Remove a cart line.
///
/// DELETE /cart/{productIdentity}?userIdentity=...
#[instrument(skip(state, params))]
pub async fn remove(
    State(state): State<AppState>,
    Path(product): Path<String>,
    params: std::result::Result<Query<RemoveParams>, QueryRejection>,
) -> Result<Json<RemoveResponse>> {
    let product = ProductIdentity::parse(&product).map_err(CartError::from)?;
    let Query(params) = params?;
    let user = params
        .user_identity
        .filter(|u| !u.trim().is_empty())
        .map(|u| UserIdentity::parse(&u))
        .transpose()
        .map_err(CartError::from)?;

    let deleted_count = state.engine().remove(user, product).await?;

    add_breadcrumb("cart", "Removed from cart", None);

    Ok(Json(RemoveResponse {
        message: "Item removed from cart".to_owned(),
        deleted_count,
    }))
}
