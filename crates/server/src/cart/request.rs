//! Client input for cart operations.
//!
//! Request bodies are deserialized leniently (every field an optional JSON
//! value) so that a missing or malformed field becomes a
//! `CartError::InvalidRequest` naming the field, rather than a generic body
//! rejection.

use serde::Deserialize;
use serde_json::Value;

use cartline_core::{ProductIdentity, Quantity, UserIdentity};

use super::CartError;

/// Raw add-to-cart body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    #[serde(default, alias = "userEmail")]
    pub user_identity: Option<Value>,
    #[serde(default)]
    pub user_context_id: Option<Value>,
    #[serde(default)]
    pub product_identity: Option<Value>,
    #[serde(default)]
    pub quantity: Option<Value>,
}

/// Validated add-to-cart input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddToCart {
    pub user_identity: UserIdentity,
    pub user_context_id: Option<String>,
    pub product_identity: ProductIdentity,
    pub quantity: Quantity,
}

impl AddToCartRequest {
    /// Validate and coerce the body.
    ///
    /// `quantity` defaults to 1 when absent or null.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidRequest` if `userIdentity` or
    /// `productIdentity` is missing, or any field is malformed.
    pub fn validate(self) -> Result<AddToCart, CartError> {
        let user_identity = user_identity(self.user_identity, "userIdentity")?;
        let product_identity = product_identity(self.product_identity)?;
        let quantity = match self.quantity {
            Some(Value::Null) | None => Quantity::ONE,
            Some(value) => Quantity::from_json(&value)?,
        };
        let user_context_id = context_id(self.user_context_id)?;

        Ok(AddToCart {
            user_identity,
            user_context_id,
            product_identity,
            quantity,
        })
    }
}

/// Raw quantity-update body.
///
/// The owner travels as `userEmail`; `userIdentity` is accepted too.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    #[serde(default, alias = "userIdentity")]
    pub user_email: Option<Value>,
    #[serde(default)]
    pub quantity: Option<Value>,
}

impl UpdateQuantityRequest {
    /// Validate and coerce the body.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidRequest` if the user is missing, or the
    /// quantity is missing, non-numeric or below 1.
    pub fn validate(self) -> Result<(UserIdentity, Quantity), CartError> {
        let user = user_identity(self.user_email, "userEmail")?;
        let quantity = match self.quantity {
            Some(Value::Null) | None => return Err(CartError::missing("quantity")),
            Some(value) => Quantity::from_json(&value)?,
        };
        Ok((user, quantity))
    }
}

fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

fn user_identity(value: Option<Value>, field: &str) -> Result<UserIdentity, CartError> {
    match present(value) {
        None => Err(CartError::missing(field)),
        Some(Value::String(s)) => Ok(UserIdentity::parse(&s)?),
        Some(_) => Err(CartError::InvalidRequest(format!("{field} must be a string"))),
    }
}

fn product_identity(value: Option<Value>) -> Result<ProductIdentity, CartError> {
    present(value).map_or_else(
        || Err(CartError::missing("productIdentity")),
        |value| Ok(ProductIdentity::from_json(&value)?),
    )
}

fn context_id(value: Option<Value>) -> Result<Option<String>, CartError> {
    match present(value) {
        None => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(CartError::InvalidRequest(
            "userContextId must be a string or a number".to_owned(),
        )),
    }
}
