//! User and product identities as seen by the cart.
//!
//! Both are opaque strings. Inbound values are trimmed and checked for
//! emptiness and length here, once, so matching further down is plain string
//! equality.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors that can occur when parsing a [`UserIdentity`] or [`ProductIdentity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The input is empty or whitespace only.
    #[error("{field} cannot be empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },
    /// The input is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
    /// The input is neither a string nor a non-negative integer.
    #[error("{field} must be a string or a non-negative integer")]
    InvalidType {
        /// Name of the offending field.
        field: &'static str,
    },
}

fn parse_opaque(s: &str, field: &'static str, max: usize) -> Result<String, IdentityError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(IdentityError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(IdentityError::TooLong { field, max });
    }
    Ok(trimmed.to_owned())
}

/// The owner of a cart.
///
/// Observed in the wild as either an email address or a separately issued
/// user id. It is never checked against a user registry.
///
/// ```
/// use cartline_core::UserIdentity;
///
/// let user = UserIdentity::parse("  a@x.com ").unwrap();
/// assert_eq!(user.as_str(), "a@x.com");
/// assert!(user.looks_like_email());
/// assert!(UserIdentity::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Maximum length, matching the RFC 5321 limit for email addresses.
    pub const MAX_LENGTH: usize = 254;

    /// Parse a `UserIdentity` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than
    /// [`Self::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        parse_opaque(s, "userIdentity", Self::MAX_LENGTH).map(Self)
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identity and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Whether the identity has the shape of an email address.
    #[must_use]
    pub fn looks_like_email(&self) -> bool {
        self.0
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for UserIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserIdentity> for String {
    fn from(identity: UserIdentity) -> Self {
        identity.0
    }
}

impl AsRef<str> for UserIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The product a cart line refers to.
///
/// The canonical form is an opaque string. Bare non-negative integers are
/// accepted at the boundary and coerced to their decimal string, so `42` and
/// `"42"` name the same product.
///
/// ```
/// use cartline_core::ProductIdentity;
/// use serde_json::json;
///
/// let from_int = ProductIdentity::from_json(&json!(42)).unwrap();
/// let from_str = ProductIdentity::parse("42").unwrap();
/// assert_eq!(from_int, from_str);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "Value", into = "String")]
pub struct ProductIdentity(String);

impl ProductIdentity {
    /// Maximum length of a product identity.
    pub const MAX_LENGTH: usize = 128;

    const FIELD: &'static str = "productIdentity";

    /// Parse a `ProductIdentity` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than
    /// [`Self::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        parse_opaque(s, Self::FIELD, Self::MAX_LENGTH).map(Self)
    }

    /// Generate a fresh random identity for catalog entries created without one.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Coerce a JSON value into a `ProductIdentity`.
    ///
    /// Strings are parsed with [`Self::parse`]; non-negative integers become
    /// their decimal representation.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidType`] for any other JSON value.
    pub fn from_json(value: &Value) -> Result<Self, IdentityError> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => n
                .as_u64()
                .map(|n| Self(n.to_string()))
                .ok_or(IdentityError::InvalidType { field: Self::FIELD }),
            _ => Err(IdentityError::InvalidType { field: Self::FIELD }),
        }
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identity and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProductIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ProductIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<Value> for ProductIdentity {
    type Error = IdentityError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

impl From<ProductIdentity> for String {
    fn from(identity: ProductIdentity) -> Self {
        identity.0
    }
}

impl AsRef<str> for ProductIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature). Both identities are stored as TEXT.
#[cfg(feature = "postgres")]
macro_rules! impl_text_column {
    ($name:ident) => {
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                // Database values were validated on the way in
                Ok(Self(s))
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

#[cfg(feature = "postgres")]
impl_text_column!(UserIdentity);
#[cfg(feature = "postgres")]
impl_text_column!(ProductIdentity);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_user_identity_trims() {
        let user = UserIdentity::parse("  u-123\n").unwrap();
        assert_eq!(user.as_str(), "u-123");
        assert!(!user.looks_like_email());
    }

    #[test]
    fn test_user_identity_empty() {
        assert_eq!(
            UserIdentity::parse(""),
            Err(IdentityError::Empty {
                field: "userIdentity"
            })
        );
    }

    #[test]
    fn test_user_identity_too_long() {
        let long = "a".repeat(UserIdentity::MAX_LENGTH + 1);
        assert!(matches!(
            UserIdentity::parse(&long),
            Err(IdentityError::TooLong { .. })
        ));
    }

    #[test]
    fn test_looks_like_email() {
        assert!(UserIdentity::parse("a@x.com").unwrap().looks_like_email());
        assert!(!UserIdentity::parse("@x.com").unwrap().looks_like_email());
        assert!(!UserIdentity::parse("a@").unwrap().looks_like_email());
    }

    #[test]
    fn test_product_identity_integer_coercion() {
        let id = ProductIdentity::from_json(&json!(7)).unwrap();
        assert_eq!(id.as_str(), "7");
    }

    #[test]
    fn test_product_identity_rejects_other_json() {
        for value in [json!(-1), json!(1.5), json!(true), json!(null), json!([1])] {
            assert!(matches!(
                ProductIdentity::from_json(&value),
                Err(IdentityError::InvalidType { .. })
            ));
        }
    }

    #[test]
    fn test_product_identity_deserialize_from_number_or_string() {
        let a: ProductIdentity = serde_json::from_str("12").unwrap();
        let b: ProductIdentity = serde_json::from_str("\" 12 \"").unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"12\"");
    }

    #[test]
    fn test_user_identity_deserialize_rejects_blank() {
        let result: Result<UserIdentity, _> = serde_json::from_str("\"  \"");
        assert!(result.is_err());
    }
}
