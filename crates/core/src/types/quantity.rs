//! Cart line quantities.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors that can occur when parsing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or a negative number.
    #[error("quantity must be at least 1")]
    NotPositive,
    /// Larger than the store can represent.
    #[error("quantity must be at most {max}")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u32,
    },
    /// Not an integer, or a string that does not hold one.
    #[error("quantity must be an integer, got {0}")]
    NotAnInteger(String),
}

/// A positive item count.
///
/// Always in `1..=Quantity::MAX`. The upper bound is `i32::MAX` so the value
/// fits the store's integer column.
///
/// ```
/// use cartline_core::Quantity;
/// use serde_json::json;
///
/// assert_eq!(Quantity::from_json(&json!("3")).unwrap().get(), 3);
/// assert!(Quantity::from_json(&json!(0)).is_err());
/// assert!(Quantity::from_json(&json!("three")).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// A single item, the default for add-to-cart.
    pub const ONE: Self = Self(1);

    /// Largest representable quantity.
    #[allow(clippy::cast_sign_loss)]
    pub const MAX: u32 = i32::MAX as u32;

    /// Create a quantity from an unsigned count.
    ///
    /// # Errors
    ///
    /// Returns an error if `n` is zero or above [`Self::MAX`].
    pub const fn new(n: u32) -> Result<Self, QuantityError> {
        if n == 0 {
            return Err(QuantityError::NotPositive);
        }
        if n > Self::MAX {
            return Err(QuantityError::TooLarge { max: Self::MAX });
        }
        Ok(Self(n))
    }

    /// Parse a quantity from text, e.g. a form field or query parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed text is not an integer in range.
    pub fn parse(s: &str) -> Result<Self, QuantityError> {
        let trimmed = s.trim();
        let n: i64 = trimmed
            .parse()
            .map_err(|_| QuantityError::NotAnInteger(format!("{trimmed:?}")))?;
        Self::from_i64(n)
    }

    /// Coerce a JSON value into a quantity.
    ///
    /// Accepts integers and strings holding integers.
    ///
    /// # Errors
    ///
    /// Returns an error for fractional numbers, other JSON types, and
    /// integers outside `1..=Quantity::MAX`.
    pub fn from_json(value: &Value) -> Result<Self, QuantityError> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map_or_else(
                    || {
                        if n.as_u64().is_some() {
                            Err(QuantityError::TooLarge { max: Self::MAX })
                        } else {
                            Err(QuantityError::NotAnInteger(n.to_string()))
                        }
                    },
                    Self::from_i64,
                ),
            Value::String(s) => Self::parse(s),
            other => Err(QuantityError::NotAnInteger(other.to_string())),
        }
    }

    fn from_i64(n: i64) -> Result<Self, QuantityError> {
        if n < 1 {
            return Err(QuantityError::NotPositive);
        }
        u32::try_from(n)
            .map_err(|_| QuantityError::TooLarge { max: Self::MAX })
            .and_then(Self::new)
    }

    /// Get the count.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Get the count as the store's integer type.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_i32(self) -> i32 {
        // Bounded by MAX on construction
        self.0 as i32
    }

    /// Add two quantities, clamping at [`Self::MAX`].
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        let sum = self.0.saturating_add(other.0);
        if sum > Self::MAX {
            Self(Self::MAX)
        } else {
            Self(sum)
        }
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Value> for Quantity {
    type Error = QuantityError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_i64(i64::from(value))
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}
