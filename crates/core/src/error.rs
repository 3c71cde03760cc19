//! Error types shared by the stores and engines.

use thiserror::Error;

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value failed to parse into its domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    /// Required reference data is missing (e.g. a status lookup row).
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification used by the HTTP layers to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Upstream,
    Internal,
}

/// Errors surfaced by the cart, order, payment and address engines.
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("This product is out of stock")]
    OutOfStock,

    /// Requested quantity exceeds stock. `in_cart` is what the buyer already
    /// holds, so the message can report remaining capacity.
    #[error("{}", insufficient_stock_message(.available, .in_cart))]
    InsufficientStock { available: i32, in_cart: i32 },

    #[error("{0}")]
    Conflict(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn insufficient_stock_message(available: &i32, in_cart: &i32) -> String {
    let (available, in_cart) = (*available, *in_cart);
    if in_cart > 0 {
        let remaining = (available - in_cart).max(0);
        format!("Only {remaining} more item(s) can be added to cart")
    } else {
        format!("Only {available} items available in stock")
    }
}

impl ShopError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) | Self::Repository(RepositoryError::NotFound) => {
                ErrorKind::NotFound
            }
            Self::OutOfStock
            | Self::InsufficientStock { .. }
            | Self::Conflict(_)
            | Self::Repository(RepositoryError::Conflict(_)) => ErrorKind::Conflict,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Internal(_) | Self::Repository(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }
}

/// Result alias for engine operations.
pub type ShopResult<T> = Result<T, ShopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_messages() {
        let fresh = ShopError::InsufficientStock {
            available: 3,
            in_cart: 0,
        };
        assert_eq!(fresh.to_string(), "Only 3 items available in stock");

        let cumulative = ShopError::InsufficientStock {
            available: 4,
            in_cart: 3,
        };
        assert_eq!(
            cumulative.to_string(),
            "Only 1 more item(s) can be added to cart"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ShopError::OutOfStock.kind(), ErrorKind::Conflict);
        assert_eq!(
            ShopError::Repository(RepositoryError::Configuration("x".into())).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            ShopError::Repository(RepositoryError::NotFound).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(ShopError::Validation("bad".into()).kind(), ErrorKind::Validation);
    }
}
