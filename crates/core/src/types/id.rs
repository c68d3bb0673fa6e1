//! Newtype IDs for type-safe entity references.
//!
//! The commerce backend hands out opaque string identifiers. Use the
//! `define_id!` macro to wrap them so a product id can never be passed where
//! an address id is expected.

/// Errors that can occur when parsing an entity id.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input was empty or whitespace only.
    #[error("{kind} cannot be empty")]
    Empty {
        /// The id type being parsed.
        kind: &'static str,
    },
}

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `parse()`, `as_str()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use neoshop_core::define_id;
/// define_id!(SkuId);
/// define_id!(WarehouseId);
///
/// let sku = SkuId::new("tee-black-m");
/// assert_eq!(sku.as_str(), "tee-black-m");
/// assert!(WarehouseId::parse("  ").is_err());
///
/// // These are different types, so this won't compile:
/// // let _: WarehouseId = sku;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID without validation.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parse an ID, trimming whitespace and rejecting empty input.
            ///
            /// # Errors
            ///
            /// Returns an error if the input is empty after trimming.
            pub fn parse(id: &str) -> ::core::result::Result<Self, $crate::types::id::IdError> {
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err($crate::types::id::IdError::Empty {
                        kind: stringify!($name),
                    });
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Get the underlying identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(ProductId);
define_id!(AddressId);
define_id!(PaymentMethodId);
define_id!(OrderId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims() {
        let id = ProductId::parse("  sku-1 ").unwrap();
        assert_eq!(id.as_str(), "sku-1");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(
            AddressId::parse(" \t"),
            Err(IdError::Empty { kind: "AddressId" })
        );
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = OrderId::new("ord_42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ord_42\"");
    }
}
