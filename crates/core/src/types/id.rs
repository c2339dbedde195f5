//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. Backend rows are keyed
//! by UUIDs, so every ID wraps a [`uuid::Uuid`].

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `Uuid` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `generate()`, `as_uuid()`
/// - `Display`, `FromStr`, `From<Uuid>` and `Into<Uuid>` implementations
///
/// # Example
///
/// ```rust
/// # use vitrine_core::define_id;
/// define_id!(UserId);
/// define_id!(OrderId);
///
/// let user_id = UserId::generate();
/// let order_id = OrderId::generate();
///
/// // These are different types, so this won't compile:
/// // let _: UserId = order_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn new(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random (v4) ID.
            #[must_use]
            pub fn generate() -> Self {
                Self(::uuid::Uuid::new_v4())
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                ::uuid::Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(id: ::uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(ProductId);
define_id!(OrderId);
define_id!(CouponId);
define_id!(ReviewId);
define_id!(NotificationId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_roundtrip() {
        let raw = "6f1c2a3b-4d5e-4f60-8a7b-9c0d1e2f3a4b";
        let id: ProductId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let id: OrderId = " 6f1c2a3b-4d5e-4f60-8a7b-9c0d1e2f3a4b\n".parse().unwrap();
        assert_eq!(id.to_string(), "6f1c2a3b-4d5e-4f60-8a7b-9c0d1e2f3a4b");
    }

    #[test]
    fn test_parse_invalid() {
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(ReviewId::generate(), ReviewId::generate());
    }

    #[test]
    fn test_serializes_transparently() {
        let uuid = uuid::Uuid::new_v4();
        let json = serde_json::to_string(&UserId::new(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }
}
