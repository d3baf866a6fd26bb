//! Macros for defining typed ID types.

/// Macro to define a typed ID with a specific prefix.
///
/// This generates a newtype wrapper around a provider-issued string token
/// with:
/// - A `PREFIX` constant
/// - `new()` to generate a fresh, locally unique ID
/// - `parse()` to parse from string, validating the prefix
/// - `Display` and `FromStr` implementations
/// - `Serialize` and `Deserialize` implementations
/// - `Ord`, `Hash`, and other standard traits
///
/// # Example
///
/// ```ignore
/// define_id!(InstanceId, "i");
/// define_id!(ImageId, "img");
///
/// let instance_id = InstanceId::new();
/// let parsed: InstanceId = "i-0f3a9c1e2b4d5a6f7".parse()?;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        /// A typed ID for this resource type.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// The prefix for this ID type.
            pub const PREFIX: &'static str = $prefix;

            /// Creates a new ID with a fresh random token.
            #[must_use]
            pub fn new() -> Self {
                Self($crate::random_token())
            }

            /// Creates an ID from a raw provider token (no prefix).
            #[must_use]
            pub fn from_token(token: impl Into<String>) -> Self {
                Self(token.into())
            }

            /// Returns the token portion (without the prefix).
            #[must_use]
            pub fn token(&self) -> &str {
                &self.0
            }

            /// Parses an ID from a string.
            ///
            /// The string must be in the format `{prefix}-{token}`.
            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                if s.is_empty() {
                    return Err($crate::IdError::Empty);
                }

                let Some((prefix, token)) = s.split_once('-') else {
                    return Err($crate::IdError::MissingSeparator);
                };

                if prefix != Self::PREFIX {
                    return Err($crate::IdError::InvalidPrefix {
                        expected: Self::PREFIX,
                        actual: prefix.to_string(),
                    });
                }

                if token.is_empty() {
                    return Err($crate::IdError::InvalidToken(
                        "token cannot be empty".to_string(),
                    ));
                }

                if !token.bytes().all(|b| b.is_ascii_alphanumeric()) {
                    return Err($crate::IdError::InvalidToken(format!(
                        "token must be alphanumeric: '{token}'"
                    )));
                }

                Ok(Self(token.to_string()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}-{}", Self::PREFIX, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}
