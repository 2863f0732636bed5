//! Error types for the codec crate.
//!
//! Every variant here is a programming-contract violation: the schema and
//! the stored values have diverged, or the schema declares something the
//! remote store cannot represent. None of them are recoverable at runtime.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Contract violations raised during outbound or inbound conversion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A runtime value does not match its declared metadata type.
    #[error("type mismatch for property `{property}`: declared {declared}, got {actual}")]
    TypeMismatch {
        /// Property name.
        property: String,
        /// Declared metadata type.
        declared: &'static str,
        /// Actual runtime type.
        actual: &'static str,
    },

    /// A keyed-map property declares a non-string key type.
    #[error("unsupported key type for map property `{property}`: keys must be strings")]
    UnsupportedKeyType {
        /// Property name.
        property: String,
    },

    /// A property declares a type the sync layer never supports.
    #[error("property `{property}` has unsupported type {type_name}")]
    UnsupportedPropertyType {
        /// Property name.
        property: String,
        /// The unsupported type.
        type_name: &'static str,
    },

    /// A non-embedded linked object reached the codec. Linked top-level
    /// entities must be modeled as remote subcollections, never inlined.
    #[error("property `{property}` links a top-level entity; model it as a subcollection")]
    LinkedObjectNotSupported {
        /// Property name.
        property: String,
    },

    /// A `coordinates` property is not a two-element double collection.
    #[error("property `{property}` must be a two-element double collection")]
    InvalidCoordinates {
        /// Property name.
        property: String,
    },

    /// A value was structurally the right type but unparseable.
    #[error("invalid value for property `{property}`: {message}")]
    InvalidValue {
        /// Property name.
        property: String,
        /// Description of the problem.
        message: String,
    },
}

impl CodecError {
    /// Create a type mismatch error.
    pub fn type_mismatch(
        property: impl Into<String>,
        declared: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            property: property.into(),
            declared,
            actual,
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            property: property.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CodecError::type_mismatch("age", "int", "text");
        assert_eq!(
            err.to_string(),
            "type mismatch for property `age`: declared int, got text"
        );

        let err = CodecError::LinkedObjectNotSupported {
            property: "owner".into(),
        };
        assert!(err.to_string().contains("subcollection"));
    }
}
