//! Engine error types.

use docsync_codec::CodecError;
use thiserror::Error;

/// Result alias for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A schema/value contract violation during conversion.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A remote store operation failed.
    #[error("remote {operation} failed for {entity_type}/{id}: {message}")]
    Remote {
        /// The remote operation that failed (`create` or `delete`).
        operation: &'static str,
        /// The entity type being uplinked.
        entity_type: String,
        /// The record identifier.
        id: String,
        /// The remote store's failure message.
        message: String,
    },
}

impl SyncError {
    /// Builds a remote-operation failure.
    pub fn remote(
        operation: &'static str,
        entity_type: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SyncError::Remote {
            operation,
            entity_type: entity_type.into(),
            id: id.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_codec::CodecError;

    #[test]
    fn remote_error_formats_context() {
        let err = SyncError::remote("delete", "Widget", "w1", "offline");
        assert_eq!(
            err.to_string(),
            "remote delete failed for Widget/w1: offline"
        );
    }

    #[test]
    fn codec_errors_convert() {
        let err: SyncError = CodecError::type_mismatch("name", "string", "int").into();
        assert!(matches!(err, SyncError::Codec(_)));
    }
}
