use thiserror::Error;

/// Coarse classification of a [`KVError`], stable across context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed caller input. Raised before any backend call.
    Validation,
    /// I/O, transaction or lock failure inside a Store.
    Backend,
    /// The caller's context was cancelled or its deadline passed.
    Cancellation,
}

#[derive(Error, Debug)]
pub enum KVError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A backend error annotated with the operation and target it came from.
    #[error("{op} {target}: {source}")]
    Op {
        op: &'static str,
        target: String,
        #[source]
        source: Box<KVError>,
    },
}

impl KVError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KVError::Validation(_) => ErrorKind::Validation,
            KVError::Storage(_) => ErrorKind::Backend,
            KVError::Cancelled | KVError::DeadlineExceeded => ErrorKind::Cancellation,
            KVError::Op { source, .. } => source.kind(),
        }
    }

    /// Wrap this error with the operation name and the path (or batch) it
    /// was operating on.
    pub fn context(self, op: &'static str, target: impl Into<String>) -> Self {
        KVError::Op {
            op,
            target: target.into(),
            source: Box::new(self),
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind() == ErrorKind::Cancellation
    }
}

/// Map any displayable backend error into [`KVError::Storage`].
pub fn storage_err(e: impl std::fmt::Display) -> KVError {
    KVError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_survives_wrapping() {
        let err = KVError::DeadlineExceeded
            .context("delete", "\"users/*\"")
            .context("cli", "delete");
        assert_eq!(err.kind(), ErrorKind::Cancellation);
        assert!(err.is_cancellation());
        assert!(!err.is_validation());
    }

    #[test]
    fn display_includes_operation_and_target() {
        let err = KVError::Storage("disk full".into()).context("append", "3 entries");
        assert_eq!(err.to_string(), "append 3 entries: storage error: disk full");
    }

    #[test]
    fn source_is_the_wrapped_error() {
        use std::error::Error as _;
        let err = KVError::Cancelled.context("fetch", "\"a/\"");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("operation cancelled"));
    }
}
