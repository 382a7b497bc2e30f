//! Crate-wide error types.
//!
//! The engine's error policy is graceful local degradation: nothing here is
//! fatal to a render pass. `BuildError` is the one surface that rejects input
//! outright (a malformed plan never becomes a `Plan`); everything render-side
//! is recovered node-locally and surfaced as rendered state.

/// Errors raised while materializing a [`Plan`](crate::plan::Plan) from its
/// builder chain.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A path binding referenced an attribute the in-scope data descriptor
    /// does not declare.
    #[error("unknown attribute `{attribute}` in descriptor `{descriptor}`")]
    UnknownAttribute {
        attribute: String,
        descriptor: String,
    },

    /// The plan was built without an id.
    #[error("plan id must not be empty")]
    EmptyPlanId,

    /// A member had neither a component name nor enough schema metadata to
    /// pick one, and no binding either.
    #[error("element `{label}` has no component, no binding and no schema attribute")]
    UnresolvableElement { label: String },
}

/// Errors raised by path resolution against the live data object.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DataError {
    #[error("path `{0}` not found")]
    PathNotFound(String),

    #[error("index {index} out of bounds at `{path}` (len {len})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("expected {expected} at `{path}`")]
    TypeMismatch {
        path: String,
        expected: &'static str,
    },

    #[error("empty path")]
    EmptyPath,
}

/// Error produced by a binding function. Caught per node; the node renders
/// with an error flag instead of aborting the tree.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct BindingError {
    pub message: String,
}

impl BindingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error returned by a pub/sub subscriber callback. Caught per subscriber
/// during dispatch; logged, delivery to the remaining subscribers continues.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct SubscriberError {
    pub message: String,
}

impl SubscriberError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_display() {
        let err = BuildError::UnknownAttribute {
            attribute: "emial".into(),
            descriptor: "User".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown attribute `emial` in descriptor `User`"
        );
    }

    #[test]
    fn data_error_display() {
        let err = DataError::IndexOutOfBounds {
            path: "items".into(),
            index: 5,
            len: 2,
        };
        assert_eq!(err.to_string(), "index 5 out of bounds at `items` (len 2)");
    }

    #[test]
    fn binding_error_from_message() {
        let err = BindingError::new("division by zero");
        assert_eq!(err.to_string(), "division by zero");
    }
}
