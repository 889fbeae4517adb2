use thiserror::Error;

/// Error taxonomy for graph construction and checkpoint restoration
///
/// Most variants indicate caller bugs and fail fast; the exception is
/// `CheckpointNotFound`, which surfaces an external-resource failure and is
/// propagated unmodified without retrying.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Invalid argument in operation '{operation}': {reason}")]
    InvalidArgument { operation: String, reason: String },

    #[error("Unsupported option '{option}' in operation '{operation}', supported: {supported:?}")]
    UnsupportedOption {
        operation: String,
        option: String,
        supported: Vec<String>,
    },

    #[error("Device overflow in operation '{operation}': collected {collected} sets for {n_devices} devices")]
    DeviceOverflow {
        operation: String,
        collected: usize,
        n_devices: usize,
    },

    #[error("Name collision in operation '{operation}': '{name}' {reason}")]
    NameCollision {
        operation: String,
        name: String,
        reason: String,
    },

    #[error("Checkpoint '{checkpoint_id}' not found: {details}")]
    CheckpointNotFound {
        checkpoint_id: String,
        details: String,
    },

    #[error("Precondition failed in operation '{operation}': {reason}")]
    Precondition { operation: String, reason: String },

    #[error("Shape mismatch in operation '{operation}': expected {expected}, got {got}")]
    ShapeMismatch {
        operation: String,
        expected: String,
        got: String,
    },

    #[error("IO error in operation '{operation}': {details}")]
    Io {
        operation: String,
        details: String,
        path: Option<String>,
    },

    #[error("Serialization error in operation '{operation}': {details}")]
    Serialization { operation: String, details: String },
}

impl EngineError {
    /// Create an invalid argument error with operation context
    pub fn invalid_argument(operation: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported option error listing the supported choices
    pub fn unsupported_option(operation: &str, option: &str, supported: Vec<String>) -> Self {
        Self::UnsupportedOption {
            operation: operation.to_string(),
            option: option.to_string(),
            supported,
        }
    }

    /// Create a device overflow error
    pub fn device_overflow(operation: &str, collected: usize, n_devices: usize) -> Self {
        Self::DeviceOverflow {
            operation: operation.to_string(),
            collected,
            n_devices,
        }
    }

    /// Create a name collision error
    pub fn name_collision(operation: &str, name: &str, reason: impl Into<String>) -> Self {
        Self::NameCollision {
            operation: operation.to_string(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a checkpoint-not-found error
    pub fn checkpoint_not_found(checkpoint_id: &str, details: impl Into<String>) -> Self {
        Self::CheckpointNotFound {
            checkpoint_id: checkpoint_id.to_string(),
            details: details.into(),
        }
    }

    /// Create a precondition error
    pub fn precondition(operation: &str, reason: impl Into<String>) -> Self {
        Self::Precondition {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(operation: &str, expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            operation: operation.to_string(),
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create an IO error with an optional path
    pub fn io(operation: &str, details: impl Into<String>, path: Option<String>) -> Self {
        Self::Io {
            operation: operation.to_string(),
            details: details.into(),
            path,
        }
    }

    /// Create a serialization error
    pub fn serialization(operation: &str, details: impl Into<String>) -> Self {
        Self::Serialization {
            operation: operation.to_string(),
            details: details.into(),
        }
    }
}

/// Result type alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_operation() {
        let err = EngineError::invalid_argument("add_to_collection", "empty name");
        assert!(err.to_string().contains("add_to_collection"));
        assert!(err.to_string().contains("empty name"));
    }

    #[test]
    fn test_checkpoint_not_found_display() {
        let err = EngineError::checkpoint_not_found("pretrained", "no file");
        assert!(err.to_string().contains("pretrained"));
    }
}
