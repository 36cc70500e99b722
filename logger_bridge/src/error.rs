//! # Bridge Errors

use crate::codes::ErrorCode;

/// Failure raised by an error presenter while rendering output
#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    /// Writing to the output channel failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A formatter refused or failed to render the error
    #[error("Formatter failed: {reason}")]
    Formatter { reason: String },
}

/// Comprehensive error type for the logger bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The severity mapping has no group for this code
    #[error("No severity group found for error code {code}")]
    Unclassified { code: ErrorCode },

    /// The presenter failed after the log record was written
    #[error("Presentation error: {0}")]
    Presentation(#[from] PresentError),

    /// A memory size literal could not be translated to bytes
    #[error("Invalid memory size literal '{literal}'")]
    InvalidMemoryLiteral { literal: String },

    /// A backtrace filter fragment is not a valid regular expression
    #[error("Invalid backtrace filter pattern '{pattern}': {source}")]
    InvalidFilterPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl BridgeError {
    /// Check if this error points at a configuration defect rather than a runtime fault
    pub fn is_configuration_defect(&self) -> bool {
        matches!(
            self,
            BridgeError::Unclassified { .. }
                | BridgeError::InvalidMemoryLiteral { .. }
                | BridgeError::InvalidFilterPattern { .. }
                | BridgeError::Configuration { .. }
        )
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BridgeError::Unclassified {
            code: ErrorCode::new(1 << 20),
        };
        assert_eq!(err.to_string(), "No severity group found for error code 1048576");
        assert!(err.is_configuration_defect());

        let err: BridgeError = PresentError::Formatter {
            reason: "template missing".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Presentation error: Formatter failed: template missing"
        );
        assert!(!err.is_configuration_defect());
    }
}
