//! Error presentation
//!
//! Presenters write a classified error to an output channel. Outside a live
//! environment they show full detail, in a live one only a generic message.

mod debug;
mod pretty;

pub use debug::DebugPresenter;
pub use pretty::PrettyPresenter;

use crate::backtrace::Frame;
use crate::codes::ErrorCode;
use crate::environment::Environment;
use crate::error::PresentError;
use serde::Serialize;

/// A classified error ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentedError {
    pub code: ErrorCode,
    pub message: String,
    pub file: String,
    pub line: u32,
    /// Severity title, e.g. "Warning"
    pub label: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<Frame>,
}

impl PresentedError {
    pub fn new(
        code: ErrorCode,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        label: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            file: file.into(),
            line,
            label: label.into(),
            trace: Vec::new(),
        }
    }

    pub fn with_trace(mut self, trace: Vec<Frame>) -> Self {
        self.trace = trace;
        self
    }

    /// `file:line`, or "unknown location" for synthetic events
    pub fn location(&self) -> String {
        if self.file.is_empty() {
            "unknown location".to_string()
        } else {
            format!("{}:{}", self.file, self.line)
        }
    }
}

/// Renders errors for the person looking at the output
pub trait ErrorPresenter: Send + Sync {
    fn present(
        &self,
        error: &PresentedError,
        environment: &dyn Environment,
    ) -> Result<(), PresentError>;
}
