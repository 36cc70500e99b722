// Internal modules
pub mod backtrace;
pub mod bridge;
pub mod classifier;
pub mod codes;
pub mod config;
pub mod environment;
pub mod error;
#[macro_use]
pub mod logging;
pub mod memory;
pub mod presenter;
pub mod runtime;

pub(crate) mod sync;

#[cfg(test)]
mod testing;

#[doc(hidden)]
pub use serde_json as __serde_json;

// Re-export key types for library consumers
pub use bridge::{Context, HandlerRegistration, LoggerBridge, LoggerBridgeBuilder, UnitOfWork};
pub use classifier::{SeverityClassifier, SeverityGroup, SeverityMapping};
pub use codes::{ErrorCode, ReportLevel};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult, PresentError};
pub use logging::{Fields, Logger, Severity};
pub use runtime::{ExceptionInfo, ProcessRuntime, RawError, Runtime};
