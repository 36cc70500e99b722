//! Host runtime seam
//!
//! The runtime owns the process-wide handler slots: one error intercept, one
//! exception intercept and a list of shutdown hooks. Installing a handler
//! hands back whatever was installed before so callers can restore it.

mod process;

pub use process::ProcessRuntime;

use crate::backtrace::{capture_stack, Frame};
use crate::codes::{ErrorCode, ReportLevel};
use crate::config::constants;
use crate::error::BridgeResult;
use std::any::Any;
use std::panic::Location;
use std::sync::Arc;

// ============================================================================
// EVENTS
// ============================================================================

/// Which runtime path produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Recoverable,
    UncaughtException,
    ProcessTermination,
}

/// Error signal raised by the host runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawError {
    pub code: ErrorCode,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub kind: EventKind,
}

impl RawError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file: String::new(),
            line: 0,
            kind: EventKind::Recoverable,
        }
    }

    /// A fatal record as left behind for shutdown handling
    pub fn fatal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::ProcessTermination,
            ..Self::new(code, message)
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }
}

/// Error value that escaped every handling scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub type_name: String,
    pub message: String,
    pub code: ErrorCode,
    pub file: String,
    pub line: u32,
    pub trace: Vec<Frame>,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            code: ErrorCode::new(0),
            file: String::new(),
            line: 0,
            trace: Vec::new(),
        }
    }

    /// Build from an error value, capturing the current stack as its trace
    #[track_caller]
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let location = Location::caller();
        let type_name = std::any::type_name::<E>();
        Self::new(short_type_name(type_name), error.to_string())
            .at(location.file(), location.line())
            .with_trace(capture_stack())
    }

    /// Build from a panic payload and location
    pub fn from_panic(payload: &(dyn Any + Send), location: Option<&Location<'_>>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };

        let exception = Self::new("panic", message).with_trace(capture_stack());
        match location {
            Some(location) => exception.at(location.file(), location.line()),
            None => exception,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = code;
        self
    }

    pub fn with_trace(mut self, trace: Vec<Frame>) -> Self {
        self.trace = trace;
        self
    }

    /// Log message: `Uncaught <TypeName>: <message>`
    pub fn headline(&self) -> String {
        format!(
            "{} {}: {}",
            constants::UNCAUGHT_PREFIX,
            self.type_name,
            self.message
        )
    }
}

fn short_type_name(full: &str) -> &str {
    // keep generic arguments intact, strip the module path of the outer type
    let outer = full.split('<').next().unwrap_or(full);
    match outer.rfind("::") {
        Some(index) => &full[index + 2..],
        None => full,
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// What an error intercept did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    /// Event fully handled, the runtime must not process it further
    Handled,
    /// Runtime continues with its built-in handling
    Fallthrough,
}

pub type HandlerResult = BridgeResult<Handling>;

pub type ErrorHandler = Arc<dyn Fn(&RawError) -> HandlerResult + Send + Sync>;

pub type ExceptionHandler = Arc<dyn Fn(&ExceptionInfo) -> BridgeResult<()> + Send + Sync>;

pub type ShutdownHook = Box<dyn Fn() -> BridgeResult<()> + Send + Sync>;

/// An error intercept together with the mask it was installed with
#[derive(Clone)]
pub struct InstalledErrorHandler {
    pub handler: ErrorHandler,
    pub mask: ReportLevel,
}

impl InstalledErrorHandler {
    pub fn new(handler: ErrorHandler, mask: ReportLevel) -> Self {
        Self { handler, mask }
    }
}

impl std::fmt::Debug for InstalledErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstalledErrorHandler")
            .field("mask", &self.mask)
            .finish_non_exhaustive()
    }
}

/// Error intercept that swallows every event
pub fn noop_error_handler() -> ErrorHandler {
    Arc::new(|_: &RawError| Ok(Handling::Handled))
}

/// Exception intercept that ignores every exception
pub fn noop_exception_handler() -> ExceptionHandler {
    Arc::new(|_: &ExceptionInfo| Ok(()))
}

// ============================================================================
// RUNTIME TRAIT
// ============================================================================

/// Process-wide handler slots and limits of the host runtime
pub trait Runtime: Send + Sync {
    /// Install the error intercept, returning the one it replaced
    fn set_error_handler(
        &self,
        handler: ErrorHandler,
        mask: ReportLevel,
    ) -> Option<InstalledErrorHandler>;

    /// Install the exception intercept, returning the one it replaced
    fn set_exception_handler(&self, handler: ExceptionHandler) -> Option<ExceptionHandler>;

    /// Add a hook run on every process shutdown, normal or not
    fn register_shutdown(&self, hook: ShutdownHook);

    /// Ambient reporting level
    fn error_reporting(&self) -> ReportLevel;

    /// Last error the runtime recorded without a handler consuming it
    fn last_error(&self) -> Option<RawError>;

    /// Soft memory ceiling in bytes, `None` when unlimited
    fn memory_limit(&self) -> Option<u64>;

    fn set_memory_limit(&self, bytes: u64);

    /// Ceiling enforced by an outside guard that the soft ceiling cannot exceed
    fn hard_memory_limit(&self) -> Option<u64>;

    /// End the process with `status`
    fn terminate(&self, status: i32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct SampleError;

    impl std::fmt::Display for SampleError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("sample failure")
        }
    }

    impl std::error::Error for SampleError {}

    #[test]
    fn test_headline_format() {
        let exception = ExceptionInfo::new("Exception", "Message");
        assert_eq!(exception.headline(), "Uncaught Exception: Message");
    }

    #[test]
    fn test_from_error() {
        let exception = ExceptionInfo::from_error(&SampleError);

        assert_eq!(exception.type_name, "SampleError");
        assert_eq!(exception.message, "sample failure");
        assert!(exception.file.ends_with("mod.rs"));
        assert!(exception.line > 0);
    }

    #[test]
    fn test_from_panic_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        let exception = ExceptionInfo::from_panic(payload.as_ref(), None);
        assert_eq!(exception.type_name, "panic");
        assert_eq!(exception.message, "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let exception = ExceptionInfo::from_panic(payload.as_ref(), Some(Location::caller()));
        assert_eq!(exception.message, "owned message");
        assert!(exception.line > 0);

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        let exception = ExceptionInfo::from_panic(payload.as_ref(), None);
        assert_eq!(exception.message, "Box<dyn Any>");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("std::io::Error"), "Error");
        assert_eq!(short_type_name("Plain"), "Plain");
        assert_eq!(
            short_type_name("app::Wrapper<std::io::Error>"),
            "Wrapper<std::io::Error>"
        );
    }

    #[test]
    fn test_noop_handlers() {
        let error = RawError::new(ErrorCode::WARNING, "ignored");
        assert_eq!((noop_error_handler())(&error).unwrap(), Handling::Handled);
        assert!((noop_exception_handler())(&ExceptionInfo::new("E", "m")).is_ok());
    }
}
