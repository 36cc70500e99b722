//! In-process runtime
//!
//! Holds the handler slots for the current process. Errors are raised into it
//! explicitly by the host, panics can be forwarded into the exception slot.

use super::{
    ErrorHandler, EventKind, ExceptionHandler, ExceptionInfo, HandlerResult, Handling,
    InstalledErrorHandler, RawError, Runtime, ShutdownHook,
};
use crate::codes::{ErrorCode, ReportLevel};
use crate::config::constants;
use crate::error::BridgeResult;
use crate::sync::lock;
use std::panic;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

static GLOBAL: OnceLock<Arc<ProcessRuntime>> = OnceLock::new();

/// Runtime backed by the current process
///
/// The memory ceilings are bookkeeping only; nothing here enforces them.
/// Shutdown hooks run only when the host calls [`shutdown`](Self::shutdown)
/// or [`Runtime::terminate`]. A host with a real allocator guard or exit
/// hook must feed [`record_fatal`](Self::record_fatal) and `shutdown` itself.
pub struct ProcessRuntime {
    error_handler: Mutex<Option<InstalledErrorHandler>>,
    exception_handler: Mutex<Option<ExceptionHandler>>,
    shutdown_hooks: Mutex<Vec<ShutdownHook>>,
    shut_down: AtomicBool,
    last_error: Mutex<Option<RawError>>,
    reporting: AtomicU32,
    // 0 means no ceiling
    memory_limit: AtomicU64,
    hard_memory_limit: AtomicU64,
}

impl ProcessRuntime {
    pub fn new() -> Self {
        Self {
            error_handler: Mutex::new(None),
            exception_handler: Mutex::new(None),
            shutdown_hooks: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
            last_error: Mutex::new(None),
            reporting: AtomicU32::new(ReportLevel::ALL.bits()),
            memory_limit: AtomicU64::new(0),
            hard_memory_limit: AtomicU64::new(0),
        }
    }

    /// The process-wide instance
    pub fn global() -> Arc<ProcessRuntime> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ProcessRuntime::new())))
    }

    pub fn set_error_reporting(&self, level: ReportLevel) -> ReportLevel {
        ReportLevel::new(self.reporting.swap(level.bits(), Ordering::SeqCst))
    }

    /// Declare the ceiling enforced by an outside memory guard
    pub fn set_hard_memory_limit(&self, bytes: Option<u64>) {
        self.hard_memory_limit
            .store(bytes.unwrap_or(0), Ordering::SeqCst);
    }

    /// Dispatch a recoverable error to the installed handler.
    ///
    /// Codes outside the handler's mask, a missing handler and a handler
    /// answering `Fallthrough` all leave the error recorded as the last error.
    pub fn raise(&self, error: RawError) -> HandlerResult {
        // clone out of the slot, the handler may reinstall handlers
        let installed = lock(&self.error_handler).clone();

        if let Some(installed) = installed {
            if installed.mask.allows(error.code) && (installed.handler)(&error)? == Handling::Handled {
                return Ok(Handling::Handled);
            }
        }

        log::trace!(
            target: constants::LOG_TARGET,
            "error {} left to the runtime: {}",
            error.code,
            error.message
        );
        *lock(&self.last_error) = Some(error);
        Ok(Handling::Fallthrough)
    }

    /// Dispatch an uncaught exception to the installed handler.
    ///
    /// Without a handler the exception becomes a fatal last error, which
    /// shutdown handling will pick up. Returns whether a handler ran.
    pub fn throw(&self, exception: &ExceptionInfo) -> BridgeResult<bool> {
        let handler = lock(&self.exception_handler).clone();

        match handler {
            Some(handler) => {
                handler(exception)?;
                Ok(true)
            }
            None => {
                let error = RawError {
                    kind: EventKind::UncaughtException,
                    ..RawError::fatal(ErrorCode::FATAL, exception.headline())
                        .at(exception.file.clone(), exception.line)
                };
                *lock(&self.last_error) = Some(error);
                Ok(false)
            }
        }
    }

    /// Store a fatal error the way the runtime does right before it shuts down
    pub fn record_fatal(&self, error: RawError) {
        let error = RawError {
            kind: EventKind::ProcessTermination,
            ..error
        };
        *lock(&self.last_error) = Some(error);
    }

    pub fn clear_last_error(&self) {
        *lock(&self.last_error) = None;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Run every shutdown hook, once per runtime.
    ///
    /// All hooks run even when one fails; the first failure is returned.
    pub fn shutdown(&self) -> BridgeResult<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // hooks may touch the runtime, so run them outside the lock
        let hooks = std::mem::take(&mut *lock(&self.shutdown_hooks));
        let mut first_error = None;

        for hook in &hooks {
            if let Err(err) = hook() {
                log::error!(target: constants::LOG_TARGET, "shutdown hook failed: {}", err);
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Route panics into the exception slot.
    ///
    /// When no exception handler is installed, or the runtime is gone, the
    /// panic hook that was active before takes over.
    pub fn forward_panics(self: &Arc<Self>) {
        let runtime = Arc::downgrade(self);
        let previous = panic::take_hook();

        panic::set_hook(Box::new(move |info| {
            let handler = runtime
                .upgrade()
                .and_then(|runtime| lock(&runtime.exception_handler).clone());

            match handler {
                Some(handler) => {
                    let exception = ExceptionInfo::from_panic(info.payload(), info.location());
                    if let Err(err) = handler(&exception) {
                        log::error!(
                            target: constants::LOG_TARGET,
                            "exception handler failed for panic: {}",
                            err
                        );
                    }
                }
                None => previous(info),
            }
        }));
    }
}

impl Default for ProcessRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime for ProcessRuntime {
    fn set_error_handler(
        &self,
        handler: ErrorHandler,
        mask: ReportLevel,
    ) -> Option<InstalledErrorHandler> {
        lock(&self.error_handler).replace(InstalledErrorHandler::new(handler, mask))
    }

    fn set_exception_handler(&self, handler: ExceptionHandler) -> Option<ExceptionHandler> {
        lock(&self.exception_handler).replace(handler)
    }

    fn register_shutdown(&self, hook: ShutdownHook) {
        lock(&self.shutdown_hooks).push(hook);
    }

    fn error_reporting(&self) -> ReportLevel {
        ReportLevel::new(self.reporting.load(Ordering::SeqCst))
    }

    fn last_error(&self) -> Option<RawError> {
        lock(&self.last_error).clone()
    }

    fn memory_limit(&self) -> Option<u64> {
        match self.memory_limit.load(Ordering::SeqCst) {
            0 => None,
            bytes => Some(bytes),
        }
    }

    fn set_memory_limit(&self, bytes: u64) {
        self.memory_limit.store(bytes, Ordering::SeqCst);
    }

    fn hard_memory_limit(&self) -> Option<u64> {
        match self.hard_memory_limit.load(Ordering::SeqCst) {
            0 => None,
            bytes => Some(bytes),
        }
    }

    fn terminate(&self, status: i32) {
        if let Err(err) = self.shutdown() {
            log::error!(target: constants::LOG_TARGET, "shutdown before exit failed: {}", err);
        }
        process::exit(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use assert_matches::assert_matches;
    use std::sync::atomic::AtomicUsize;

    fn counting_handler(counter: Arc<AtomicUsize>, handling: Handling) -> ErrorHandler {
        Arc::new(move |_: &RawError| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(handling)
        })
    }

    #[test]
    fn test_set_handler_returns_previous() {
        let runtime = ProcessRuntime::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let previous = runtime.set_error_handler(
            counting_handler(Arc::clone(&counter), Handling::Handled),
            ReportLevel::ALL,
        );
        assert!(previous.is_none());

        let previous = runtime
            .set_error_handler(super::super::noop_error_handler(), ReportLevel::NONE)
            .unwrap();
        assert_eq!(previous.mask, ReportLevel::ALL);

        (previous.handler)(&RawError::new(ErrorCode::NOTICE, "direct")).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_raise_honours_mask() {
        let runtime = ProcessRuntime::new();
        let counter = Arc::new(AtomicUsize::new(0));
        runtime.set_error_handler(
            counting_handler(Arc::clone(&counter), Handling::Handled),
            ReportLevel::from(ErrorCode::WARNING),
        );

        let handled = runtime
            .raise(RawError::new(ErrorCode::WARNING, "inside mask"))
            .unwrap();
        assert_eq!(handled, Handling::Handled);
        assert!(runtime.last_error().is_none());

        let handled = runtime
            .raise(RawError::new(ErrorCode::NOTICE, "outside mask"))
            .unwrap();
        assert_eq!(handled, Handling::Fallthrough);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.last_error().unwrap().message, "outside mask");
    }

    #[test]
    fn test_raise_fallthrough_records_last_error() {
        let runtime = ProcessRuntime::new();
        let counter = Arc::new(AtomicUsize::new(0));
        runtime.set_error_handler(
            counting_handler(Arc::clone(&counter), Handling::Fallthrough),
            ReportLevel::ALL,
        );

        runtime
            .raise(RawError::new(ErrorCode::USER_NOTICE, "passed on").at("app.rs", 4))
            .unwrap();

        let last = runtime.last_error().unwrap();
        assert_eq!(last.file, "app.rs");
        assert_eq!(last.kind, EventKind::Recoverable);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_raise_propagates_handler_failure() {
        let runtime = ProcessRuntime::new();
        runtime.set_error_handler(
            Arc::new(|error: &RawError| Err(BridgeError::Unclassified { code: error.code })),
            ReportLevel::ALL,
        );

        assert_matches!(
            runtime.raise(RawError::new(ErrorCode::new(1 << 20), "odd")),
            Err(BridgeError::Unclassified { .. })
        );
    }

    #[test]
    fn test_throw_without_handler_records_fatal() {
        let runtime = ProcessRuntime::new();
        let exception = ExceptionInfo::new("LogicError", "bad state").at("core.rs", 12);

        assert!(!runtime.throw(&exception).unwrap());

        let last = runtime.last_error().unwrap();
        assert_eq!(last.code, ErrorCode::FATAL);
        assert_eq!(last.message, "Uncaught LogicError: bad state");
        assert_eq!(last.kind, EventKind::UncaughtException);
        assert_eq!(last.line, 12);

        runtime.clear_last_error();
        assert!(runtime.last_error().is_none());
    }

    #[test]
    fn test_throw_with_handler() {
        let runtime = ProcessRuntime::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        runtime.set_exception_handler(Arc::new(move |exception: &ExceptionInfo| {
            lock(&sink).push(exception.message.clone());
            Ok(())
        }));

        assert!(runtime.throw(&ExceptionInfo::new("E", "caught")).unwrap());
        assert_eq!(*lock(&seen), vec!["caught".to_string()]);
        assert!(runtime.last_error().is_none());
    }

    #[test]
    fn test_shutdown_runs_hooks_once() {
        let runtime = ProcessRuntime::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let counter = Arc::clone(&counter);
            runtime.register_shutdown(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        runtime.shutdown().unwrap();
        runtime.shutdown().unwrap();

        assert!(runtime.is_shut_down());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shutdown_reports_first_failure_after_all_hooks() {
        let runtime = ProcessRuntime::new();
        let counter = Arc::new(AtomicUsize::new(0));

        runtime.register_shutdown(Box::new(|| {
            Err(BridgeError::Configuration {
                reason: "first".to_string(),
            })
        }));
        let tail = Arc::clone(&counter);
        runtime.register_shutdown(Box::new(move || {
            tail.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        assert_matches!(
            runtime.shutdown(),
            Err(BridgeError::Configuration { ref reason }) if reason == "first"
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_memory_limits() {
        let runtime = ProcessRuntime::new();
        assert_eq!(runtime.memory_limit(), None);
        assert_eq!(runtime.hard_memory_limit(), None);

        runtime.set_memory_limit(64 * 1024);
        runtime.set_hard_memory_limit(Some(128 * 1024));
        assert_eq!(runtime.memory_limit(), Some(64 * 1024));
        assert_eq!(runtime.hard_memory_limit(), Some(128 * 1024));

        runtime.set_hard_memory_limit(None);
        assert_eq!(runtime.hard_memory_limit(), None);
    }

    #[test]
    fn test_error_reporting_swap() {
        let runtime = ProcessRuntime::new();
        assert_eq!(runtime.error_reporting(), ReportLevel::ALL);

        let previous = runtime.set_error_reporting(ReportLevel::NONE);
        assert_eq!(previous, ReportLevel::ALL);
        assert!(runtime.error_reporting().is_suppressed());
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&ProcessRuntime::global(), &ProcessRuntime::global()));
    }

    #[test]
    fn test_forward_panics_to_exception_slot() {
        const MARKER: &str = "forwarded panic marker";

        let runtime = Arc::new(ProcessRuntime::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        runtime.set_exception_handler(Arc::new(move |exception: &ExceptionInfo| {
            // the hook is process-wide, other tests may panic concurrently
            if exception.message == MARKER {
                lock(&sink).push(exception.clone());
            }
            Ok(())
        }));
        runtime.forward_panics();

        let result = std::thread::spawn(|| panic!("{}", MARKER)).join();
        assert!(result.is_err());

        let seen = lock(&seen);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].type_name, "panic");
        assert!(seen[0].file.ends_with("process.rs"));
    }
}
