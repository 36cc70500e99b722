//! Test doubles shared by the unit tests

use crate::codes::ReportLevel;
use crate::environment::Environment;
use crate::error::{BridgeResult, PresentError};
use crate::logging::{Fields, LogRecord, MemoryLogger, Severity};
use crate::presenter::{ErrorPresenter, PresentedError};
use crate::runtime::{
    ErrorHandler, ExceptionHandler, ExceptionInfo, HandlerResult, InstalledErrorHandler,
    ProcessRuntime, RawError, Runtime, ShutdownHook,
};
use crate::sync::lock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_test_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}

/// Ordered record of side effects across several doubles
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        lock(&self.0).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        lock(&self.0).iter().position(|candidate| candidate == entry)
    }

    pub fn count(&self, prefix: &str) -> usize {
        lock(&self.0)
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }
}

/// Process runtime that counts installs and never exits
pub struct RecordingRuntime {
    inner: ProcessRuntime,
    journal: Journal,
    error_installs: AtomicUsize,
    exception_installs: AtomicUsize,
    shutdown_registrations: AtomicUsize,
    terminations: Mutex<Vec<i32>>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::with_journal(Journal::new())
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            inner: ProcessRuntime::new(),
            journal,
            error_installs: AtomicUsize::new(0),
            exception_installs: AtomicUsize::new(0),
            shutdown_registrations: AtomicUsize::new(0),
            terminations: Mutex::new(Vec::new()),
        }
    }

    pub fn raise(&self, error: RawError) -> HandlerResult {
        self.inner.raise(error)
    }

    pub fn throw(&self, exception: &ExceptionInfo) -> BridgeResult<bool> {
        self.inner.throw(exception)
    }

    pub fn record_fatal(&self, error: RawError) {
        self.inner.record_fatal(error);
    }

    pub fn clear_last_error(&self) {
        self.inner.clear_last_error();
    }

    pub fn shutdown(&self) -> BridgeResult<()> {
        self.inner.shutdown()
    }

    pub fn set_error_reporting(&self, level: ReportLevel) {
        self.inner.set_error_reporting(level);
    }

    pub fn set_hard_memory_limit(&self, bytes: Option<u64>) {
        self.inner.set_hard_memory_limit(bytes);
    }

    pub fn error_installs(&self) -> usize {
        self.error_installs.load(Ordering::SeqCst)
    }

    pub fn exception_installs(&self) -> usize {
        self.exception_installs.load(Ordering::SeqCst)
    }

    pub fn shutdown_registrations(&self) -> usize {
        self.shutdown_registrations.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> Vec<i32> {
        lock(&self.terminations).clone()
    }
}

impl Runtime for RecordingRuntime {
    fn set_error_handler(
        &self,
        handler: ErrorHandler,
        mask: ReportLevel,
    ) -> Option<InstalledErrorHandler> {
        self.error_installs.fetch_add(1, Ordering::SeqCst);
        self.inner.set_error_handler(handler, mask)
    }

    fn set_exception_handler(&self, handler: ExceptionHandler) -> Option<ExceptionHandler> {
        self.exception_installs.fetch_add(1, Ordering::SeqCst);
        self.inner.set_exception_handler(handler)
    }

    fn register_shutdown(&self, hook: ShutdownHook) {
        self.shutdown_registrations.fetch_add(1, Ordering::SeqCst);
        self.inner.register_shutdown(hook);
    }

    fn error_reporting(&self) -> ReportLevel {
        self.inner.error_reporting()
    }

    fn last_error(&self) -> Option<RawError> {
        self.inner.last_error()
    }

    fn memory_limit(&self) -> Option<u64> {
        self.inner.memory_limit()
    }

    fn set_memory_limit(&self, bytes: u64) {
        self.journal.push(format!("memory:set:{}", bytes));
        self.inner.set_memory_limit(bytes);
    }

    fn hard_memory_limit(&self) -> Option<u64> {
        self.inner.hard_memory_limit()
    }

    fn terminate(&self, status: i32) {
        self.journal.push(format!("terminate:{}", status));
        lock(&self.terminations).push(status);
        // same hook run as a real exit, without leaving the test process
        if let Err(err) = self.inner.shutdown() {
            log::error!("shutdown during terminate failed: {}", err);
        }
    }
}

/// Logger that keeps records and notes each call in a journal
pub struct JournalLogger {
    journal: Journal,
    records: MemoryLogger,
}

impl JournalLogger {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            records: MemoryLogger::new(),
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.records()
    }

    pub fn count_at(&self, severity: Severity) -> usize {
        self.records.count_at(severity)
    }

    fn write(&self, severity: Severity, message: &str, fields: &Fields) {
        self.journal.push(format!("log:{}", severity));
        severity.dispatch(&self.records, message, fields);
    }
}

impl_leveled_logger!(JournalLogger);

/// Presenter that records what it was asked to show
pub struct RecordingPresenter {
    journal: Journal,
    presented: Mutex<Vec<PresentedError>>,
    failing: bool,
}

impl RecordingPresenter {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            presented: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    /// Presenter that records the call and then fails
    pub fn failing(journal: Journal) -> Self {
        Self {
            failing: true,
            ..Self::new(journal)
        }
    }

    pub fn presented(&self) -> Vec<PresentedError> {
        lock(&self.presented).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.presented).len()
    }
}

impl ErrorPresenter for RecordingPresenter {
    fn present(
        &self,
        error: &PresentedError,
        _environment: &dyn Environment,
    ) -> Result<(), PresentError> {
        self.journal.push(format!("present:{}", error.label));
        lock(&self.presented).push(error.clone());

        if self.failing {
            return Err(PresentError::Formatter {
                reason: "renderer unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Environment that counts how often it is asked
#[derive(Debug, Default)]
pub struct CountingEnvironment {
    live: bool,
    queries: AtomicUsize,
}

impl CountingEnvironment {
    pub fn new(live: bool) -> Self {
        Self {
            live,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl Environment for CountingEnvironment {
    fn is_live(&self) -> bool {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.live
    }
}
