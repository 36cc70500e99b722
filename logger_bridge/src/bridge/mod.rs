//! # Logger Bridge
//!
//! Routes the runtime's error, exception and shutdown signals into a leveled
//! [`Logger`], presenting them to the user when the display gate allows.
//!
//! The bridge is attached around a unit of work. Attaching snapshots the
//! handlers that were installed before and detaching puts them back, so
//! nothing leaks between units of work. The shutdown hook is installed on the
//! first attach and stays for the life of the process; it only acts while the
//! bridge is attached and the runtime left a fatal error behind.

mod scope;

pub use scope::{Context, UnitOfWork};

use crate::backtrace::{BacktraceCollector, BasicBacktraceCollector, Frame};
use crate::classifier::{is_fatal, SeverityClassifier, SeverityMapping};
use crate::codes::{ErrorCode, ReportLevel};
use crate::config::{constants, BridgeConfig};
use crate::environment::{EnvVarEnvironment, Environment};
use crate::error::BridgeResult;
use crate::logging::{Fields, Logger, Severity};
use crate::memory::{is_exhaustion_message, MemoryReserve, MemorySize};
use crate::presenter::{DebugPresenter, ErrorPresenter, PresentedError};
use crate::runtime::{
    noop_error_handler, noop_exception_handler, ErrorHandler, ExceptionHandler, ExceptionInfo,
    HandlerResult, Handling, InstalledErrorHandler, ProcessRuntime, RawError, Runtime,
};
use crate::sync::{lock, read, write};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, RwLock};

/// Registration state of the bridge's handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerRegistration {
    /// Never attached in this process
    #[default]
    Unset,
    Registered,
    Unregistered,
}

#[derive(Debug, Clone)]
struct Settings {
    show_errors: bool,
    report_level: Option<ReportLevel>,
    report_backtrace: bool,
    presentable: BTreeSet<Severity>,
}

#[derive(Default)]
struct HandlerState {
    registration: HandlerRegistration,
    previous_error: Option<InstalledErrorHandler>,
    previous_exception: Option<ExceptionHandler>,
}

/// Error, exception and fatal-event interceptor writing into a leveled logger
pub struct LoggerBridge {
    runtime: Arc<dyn Runtime>,
    logger: RwLock<Arc<dyn Logger>>,
    presenter: RwLock<Option<Arc<dyn ErrorPresenter>>>,
    environment: RwLock<Option<Arc<dyn Environment>>>,
    backtrace: RwLock<Option<Arc<dyn BacktraceCollector>>>,
    settings: RwLock<Settings>,
    classifier: RwLock<SeverityClassifier>,
    reserve: MemoryReserve,
    state: Mutex<HandlerState>,
    context: RwLock<Option<Context>>,
}

impl LoggerBridge {
    pub fn builder(logger: Arc<dyn Logger>) -> LoggerBridgeBuilder {
        LoggerBridgeBuilder::new(logger)
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Install the error and exception intercepts; a no-op while registered.
    ///
    /// The first attach in the process also installs the shutdown hook and
    /// takes the memory reservation under a hard ceiling.
    pub fn attach(self: &Arc<Self>) {
        let mut state = lock(&self.state);
        if state.registration == HandlerRegistration::Registered {
            return;
        }

        let mask = self.install_mask();
        state.previous_error = self
            .runtime
            .set_error_handler(self.error_intercept(), mask);
        state.previous_exception = self
            .runtime
            .set_exception_handler(self.exception_intercept());

        if state.registration == HandlerRegistration::Unset {
            let bridge = Arc::downgrade(self);
            self.runtime.register_shutdown(Box::new(move || {
                match bridge.upgrade() {
                    Some(bridge) => bridge.on_process_termination(),
                    None => Ok(()),
                }
            }));
            self.reserve.reserve(self.runtime.as_ref());
        }

        state.registration = HandlerRegistration::Registered;
        log::debug!(
            target: constants::LOG_TARGET,
            "handlers attached with mask {:#x}",
            mask.bits()
        );
    }

    /// Restore the handlers that were active before `attach`; a no-op unless registered
    pub fn detach(&self) {
        let mut state = lock(&self.state);
        if state.registration != HandlerRegistration::Registered {
            return;
        }

        let (handler, mask) = match state.previous_error.take() {
            Some(previous) => (previous.handler, previous.mask),
            None => (noop_error_handler(), ReportLevel::ALL),
        };
        self.runtime.set_error_handler(handler, mask);

        let exception_handler = state
            .previous_exception
            .take()
            .unwrap_or_else(noop_exception_handler);
        self.runtime.set_exception_handler(exception_handler);

        state.registration = HandlerRegistration::Unregistered;
        log::debug!(target: constants::LOG_TARGET, "handlers detached");
    }

    pub fn registration(&self) -> HandlerRegistration {
        lock(&self.state).registration
    }

    pub fn is_registered(&self) -> bool {
        self.registration() == HandlerRegistration::Registered
    }

    fn install_mask(&self) -> ReportLevel {
        read(&self.settings)
            .report_level
            .unwrap_or_else(|| self.runtime.error_reporting())
    }

    fn error_intercept(self: &Arc<Self>) -> ErrorHandler {
        let bridge = Arc::downgrade(self);
        Arc::new(move |error: &RawError| match bridge.upgrade() {
            Some(bridge) => bridge.on_recoverable_error(error),
            None => Ok(Handling::Fallthrough),
        })
    }

    fn exception_intercept(self: &Arc<Self>) -> ExceptionHandler {
        let bridge = Arc::downgrade(self);
        Arc::new(move |exception: &ExceptionInfo| match bridge.upgrade() {
            Some(bridge) => bridge.on_uncaught_exception(exception),
            None => Ok(()),
        })
    }

    // ========================================================================
    // INTERCEPTS
    // ========================================================================

    /// Log a recoverable error and present it when the display gate allows.
    ///
    /// Terminating codes end the process through the runtime once logged and
    /// presented, releasing the memory reserve first on exhaustion. Codes
    /// without a severity group fail with `Unclassified`.
    pub fn on_recoverable_error(&self, error: &RawError) -> HandlerResult {
        let reporting = self.runtime.error_reporting();
        if reporting.is_suppressed() {
            return Ok(Handling::Handled);
        }

        let (severity, terminating) = {
            let classifier = read(&self.classifier);
            (
                classifier.classify_or_err(error.code)?,
                classifier.is_terminating(error.code),
            )
        };

        if terminating {
            self.release_reserve(&error.message);
        }

        let settings = read(&self.settings).clone();
        let trace = self.capture_trace(&settings, None);
        let fields = self.record_fields(&error.file, error.line, trace.as_deref());
        severity.dispatch(self.logger().as_ref(), &error.message, &fields);

        let presented = if settings.presentable.contains(&severity)
            && reporting.allows(error.code)
            && self.display_allowed(&settings)
        {
            self.present(
                PresentedError::new(
                    error.code,
                    error.message.clone(),
                    error.file.clone(),
                    error.line,
                    severity.title(),
                )
                .with_trace(trace.unwrap_or_default()),
            )
        } else {
            Ok(())
        };

        if terminating {
            log::debug!(
                target: constants::LOG_TARGET,
                "terminating after error {}",
                error.code
            );
            self.runtime.terminate(constants::TERMINATION_EXIT_STATUS);
        }

        presented?;
        Ok(Handling::Handled)
    }

    /// Log an uncaught exception as `Uncaught <Type>: <message>` and present it
    pub fn on_uncaught_exception(&self, exception: &ExceptionInfo) -> BridgeResult<()> {
        let settings = read(&self.settings).clone();
        let trace = self.capture_trace(&settings, Some(exception));
        let fields = self.record_fields(&exception.file, exception.line, trace.as_deref());
        self.logger().error(&exception.headline(), &fields);

        if self.display_allowed(&settings) {
            self.present(
                PresentedError::new(
                    exception.code,
                    exception.message.clone(),
                    exception.file.clone(),
                    exception.line,
                    Severity::Error.title(),
                )
                .with_trace(trace.unwrap_or_else(|| exception.trace.clone())),
            )?;
        }
        Ok(())
    }

    /// Shutdown hook: log the fatal error the runtime left behind.
    ///
    /// Runs on every process exit, so it does nothing unless the bridge is
    /// registered and the last error is fatal. Memory exhaustion releases
    /// the reserve before anything is logged.
    pub fn on_process_termination(&self) -> BridgeResult<()> {
        if !self.is_registered() {
            log::trace!(target: constants::LOG_TARGET, "shutdown while not registered");
            return Ok(());
        }

        let error = match self.runtime.last_error() {
            Some(error) if is_fatal(error.code) => error,
            _ => return Ok(()),
        };

        self.release_reserve(&error.message);

        let settings = read(&self.settings).clone();
        let trace = self.capture_trace(&settings, None);
        let fields = self.record_fields(&error.file, error.line, trace.as_deref());
        self.logger().critical(&error.message, &fields);

        if self.display_allowed(&settings) {
            self.present(
                PresentedError::new(
                    error.code,
                    error.message.clone(),
                    error.file.clone(),
                    error.line,
                    Severity::Critical.title(),
                )
                .with_trace(trace.unwrap_or_default()),
            )?;
        }
        Ok(())
    }

    // ========================================================================
    // RECORD BUILDING
    // ========================================================================

    /// Give the reserved memory back when `message` reports exhaustion
    fn release_reserve(&self, message: &str) {
        if !is_exhaustion_message(message) {
            return;
        }
        if let Some(limit) = self.reserve.restore(self.runtime.as_ref()) {
            log::trace!(
                target: constants::LOG_TARGET,
                "memory ceiling raised to {} bytes",
                limit
            );
        }
    }

    fn display_allowed(&self, settings: &Settings) -> bool {
        settings.show_errors || self.environment().is_live()
    }

    fn capture_trace(
        &self,
        settings: &Settings,
        origin: Option<&ExceptionInfo>,
    ) -> Option<Vec<Frame>> {
        if !settings.report_backtrace {
            return None;
        }
        Some(self.backtrace_collector().capture(origin).collect())
    }

    fn record_fields(&self, file: &str, line: u32, trace: Option<&[Frame]>) -> Fields {
        let mut fields = Fields::new();
        fields.insert(constants::fields::FILE.to_string(), Value::from(file));
        fields.insert(constants::fields::LINE.to_string(), Value::from(line));

        if let Some(trace) = trace {
            match serde_json::to_value(trace) {
                Ok(value) => {
                    fields.insert(constants::fields::BACKTRACE.to_string(), value);
                }
                Err(err) => log::warn!(
                    target: constants::LOG_TARGET,
                    "backtrace could not be serialized: {}",
                    err
                ),
            }
        }

        if let Some(context) = read(&self.context).as_ref() {
            if !context.is_empty() {
                fields.insert(
                    constants::fields::CONTEXT.to_string(),
                    Value::Object(context.clone().into_iter().collect()),
                );
            }
        }

        fields
    }

    fn present(&self, error: PresentedError) -> BridgeResult<()> {
        let environment = self.environment();
        self.presenter().present(&error, environment.as_ref())?;
        Ok(())
    }

    // ========================================================================
    // COMPONENTS
    // ========================================================================

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&read(&self.logger))
    }

    pub fn set_logger(&self, logger: Arc<dyn Logger>) {
        *write(&self.logger) = logger;
    }

    /// The presenter, a `DebugPresenter` on stderr unless one was set
    pub fn presenter(&self) -> Arc<dyn ErrorPresenter> {
        if let Some(presenter) = read(&self.presenter).as_ref() {
            return Arc::clone(presenter);
        }
        let mut presenter = write(&self.presenter);
        Arc::clone(presenter.get_or_insert_with(|| Arc::new(DebugPresenter::stderr())))
    }

    pub fn set_presenter(&self, presenter: Arc<dyn ErrorPresenter>) {
        *write(&self.presenter) = Some(presenter);
    }

    /// The environment oracle, read from `LOGGER_BRIDGE_ENV` unless one was set
    pub fn environment(&self) -> Arc<dyn Environment> {
        if let Some(environment) = read(&self.environment).as_ref() {
            return Arc::clone(environment);
        }
        let mut environment = write(&self.environment);
        Arc::clone(environment.get_or_insert_with(|| Arc::new(EnvVarEnvironment::new())))
    }

    pub fn set_environment(&self, environment: Arc<dyn Environment>) {
        *write(&self.environment) = Some(environment);
    }

    /// The backtrace collector, an unlimited basic collector unless one was set
    pub fn backtrace_collector(&self) -> Arc<dyn BacktraceCollector> {
        if let Some(collector) = read(&self.backtrace).as_ref() {
            return Arc::clone(collector);
        }
        let mut collector = write(&self.backtrace);
        Arc::clone(collector.get_or_insert_with(|| Arc::new(BasicBacktraceCollector::default())))
    }

    pub fn set_backtrace_collector(&self, collector: Arc<dyn BacktraceCollector>) {
        *write(&self.backtrace) = Some(collector);
    }

    // ========================================================================
    // SETTINGS
    // ========================================================================

    pub fn show_errors(&self) -> bool {
        read(&self.settings).show_errors
    }

    pub fn set_show_errors(&self, show_errors: bool) {
        write(&self.settings).show_errors = show_errors;
    }

    pub fn report_level(&self) -> Option<ReportLevel> {
        read(&self.settings).report_level
    }

    /// Mask used the next time the error intercept is installed
    pub fn set_report_level(&self, report_level: Option<ReportLevel>) {
        write(&self.settings).report_level = report_level;
    }

    pub fn report_backtrace(&self) -> bool {
        read(&self.settings).report_backtrace
    }

    pub fn set_report_backtrace(&self, report_backtrace: bool) {
        write(&self.settings).report_backtrace = report_backtrace;
    }

    pub fn presentable_severities(&self) -> BTreeSet<Severity> {
        read(&self.settings).presentable.clone()
    }

    pub fn set_presentable_severities<I>(&self, severities: I)
    where
        I: IntoIterator<Item = Severity>,
    {
        write(&self.settings).presentable = severities.into_iter().collect();
    }

    pub fn reserve_memory(&self) -> u64 {
        self.reserve.amount()
    }

    /// Set the reserve as bytes or as a literal such as `"8M"`
    pub fn set_reserve_memory(&self, amount: impl Into<MemorySize>) -> BridgeResult<()> {
        let bytes = amount.into().to_bytes()?;
        self.reserve.set_amount(bytes);
        Ok(())
    }

    pub fn classifier(&self) -> SeverityClassifier {
        read(&self.classifier).clone()
    }

    /// Replace the severity groups wholesale
    pub fn set_mapping(&self, mapping: SeverityMapping) {
        write(&self.classifier).set_mapping(mapping);
    }

    /// Replace the severity groups from JSON; non-mapping values are ignored
    pub fn set_mapping_from_value(&self, value: &Value) -> BridgeResult<bool> {
        write(&self.classifier).set_mapping_from_value(value)
    }

    pub fn set_terminating_codes<I>(&self, codes: I)
    where
        I: IntoIterator<Item = ErrorCode>,
    {
        write(&self.classifier).set_terminating(codes);
    }
}

impl std::fmt::Debug for LoggerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerBridge")
            .field("registration", &self.registration())
            .field("settings", &*read(&self.settings))
            .field("reserve", &self.reserve)
            .finish_non_exhaustive()
    }
}

/// Builder for [`LoggerBridge`]
pub struct LoggerBridgeBuilder {
    logger: Arc<dyn Logger>,
    runtime: Option<Arc<dyn Runtime>>,
    config: BridgeConfig,
    presenter: Option<Arc<dyn ErrorPresenter>>,
    environment: Option<Arc<dyn Environment>>,
    backtrace: Option<Arc<dyn BacktraceCollector>>,
    classifier: Option<SeverityClassifier>,
}

impl LoggerBridgeBuilder {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            runtime: None,
            config: BridgeConfig::default(),
            presenter: None,
            environment: None,
            backtrace: None,
            classifier: None,
        }
    }

    /// Runtime to attach to; the process-wide runtime by default
    pub fn runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn presenter(mut self, presenter: Arc<dyn ErrorPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Collector used instead of the one the configuration describes
    pub fn backtrace_collector(mut self, collector: Arc<dyn BacktraceCollector>) -> Self {
        self.backtrace = Some(collector);
        self
    }

    pub fn classifier(mut self, classifier: SeverityClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn build(self) -> BridgeResult<Arc<LoggerBridge>> {
        let config = self.config;
        config.validate()?;

        let backtrace = match self.backtrace {
            Some(collector) => Some(collector),
            None if config.backtrace_limit > 0 || !config.backtrace_filters.is_empty() => {
                Some(config.backtrace_collector()?)
            }
            None => None,
        };
        let runtime = self
            .runtime
            .unwrap_or_else(|| ProcessRuntime::global() as Arc<dyn Runtime>);

        Ok(Arc::new(LoggerBridge {
            runtime,
            logger: RwLock::new(self.logger),
            presenter: RwLock::new(self.presenter),
            environment: RwLock::new(self.environment),
            backtrace: RwLock::new(backtrace),
            settings: RwLock::new(Settings {
                show_errors: config.show_errors,
                report_level: config.report_level,
                report_backtrace: config.report_backtrace,
                presentable: config.presentable_severities.iter().copied().collect(),
            }),
            classifier: RwLock::new(self.classifier.unwrap_or_default()),
            reserve: MemoryReserve::new(config.reserve_bytes()?),
            state: Mutex::new(HandlerState::default()),
            context: RwLock::new(None),
        }))
    }
}
