//! Leveled logger trait and the bundled sinks

use super::events::{Fields, LogRecord, Severity};
use crate::config::constants;
use crate::sync::lock;
use std::sync::{Arc, Mutex};

/// Leveled structured logger the bridge writes into
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str, fields: &Fields);
    fn info(&self, message: &str, fields: &Fields);
    fn notice(&self, message: &str, fields: &Fields);
    fn warning(&self, message: &str, fields: &Fields);
    fn error(&self, message: &str, fields: &Fields);
    fn critical(&self, message: &str, fields: &Fields);
}

/// Simple console logger
pub struct ConsoleLogger {
    min_severity: Severity,
}

impl ConsoleLogger {
    pub fn new(min_severity: Severity) -> Self {
        Self { min_severity }
    }

    fn write(&self, severity: Severity, message: &str, fields: &Fields) {
        if severity >= self.min_severity {
            let record = LogRecord::new(severity, message, fields);
            match severity {
                Severity::Error | Severity::Critical => eprintln!("{}", record.format()),
                _ => println!("{}", record.format()),
            }
        }
    }
}

impl_leveled_logger!(ConsoleLogger);

/// Structured logger for JSON output and better tooling integration
pub struct StructuredLogger {
    min_severity: Severity,
}

impl StructuredLogger {
    pub fn new(min_severity: Severity) -> Self {
        Self { min_severity }
    }

    fn write(&self, severity: Severity, message: &str, fields: &Fields) {
        if severity < self.min_severity {
            return;
        }

        let record = LogRecord::new(severity, message, fields);
        // Fallback to regular format if JSON serialization fails
        let line = record.format_json().unwrap_or_else(|_| record.format());
        match severity {
            Severity::Error | Severity::Critical => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}

impl_leveled_logger!(StructuredLogger);

/// Bounded in-memory logger, oldest records are dropped first
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
    capacity: usize,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::with_capacity(constants::MEMORY_LOGGER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        lock(&self.records).clone()
    }

    pub fn records_at(&self, severity: Severity) -> Vec<LogRecord> {
        lock(&self.records)
            .iter()
            .filter(|record| record.severity == severity)
            .cloned()
            .collect()
    }

    pub fn count_at(&self, severity: Severity) -> usize {
        lock(&self.records)
            .iter()
            .filter(|record| record.severity == severity)
            .count()
    }

    pub fn last(&self) -> Option<LogRecord> {
        lock(&self.records).last().cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.records).clear();
    }

    fn write(&self, severity: Severity, message: &str, fields: &Fields) {
        let mut records = lock(&self.records);

        if records.len() >= self.capacity {
            let remove_count = records.len() - self.capacity + 1;
            records.drain(0..remove_count);
        }

        records.push(LogRecord::new(severity, message, fields));
    }
}

impl Default for MemoryLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl_leveled_logger!(MemoryLogger);

/// Forwards records to the `log` facade
///
/// The facade has no notice or critical level: notice maps to `Info`,
/// critical maps to `Error` with a `critical=true` marker.
pub struct FacadeLogger {
    target: String,
}

impl FacadeLogger {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    fn write(&self, severity: Severity, message: &str, fields: &Fields) {
        let level = match severity {
            Severity::Debug => log::Level::Debug,
            Severity::Info | Severity::Notice => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error | Severity::Critical => log::Level::Error,
        };

        if !log::log_enabled!(target: self.target.as_str(), level) {
            return;
        }

        let mut fields = fields.clone();
        if severity == Severity::Critical {
            fields.insert("critical".to_string(), true.into());
        }

        if fields.is_empty() {
            log::log!(target: self.target.as_str(), level, "{}", message);
        } else {
            let rendered = serde_json::to_string(&fields).unwrap_or_default();
            log::log!(target: self.target.as_str(), level, "{} {}", message, rendered);
        }
    }
}

impl Default for FacadeLogger {
    fn default() -> Self {
        Self::new(constants::LOG_TARGET)
    }
}

impl_leveled_logger!(FacadeLogger);

/// Multi-target logger that fans out to several destinations
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Arc<dyn Logger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_logger(&mut self, logger: Arc<dyn Logger>) {
        self.loggers.push(logger);
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.add_logger(logger);
        self
    }

    pub fn with_console(self, min_severity: Severity) -> Self {
        self.with_logger(Arc::new(ConsoleLogger::new(min_severity)))
    }

    pub fn with_structured_console(self, min_severity: Severity) -> Self {
        self.with_logger(Arc::new(StructuredLogger::new(min_severity)))
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }

    fn write(&self, severity: Severity, message: &str, fields: &Fields) {
        for logger in &self.loggers {
            severity.dispatch(logger.as_ref(), message, fields);
        }
    }
}

impl_leveled_logger!(MultiLogger);
