//! Log record and severity types

use super::service::Logger;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Structured fields attached to a log record
pub type Fields = BTreeMap<String, Value>;

/// Log severity levels, least severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Debug,
        Severity::Info,
        Severity::Notice,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// Lowercase label used in severity mappings
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Capitalised label shown on error output
    pub fn title(&self) -> &'static str {
        match self {
            Severity::Debug => "Debug",
            Severity::Info => "Info",
            Severity::Notice => "Notice",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Critical => "Critical",
        }
    }

    /// Parse a label, ignoring case
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(label.trim()))
    }

    /// Route a message to the logger method matching this severity
    pub fn dispatch(self, logger: &dyn Logger, message: &str, fields: &Fields) {
        match self {
            Severity::Debug => logger.debug(message, fields),
            Severity::Info => logger.info(message, fields),
            Severity::Notice => logger.notice(message, fields),
            Severity::Warning => logger.warning(message, fields),
            Severity::Error => logger.error(message, fields),
            Severity::Critical => logger.critical(message, fields),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core log record structure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: Fields,
}

impl LogRecord {
    pub fn new(severity: Severity, message: &str, fields: &Fields) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            message: message.to_string(),
            fields: fields.clone(),
        }
    }

    /// Add a structured field
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Format for display
    pub fn format(&self) -> String {
        let location = match (self.field("file"), self.field("line")) {
            (Some(Value::String(file)), Some(line)) if !file.is_empty() => {
                format!(" ({}:{})", file, line)
            }
            _ => String::new(),
        };

        format!(
            "{} [{}] {}{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.severity.as_str().to_uppercase(),
            self.message,
            location
        )
    }

    /// Format as JSON for structured logging
    pub fn format_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Warning > Severity::Notice);
        assert!(Severity::Debug < Severity::Info);
    }

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::from_label("Warning"), Some(Severity::Warning));
        assert_eq!(Severity::from_label(" critical "), Some(Severity::Critical));
        assert_eq!(Severity::from_label("fatal"), None);
        assert_eq!(Severity::Notice.title(), "Notice");
    }

    #[test]
    fn test_record_formatting() {
        let record = LogRecord::new(Severity::Warning, "Disk almost full", &Fields::new())
            .with_field("file", "storage.rs")
            .with_field("line", 42);

        let formatted = record.format();
        assert!(formatted.contains("[WARNING]"));
        assert!(formatted.contains("Disk almost full"));
        assert!(formatted.ends_with("(storage.rs:42)"));
    }

    #[test]
    fn test_json_formatting() {
        let record = LogRecord::new(Severity::Error, "Access denied", &Fields::new())
            .with_field("file", "auth.rs");

        let json = record.format_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["severity"], json!("error"));
        assert_eq!(value["message"], json!("Access denied"));
        assert_eq!(value["fields"]["file"], json!("auth.rs"));
    }
}
