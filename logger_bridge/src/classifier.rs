//! Severity classification of raw error codes
//!
//! An ordered list of severity groups maps raw codes to the level they are
//! logged at; the first group holding a code wins. A separate set marks the
//! codes that end the process once reported.

use crate::codes::ErrorCode;
use crate::error::{BridgeError, BridgeResult};
use crate::logging::Severity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Codes logged at one severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityGroup {
    pub severity: Severity,
    pub codes: Vec<ErrorCode>,
}

/// Ordered severity groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeverityMapping {
    groups: Vec<SeverityGroup>,
}

impl SeverityMapping {
    /// A mapping without groups; every code is unclassified
    pub fn empty() -> Self {
        Self { groups: Vec::new() }
    }

    pub fn with_group<I>(mut self, severity: Severity, codes: I) -> Self
    where
        I: IntoIterator<Item = ErrorCode>,
    {
        self.groups.push(SeverityGroup {
            severity,
            codes: codes.into_iter().collect(),
        });
        self
    }

    pub fn groups(&self) -> &[SeverityGroup] {
        &self.groups
    }

    /// Severity of the first group containing `code`
    pub fn classify(&self, code: ErrorCode) -> Option<Severity> {
        self.groups
            .iter()
            .find(|group| group.codes.contains(&code))
            .map(|group| group.severity)
    }

    /// Read a mapping from JSON.
    ///
    /// Accepts either an object of `label -> [codes]` (groups are taken in key
    /// order) or an array of `{"severity", "codes"}` objects (groups keep their
    /// position). Any other value is not a mapping and yields `Ok(None)`.
    /// Unknown labels and non-integer codes are configuration errors.
    pub fn from_value(value: &Value) -> BridgeResult<Option<Self>> {
        match value {
            Value::Object(map) => {
                let mut mapping = Self::empty();
                for (label, codes) in map {
                    let severity = Severity::from_label(label).ok_or_else(|| {
                        BridgeError::Configuration {
                            reason: format!("unknown severity label '{}'", label),
                        }
                    })?;
                    mapping = mapping.with_group(severity, parse_codes(label, codes)?);
                }
                Ok(Some(mapping))
            }
            Value::Array(_) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|err| BridgeError::Configuration {
                    reason: format!("invalid severity groups: {}", err),
                }),
            _ => Ok(None),
        }
    }
}

fn parse_codes(label: &str, codes: &Value) -> BridgeResult<Vec<ErrorCode>> {
    let invalid = || BridgeError::Configuration {
        reason: format!("codes for '{}' must be a list of integers", label),
    };

    codes
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|code| {
            code.as_u64()
                .and_then(|raw| u32::try_from(raw).ok())
                .map(ErrorCode::new)
                .ok_or_else(invalid)
        })
        .collect()
}

impl Default for SeverityMapping {
    fn default() -> Self {
        Self::empty()
            .with_group(
                Severity::Error,
                [
                    ErrorCode::FATAL,
                    ErrorCode::CORE_FATAL,
                    ErrorCode::USER_ERROR,
                    ErrorCode::PARSE,
                    ErrorCode::COMPILE_FATAL,
                    ErrorCode::RECOVERABLE,
                ],
            )
            .with_group(
                Severity::Warning,
                [
                    ErrorCode::WARNING,
                    ErrorCode::CORE_WARNING,
                    ErrorCode::COMPILE_WARNING,
                    ErrorCode::USER_WARNING,
                    ErrorCode::NOTICE,
                    ErrorCode::USER_NOTICE,
                    ErrorCode::DEPRECATED,
                    ErrorCode::USER_DEPRECATED,
                    ErrorCode::STRICT,
                ],
            )
    }
}

/// Codes that end the process when raised as recoverable errors
pub fn default_terminating_codes() -> BTreeSet<ErrorCode> {
    [
        ErrorCode::FATAL,
        ErrorCode::CORE_FATAL,
        ErrorCode::USER_ERROR,
        ErrorCode::PARSE,
        ErrorCode::COMPILE_FATAL,
        ErrorCode::RECOVERABLE,
    ]
    .into_iter()
    .collect()
}

/// Whether a last error left at shutdown means the process died
pub fn is_fatal(code: ErrorCode) -> bool {
    matches!(
        code,
        ErrorCode::FATAL | ErrorCode::PARSE | ErrorCode::CORE_FATAL | ErrorCode::COMPILE_FATAL
    )
}

/// Maps codes to severities and flags terminating codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityClassifier {
    mapping: SeverityMapping,
    terminating: BTreeSet<ErrorCode>,
}

impl SeverityClassifier {
    pub fn new(mapping: SeverityMapping, terminating: BTreeSet<ErrorCode>) -> Self {
        Self {
            mapping,
            terminating,
        }
    }

    pub fn classify(&self, code: ErrorCode) -> Option<Severity> {
        self.mapping.classify(code)
    }

    /// Classify, treating a missing group as a configuration defect
    pub fn classify_or_err(&self, code: ErrorCode) -> BridgeResult<Severity> {
        self.classify(code)
            .ok_or(BridgeError::Unclassified { code })
    }

    pub fn is_terminating(&self, code: ErrorCode) -> bool {
        self.terminating.contains(&code)
    }

    pub fn mapping(&self) -> &SeverityMapping {
        &self.mapping
    }

    pub fn terminating_codes(&self) -> &BTreeSet<ErrorCode> {
        &self.terminating
    }

    /// Replace the mapping wholesale
    pub fn set_mapping(&mut self, mapping: SeverityMapping) {
        self.mapping = mapping;
    }

    /// Replace the mapping from JSON; returns `false` when `value` is not a mapping
    pub fn set_mapping_from_value(&mut self, value: &Value) -> BridgeResult<bool> {
        match SeverityMapping::from_value(value)? {
            Some(mapping) => {
                self.mapping = mapping;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn set_terminating<I>(&mut self, codes: I)
    where
        I: IntoIterator<Item = ErrorCode>,
    {
        self.terminating = codes.into_iter().collect();
    }
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self::new(SeverityMapping::default(), default_terminating_codes())
    }
}
