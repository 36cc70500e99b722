//! # Bridge Configuration
//!
//! Defaults are overlaid with `LOGGER_BRIDGE_*` environment variables. A
//! value that fails to parse keeps its default.

pub mod constants;

use crate::backtrace::{BacktraceCollector, BasicBacktraceCollector, FilteredBacktraceCollector};
use crate::codes::ReportLevel;
use crate::error::BridgeResult;
use crate::logging::Severity;
use crate::memory::MemorySize;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

/// Configuration for the logger bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Whether to present errors when the environment is not live
    pub show_errors: bool,

    /// Memory kept in reserve for out-of-memory fatals
    pub reserve_memory: MemorySize,

    /// Mask override; the runtime's ambient level is used when absent
    pub report_level: Option<ReportLevel>,

    /// Whether log records carry a backtrace
    pub report_backtrace: bool,

    /// Maximum backtrace frames, 0 for unlimited
    pub backtrace_limit: usize,

    /// Regular expression fragments; matching frames are dropped
    pub backtrace_filters: Vec<String>,

    /// Severities that are presented when the display gate is open
    pub presentable_severities: Vec<Severity>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            show_errors: true,
            reserve_memory: MemorySize::Bytes(constants::DEFAULT_RESERVE_MEMORY),
            report_level: None,
            report_backtrace: false,
            backtrace_limit: 0,
            backtrace_filters: Vec::new(),
            presentable_severities: vec![
                Severity::Notice,
                Severity::Warning,
                Severity::Error,
                Severity::Critical,
            ],
        }
    }
}

impl BridgeConfig {
    /// Defaults overlaid with process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overlaid with values from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            show_errors: lookup(constants::env::SHOW_ERRORS)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.show_errors),
            reserve_memory: lookup(constants::env::RESERVE_MEMORY)
                .map(|v| v.trim().to_string())
                .filter(|v| MemorySize::Literal(v.clone()).to_bytes().is_ok())
                .map(MemorySize::Literal)
                .unwrap_or(defaults.reserve_memory),
            report_level: lookup(constants::env::REPORT_LEVEL)
                .and_then(|v| v.trim().parse().ok())
                .map(ReportLevel::new)
                .or(defaults.report_level),
            report_backtrace: lookup(constants::env::REPORT_BACKTRACE)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.report_backtrace),
            backtrace_limit: lookup(constants::env::BACKTRACE_LIMIT)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.backtrace_limit),
            backtrace_filters: lookup(constants::env::BACKTRACE_FILTERS)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|pattern| !pattern.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.backtrace_filters),
            presentable_severities: defaults.presentable_severities,
        }
    }

    /// Present errors even when the environment is not live
    pub fn with_show_errors(mut self, show_errors: bool) -> Self {
        self.show_errors = show_errors;
        self
    }

    /// Set the reserve as bytes or as a literal such as `"8M"`
    pub fn with_reserve_memory(mut self, reserve_memory: impl Into<MemorySize>) -> Self {
        self.reserve_memory = reserve_memory.into();
        self
    }

    /// Override the mask the error intercept is installed with
    pub fn with_report_level(mut self, report_level: ReportLevel) -> Self {
        self.report_level = Some(report_level);
        self
    }

    /// Attach backtraces to log records
    pub fn with_backtrace(mut self, limit: usize) -> Self {
        self.report_backtrace = true;
        self.backtrace_limit = limit;
        self
    }

    /// Drop backtrace frames whose qualified name matches any pattern
    pub fn with_backtrace_filters<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backtrace_filters = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_presentable_severities(mut self, severities: Vec<Severity>) -> Self {
        self.presentable_severities = severities;
        self
    }

    /// Reserve amount in bytes
    pub fn reserve_bytes(&self) -> BridgeResult<u64> {
        self.reserve_memory.to_bytes()
    }

    /// Build the backtrace collector this configuration describes
    pub fn backtrace_collector(&self) -> BridgeResult<Arc<dyn BacktraceCollector>> {
        let basic = BasicBacktraceCollector::new(self.backtrace_limit);
        if self.backtrace_filters.is_empty() {
            Ok(Arc::new(basic))
        } else {
            Ok(Arc::new(FilteredBacktraceCollector::new(
                basic,
                &self.backtrace_filters,
            )?))
        }
    }

    /// Check every derived value up front
    pub fn validate(&self) -> BridgeResult<()> {
        self.reserve_bytes()?;
        self.backtrace_collector()?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
