//! Backtrace collection
//!
//! Frames come either from an exception's captured trace or from the current
//! call stack. Collectors hand them out as a lazy, single-pass iterator.

mod filtered;

pub use filtered::FilteredBacktraceCollector;

use crate::runtime::ExceptionInfo;
use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;

/// Lazy, finite sequence of frames
pub type Frames = Box<dyn Iterator<Item = Frame> + Send>;

/// One call in a backtrace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Frame {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            class: None,
            call_type: None,
            file: None,
            line: None,
        }
    }

    /// Frame for a method call, e.g. `Type` + `::` + `method`
    pub fn method(
        class: impl Into<String>,
        call_type: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            class: Some(class.into()),
            call_type: Some(call_type.into()),
            ..Self::new(function)
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Name used for filtering: class, call type and function joined
    pub fn qualified_name(&self) -> String {
        match &self.class {
            Some(class) => format!(
                "{}{}{}",
                class,
                self.call_type.as_deref().unwrap_or("::"),
                self.function
            ),
            None => self.function.clone(),
        }
    }
}

/// Produces backtraces for log records and error output
pub trait BacktraceCollector: Send + Sync {
    /// Frames of `origin`'s trace, or of the current call stack when `None`
    fn capture(&self, origin: Option<&ExceptionInfo>) -> Frames;
}

/// Collector that returns raw frames, truncated to a limit
#[derive(Debug, Clone, Default)]
pub struct BasicBacktraceCollector {
    limit: usize,
}

impl BasicBacktraceCollector {
    /// `limit` of 0 means unlimited
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }
}

impl BacktraceCollector for BasicBacktraceCollector {
    fn capture(&self, origin: Option<&ExceptionInfo>) -> Frames {
        let frames = match origin {
            Some(exception) => exception.trace.clone(),
            None => capture_stack(),
        };

        match self.limit {
            0 => Box::new(frames.into_iter()),
            limit => Box::new(frames.into_iter().take(limit)),
        }
    }
}

/// Capture the current call stack, starting at the caller of the collector
#[inline(never)]
pub fn capture_stack() -> Vec<Frame> {
    let rendered = Backtrace::force_capture().to_string();
    parse_backtrace(&rendered)
        .into_iter()
        .skip_while(is_capture_machinery)
        .collect()
}

fn is_capture_machinery(frame: &Frame) -> bool {
    let name = frame.function.as_str();
    name.starts_with("std::backtrace")
        || name.contains("logger_bridge::backtrace::capture_stack")
        || name.contains("as logger_bridge::backtrace::BacktraceCollector>::capture")
}

/// Parse the text rendering of a std backtrace into frames
pub fn parse_backtrace(rendered: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();

    for line in rendered.lines() {
        let line = line.trim();

        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                apply_location(frame, location);
            }
            continue;
        }

        if let Some((index, name)) = line.split_once(": ") {
            if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
                frames.push(Frame::new(name.trim()));
            }
        }
    }

    frames
}

fn apply_location(frame: &mut Frame, location: &str) {
    // path:line:column, the path itself may contain ':'
    let mut parts = location.rsplitn(3, ':');
    let _column = parts.next();
    let line = parts.next().and_then(|line| line.parse().ok());
    match (parts.next(), line) {
        (Some(file), Some(line)) => {
            frame.file = Some(file.to_string());
            frame.line = Some(line);
        }
        _ => frame.file = Some(location.to_string()),
    }
}
