//! Backtrace collector that drops frames by name

use super::{BacktraceCollector, Frame, Frames};
use crate::error::{BridgeError, BridgeResult};
use crate::runtime::ExceptionInfo;
use regex::Regex;
use std::sync::Arc;

/// Wraps a collector and removes frames whose qualified name matches any pattern
#[derive(Debug)]
pub struct FilteredBacktraceCollector<C = super::BasicBacktraceCollector> {
    inner: C,
    patterns: Arc<Vec<Regex>>,
}

impl<C: BacktraceCollector> FilteredBacktraceCollector<C> {
    /// Patterns are regular expression fragments searched anywhere in the name
    pub fn new<I, S>(inner: C, patterns: I) -> BridgeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| BridgeError::InvalidFilterPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        Ok(Self {
            inner,
            patterns: Arc::new(patterns),
        })
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    pub fn is_filtered(&self, frame: &Frame) -> bool {
        matches_any(&self.patterns, frame)
    }
}

impl<C: BacktraceCollector> BacktraceCollector for FilteredBacktraceCollector<C> {
    fn capture(&self, origin: Option<&ExceptionInfo>) -> Frames {
        let patterns = Arc::clone(&self.patterns);
        Box::new(
            self.inner
                .capture(origin)
                .filter(move |frame| !matches_any(&patterns, frame)),
        )
    }
}

fn matches_any(patterns: &[Regex], frame: &Frame) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let name = frame.qualified_name();
    patterns.iter().any(|pattern| pattern.is_match(&name))
}
