//! Memory reserve for out-of-memory reporting
//!
//! Writing a log record and rendering an error page both allocate. When the
//! process dies from memory exhaustion the ceiling is raised by the reserve
//! amount before either runs. The reserve is consumed once and never re-armed.

use crate::config::constants;
use crate::error::{BridgeError, BridgeResult};
use crate::runtime::Runtime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A byte amount given either as a number or as a literal like `"8M"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemorySize {
    Bytes(u64),
    Literal(String),
}

impl MemorySize {
    pub fn to_bytes(&self) -> BridgeResult<u64> {
        match self {
            MemorySize::Bytes(bytes) => Ok(*bytes),
            MemorySize::Literal(literal) => translate_limit(literal),
        }
    }
}

impl From<u64> for MemorySize {
    fn from(bytes: u64) -> Self {
        MemorySize::Bytes(bytes)
    }
}

impl From<&str> for MemorySize {
    fn from(literal: &str) -> Self {
        MemorySize::Literal(literal.to_string())
    }
}

impl From<String> for MemorySize {
    fn from(literal: String) -> Self {
        MemorySize::Literal(literal)
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemorySize::Bytes(bytes) => write!(f, "{}", bytes),
            MemorySize::Literal(literal) => f.write_str(literal),
        }
    }
}

/// Translate a size literal (`"2K"`, `"2M"`, `"2G"` or bare bytes) using 1024-based units
pub fn translate_limit(literal: &str) -> BridgeResult<u64> {
    let invalid = || BridgeError::InvalidMemoryLiteral {
        literal: literal.to_string(),
    };

    let trimmed = literal.trim();
    let (digits, shift) = match trimmed.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('g') => (&trimmed[..trimmed.len() - 1], 30),
        Some('m') => (&trimmed[..trimmed.len() - 1], 20),
        Some('k') => (&trimmed[..trimmed.len() - 1], 10),
        Some(_) => (trimmed, 0),
        None => return Err(invalid()),
    };

    let value: u64 = digits.trim().parse().map_err(|_| invalid())?;
    value.checked_mul(1u64 << shift).ok_or_else(invalid)
}

/// Check whether a fatal message describes memory exhaustion
pub fn is_exhaustion_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("memory") && message.contains("exhausted")
}

/// Fixed safety margin held against the runtime's memory ceiling
#[derive(Debug)]
pub struct MemoryReserve {
    amount: AtomicU64,
    consumed: AtomicBool,
}

impl MemoryReserve {
    pub fn new(amount: u64) -> Self {
        Self {
            amount: AtomicU64::new(amount),
            consumed: AtomicBool::new(false),
        }
    }

    pub fn amount(&self) -> u64 {
        self.amount.load(Ordering::SeqCst)
    }

    pub fn set_amount(&self, amount: u64) {
        self.amount.store(amount, Ordering::SeqCst);
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::SeqCst)
    }

    /// Whether a hard ceiling leaves less headroom above the soft ceiling than the reserve
    pub fn is_guard_relevant(&self, runtime: &dyn Runtime) -> bool {
        match runtime.hard_memory_limit() {
            Some(hard) => {
                let soft = runtime.memory_limit().unwrap_or(hard);
                hard.saturating_sub(soft) < self.amount()
            }
            None => false,
        }
    }

    /// Lower the soft ceiling so the reserve still fits below a hard ceiling.
    ///
    /// Without a relevant hard ceiling nothing changes: the reserve is taken
    /// later simply by raising the soft ceiling. Returns the new ceiling.
    pub fn reserve(&self, runtime: &dyn Runtime) -> Option<u64> {
        if !self.is_guard_relevant(runtime) {
            return None;
        }

        let hard = runtime.hard_memory_limit()?;
        let limit = hard.saturating_sub(self.amount());
        runtime.set_memory_limit(limit);
        log::debug!(
            target: constants::LOG_TARGET,
            "memory ceiling lowered to {} bytes to keep {} bytes in reserve",
            limit,
            self.amount()
        );
        Some(limit)
    }

    /// Raise the ceiling by the reserve amount, at most once per process.
    ///
    /// Returns the new ceiling, or `None` when the reserve was already
    /// consumed or the runtime has no ceiling.
    pub fn restore(&self, runtime: &dyn Runtime) -> Option<u64> {
        if self.consumed.swap(true, Ordering::SeqCst) {
            return None;
        }

        let current = runtime.memory_limit()?;
        let limit = current.saturating_add(self.amount());
        runtime.set_memory_limit(limit);
        Some(limit)
    }
}

impl Default for MemoryReserve {
    fn default() -> Self {
        Self::new(constants::DEFAULT_RESERVE_MEMORY)
    }
}
