//! Leveled structured logging
//!
//! The bridge writes every intercepted event through the [`Logger`] trait.
//! Sinks for the console, JSON lines, an in-memory buffer and the `log`
//! facade are bundled; hosts can plug in their own.

#[macro_use]
mod macros;

pub mod events;
pub mod service;

// Re-export main types
pub use events::{Fields, LogRecord, Severity};
pub use service::{ConsoleLogger, FacadeLogger, Logger, MemoryLogger, MultiLogger, StructuredLogger};
