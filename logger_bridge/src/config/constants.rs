//! Default values and fixed names used across the bridge

/// Memory kept in reserve for reporting an out-of-memory fatal (5 MiB)
/// RESOURCE: logging and rendering allocate, so headroom must exist before they run
pub const DEFAULT_RESERVE_MEMORY: u64 = 5 * 1024 * 1024;

/// Exit status used when a terminating error ends the process
pub const TERMINATION_EXIT_STATUS: i32 = 1;

/// Number of records kept by the in-memory logger
/// RESOURCE: bounds memory used by buffered records
pub const MEMORY_LOGGER_CAPACITY: usize = 1000;

/// `log` facade target for the bridge's own diagnostics
pub const LOG_TARGET: &str = "logger_bridge";

/// Prefix prepended to uncaught exception messages
pub const UNCAUGHT_PREFIX: &str = "Uncaught";

/// Generic text shown when error detail must not be exposed
pub const FRIENDLY_ERROR_MESSAGE: &str =
    "The server encountered an unexpected error and could not complete your request.";

/// Structured field names
pub mod fields {
    pub const FILE: &str = "file";
    pub const LINE: &str = "line";
    pub const BACKTRACE: &str = "backtrace";
    pub const CONTEXT: &str = "context";
}

/// Environment variables read by `BridgeConfig::from_env`
pub mod env {
    pub const SHOW_ERRORS: &str = "LOGGER_BRIDGE_SHOW_ERRORS";
    pub const RESERVE_MEMORY: &str = "LOGGER_BRIDGE_RESERVE_MEMORY";
    pub const REPORT_LEVEL: &str = "LOGGER_BRIDGE_REPORT_LEVEL";
    pub const REPORT_BACKTRACE: &str = "LOGGER_BRIDGE_REPORT_BACKTRACE";
    pub const BACKTRACE_LIMIT: &str = "LOGGER_BRIDGE_BACKTRACE_LIMIT";
    pub const BACKTRACE_FILTERS: &str = "LOGGER_BRIDGE_BACKTRACE_FILTERS";

    /// Deployment mode read by `EnvVarEnvironment`
    pub const MODE: &str = "LOGGER_BRIDGE_ENV";
}
