//! Live/non-live environment oracle

use crate::config::constants;
use crate::error::BridgeError;
use std::env;
use std::str::FromStr;

/// Answers whether error detail must be hidden from end users
pub trait Environment: Send + Sync {
    fn is_live(&self) -> bool;
}

/// Deployment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvironmentMode {
    #[default]
    Dev,
    Test,
    Live,
}

impl EnvironmentMode {
    pub fn is_live(self) -> bool {
        self == EnvironmentMode::Live
    }
}

impl FromStr for EnvironmentMode {
    type Err = BridgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(EnvironmentMode::Dev),
            "test" | "testing" => Ok(EnvironmentMode::Test),
            "live" | "prod" | "production" => Ok(EnvironmentMode::Live),
            other => Err(BridgeError::Configuration {
                reason: format!("unknown environment mode '{}'", other),
            }),
        }
    }
}

/// Environment fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticEnvironment(bool);

impl StaticEnvironment {
    pub fn new(live: bool) -> Self {
        Self(live)
    }

    pub fn live() -> Self {
        Self(true)
    }

    pub fn dev() -> Self {
        Self(false)
    }
}

impl Environment for StaticEnvironment {
    fn is_live(&self) -> bool {
        self.0
    }
}

/// Environment read from `LOGGER_BRIDGE_ENV` on every query
#[derive(Debug, Clone, Default)]
pub struct EnvVarEnvironment {
    variable: Option<String>,
}

impl EnvVarEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the mode from another variable
    pub fn with_variable(variable: impl Into<String>) -> Self {
        Self {
            variable: Some(variable.into()),
        }
    }

    pub fn variable(&self) -> &str {
        self.variable.as_deref().unwrap_or(constants::env::MODE)
    }

    /// Current mode; unset or unknown values fall back to `Dev`
    pub fn mode(&self) -> EnvironmentMode {
        match env::var(self.variable()) {
            Ok(value) => value.parse().unwrap_or_else(|err| {
                log::warn!(target: constants::LOG_TARGET, "{}, assuming dev", err);
                EnvironmentMode::Dev
            }),
            Err(_) => EnvironmentMode::Dev,
        }
    }
}

impl Environment for EnvVarEnvironment {
    fn is_live(&self) -> bool {
        self.mode().is_live()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("live".parse::<EnvironmentMode>().unwrap(), EnvironmentMode::Live);
        assert_eq!(" PROD ".parse::<EnvironmentMode>().unwrap(), EnvironmentMode::Live);
        assert_eq!("test".parse::<EnvironmentMode>().unwrap(), EnvironmentMode::Test);
        assert_eq!("dev".parse::<EnvironmentMode>().unwrap(), EnvironmentMode::Dev);
        assert_matches!(
            "staging".parse::<EnvironmentMode>(),
            Err(BridgeError::Configuration { .. })
        );
    }

    #[test]
    fn test_static_environment() {
        assert!(StaticEnvironment::live().is_live());
        assert!(!StaticEnvironment::dev().is_live());
        assert!(StaticEnvironment::new(true).is_live());
    }

    #[test]
    fn test_env_var_environment() {
        // unique names keep this test independent of the real mode variable
        let environment = EnvVarEnvironment::with_variable("LOGGER_BRIDGE_ENV_TEST_LIVE");
        assert_eq!(environment.mode(), EnvironmentMode::Dev);

        env::set_var("LOGGER_BRIDGE_ENV_TEST_LIVE", "live");
        assert!(environment.is_live());

        env::set_var("LOGGER_BRIDGE_ENV_TEST_LIVE", "somewhere");
        assert_eq!(environment.mode(), EnvironmentMode::Dev);
        env::remove_var("LOGGER_BRIDGE_ENV_TEST_LIVE");
    }

    #[test]
    fn test_default_variable() {
        assert_eq!(EnvVarEnvironment::new().variable(), constants::env::MODE);
    }
}
