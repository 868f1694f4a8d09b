//! Global configuration
//!
//! A process-wide, set-once configuration: log levels per component plus the
//! runtime settings handed to interpreters and trace sessions.
//!
//! # Example
//! ```
//! use ember::config::{self, Config, LogConfig};
//! use tracing::Level;
//!
//! let cfg = Config {
//!     log: LogConfig {
//!         global: Level::DEBUG,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//!
//! let _ = config::try_init(cfg);
//! assert!(config::is_initialized());
//! ```

use ember_config::{EmberConfig, Phase};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::Level;

static GLOBAL_CONFIG: OnceCell<Config> = OnceCell::new();

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config already initialized")]
    AlreadyInitialized,

    #[error("config must be initialized before the logger")]
    NotInitialized,

    #[error("invalid runtime config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot open log file: {0}")]
    LogFile(#[from] std::io::Error),

    #[error("a global tracing subscriber is already installed")]
    SubscriberInstalled,
}

/// Initialize the global configuration (call once, before anything else)
///
/// # Panics
/// If the configuration is already initialized
pub fn init(config: Config) {
    GLOBAL_CONFIG
        .set(config)
        .expect("Config already initialized");
}

/// Non-panicking [`init`]
pub fn try_init(config: Config) -> Result<(), ConfigError> {
    GLOBAL_CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)
}

/// Global configuration
///
/// # Panics
/// If the configuration has not been initialized
pub fn config() -> &'static Config {
    GLOBAL_CONFIG.get().expect("Config not initialized")
}

pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}

/// Runtime settings from the global config, or defaults before `init`
pub fn runtime() -> EmberConfig {
    GLOBAL_CONFIG
        .get()
        .map(|cfg| cfg.runtime.clone())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub log: LogConfig,
    pub runtime: EmberConfig,
}

impl Config {
    /// Default log settings with runtime settings parsed from JSON
    pub fn from_runtime_json(json: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            log: LogConfig::default(),
            runtime: EmberConfig::from_json_str(json)?,
        })
    }
}

/// Log levels; `None` falls back to `global`
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    pub ident: Option<Level>,
    pub action: Option<Level>,
    pub flow: Option<Level>,
    pub frame: Option<Level>,
    pub trace: Option<Level>,
    pub interp: Option<Level>,
}

impl LogConfig {
    /// Effective level for a component
    pub fn level_for(&self, phase: Phase) -> Level {
        let specific = match phase {
            Phase::Ident => self.ident,
            Phase::Action => self.action,
            Phase::Flow => self.flow,
            Phase::Frame => self.frame,
            Phase::Trace => self.trace,
            Phase::Interp => self.interp,
        };
        specific.unwrap_or(self.global)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::INFO,
            ident: None,
            action: None,
            flow: None,
            frame: None,
            trace: None,
            interp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.log.global, Level::INFO);
        assert_eq!(cfg.runtime.limits.max_recursion_depth, 256);
        assert_eq!(cfg.runtime.cache.max_polymorphic_rules, 4);
    }

    #[test]
    fn test_log_level_for() {
        let cfg = LogConfig {
            global: Level::WARN,
            trace: Some(Level::DEBUG),
            ..Default::default()
        };

        assert_eq!(cfg.level_for(Phase::Trace), Level::DEBUG);
        assert_eq!(cfg.level_for(Phase::Action), Level::WARN);
    }

    #[test]
    fn test_runtime_json() {
        let cfg = Config::from_runtime_json(r#"{ "limits": { "max_recursion_depth": 32 } }"#).unwrap();
        assert_eq!(cfg.runtime.limits.max_recursion_depth, 32);
        assert!(cfg.runtime.trace.forward_frame_enter);

        assert!(matches!(
            Config::from_runtime_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
