//! Ember Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Ember crates.

use serde::{Deserialize, Serialize};

/// Configuration for trace sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Whether FrameEnter events reach the user callback
    pub forward_frame_enter: bool,
    /// Whether ExceptionUnwind events reach the user callback
    pub forward_exception_unwind: bool,
}

/// Configuration for call-site caches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of rules a single call site keeps before evicting
    pub max_polymorphic_rules: usize,
}

/// Configuration for execution limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Maximum nested calls per thread
    pub max_recursion_depth: usize,
}

/// Aggregated runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmberConfig {
    pub trace: TraceConfig,
    pub cache: CacheConfig,
    pub limits: LimitConfig,
}

/// Component enum for component-specific log configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Ident,
    Action,
    Flow,
    Frame,
    Trace,
    Interp,
}

impl Phase {
    /// All phases, in declaration order
    pub const ALL: [Phase; 6] = [
        Phase::Ident,
        Phase::Action,
        Phase::Flow,
        Phase::Frame,
        Phase::Trace,
        Phase::Interp,
    ];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Ident => "ident",
            Phase::Action => "action",
            Phase::Flow => "flow",
            Phase::Frame => "frame",
            Phase::Trace => "trace",
            Phase::Interp => "interp",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> String {
        format!("ember::{}", self.as_str())
    }
}

impl EmberConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            forward_frame_enter: true,
            forward_exception_unwind: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_polymorphic_rules: 4,
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_config() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.max_polymorphic_rules, 4);
    }

    #[test]
    fn test_default_limit_config() {
        let cfg = LimitConfig::default();
        assert_eq!(cfg.max_recursion_depth, 256);
    }

    #[test]
    fn test_phase_as_str() {
        assert_eq!(Phase::Ident.as_str(), "ident");
        assert_eq!(Phase::Trace.target(), "ember::trace");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = EmberConfig::from_json_str(r#"{ "cache": { "max_polymorphic_rules": 2 } }"#)
            .unwrap();
        assert_eq!(cfg.cache.max_polymorphic_rules, 2);
        assert_eq!(cfg.limits, LimitConfig::default());
        assert!(cfg.trace.forward_frame_enter);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(EmberConfig::from_json_str("{ \"cache\": 3 }").is_err());
    }
}
