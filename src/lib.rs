//! Ember - dynamic-language runtime core
//!
//! Interned identifiers, action descriptors with polymorphic call-site
//! caching, signal-based control flow, frame variable views and a trace
//! session that turns engine events into source-level debugger events.
//!
//! # Architecture
//!
//! ```text
//! ember-config/  - Pure configuration data (serde)
//! ember-core/    - Runtime core and the reference interpreter
//! src/           - Global config, logging setup, convenience entry points
//! ```
//!
//! # Quick Start
//!
//! ```
//! use ember::{Expr, Stmt, TraceEvent, TraceEventKind};
//! use std::sync::Arc;
//!
//! let interp = ember::interpreter();
//! let mut f = interp.function_builder("answer", "main.em");
//! f.stmt(Stmt::Return(Expr::int(42)));
//! interp.define(f.build().unwrap());
//!
//! let session = ember::attach(interp.clone()).unwrap();
//! session
//!     .set_trace_callback(Some(Arc::new(|event: &TraceEvent| {
//!         if event.kind == TraceEventKind::TracePoint {
//!             println!("step at {}", event.span);
//!         }
//!     })))
//!     .unwrap();
//!
//! assert_eq!(interp.call("answer", &[]).unwrap(), ember::Value::Int(42));
//! session.close().unwrap();
//! ```

use std::sync::Arc;

pub mod config;
pub mod logger;

pub use config::{Config, ConfigError, LogConfig};
pub use ember_config::{CacheConfig, EmberConfig, LimitConfig, Phase, TraceConfig};
pub use ember_core::*;
pub use logger::{init_logger, LogFormat};

/// Initialize the global configuration only
///
/// Logging is set up separately with [`logger::init_logger`].
pub fn init(config: Config) {
    config::init(config);
}

/// Initialize configuration and logging
pub fn init_with_logger(config: Config, format: LogFormat) -> Result<(), ConfigError> {
    config::try_init(config)?;
    logger::init_with_format(format)
}

/// Interpreter using the global runtime settings (defaults before `init`)
pub fn interpreter() -> Arc<Interpreter> {
    Interpreter::with_config(config::runtime())
}

/// Attach a trace session using the global trace settings
pub fn attach(engine: Arc<dyn TraceEngine>) -> Result<TraceSession, TraceError> {
    TraceSession::attach_with_config(engine, config::runtime().trace)
}
