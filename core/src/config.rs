// flowrig/src/config.rs

//! Startup configuration for the flow engine.
//!
//! Values are read once, when a `FlowExecutor` is built. Nothing in the
//! engine re-reads the environment afterwards.

use crate::error::{FlowError, FlowResult};
use std::str::FromStr;
use std::time::Duration;
use tracing::{event, Level};

pub const ENV_ENABLED: &str = "FLOW_ENABLED";
pub const ENV_SCOPE_POOL_HINT: &str = "FLOW_SCOPE_POOL_HINT";
pub const ENV_PRINT_EXECUTION_LOG: &str = "FLOW_PRINT_EXECUTION_LOG";
pub const ENV_WORKER_POOL_SIZE: &str = "FLOW_WORKER_POOL_SIZE";
pub const ENV_SHUTDOWN_GRACE_MS: &str = "FLOW_SHUTDOWN_GRACE_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  /// When `false`, building an executor fails with `FlowError::Disabled`.
  pub enabled: bool,
  /// Soft watermark for concurrently alive RunScopes. Exceeding it only logs.
  pub scope_pool_hint: usize,
  /// Promotes per-unit step events from DEBUG to INFO.
  pub print_execution_log: bool,
  /// Number of permits in the shared worker pool.
  pub worker_pool_size: usize,
  /// How long `FlowExecutor::shutdown` waits for in-flight branch tasks.
  pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      scope_pool_hint: 1024,
      print_execution_log: true,
      worker_pool_size: 64,
      shutdown_grace: Duration::from_secs(5),
    }
  }
}

impl EngineConfig {
  pub fn with_enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn with_scope_pool_hint(mut self, hint: usize) -> Self {
    self.scope_pool_hint = hint;
    self
  }

  pub fn with_print_execution_log(mut self, print: bool) -> Self {
    self.print_execution_log = print;
    self
  }

  /// Clamped to at least one permit.
  pub fn with_worker_pool_size(mut self, size: usize) -> Self {
    self.worker_pool_size = size.max(1);
    self
  }

  pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
    self.shutdown_grace = grace;
    self
  }

  /// Loads an optional `.env` file, then reads the `FLOW_*` variables.
  pub fn from_env() -> FlowResult<Self> {
    if let Ok(path) = dotenvy::dotenv() {
      event!(Level::DEBUG, path = %path.display(), "Loaded .env file for engine configuration.");
    }
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Builds a config from an arbitrary key lookup. Missing keys keep their defaults.
  pub fn from_lookup<F>(lookup: F) -> FlowResult<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let defaults = Self::default();
    let shutdown_grace_ms = parse_or(&lookup, ENV_SHUTDOWN_GRACE_MS, defaults.shutdown_grace.as_millis() as u64)?;

    let config = Self {
      enabled: parse_bool_or(&lookup, ENV_ENABLED, defaults.enabled)?,
      scope_pool_hint: parse_or(&lookup, ENV_SCOPE_POOL_HINT, defaults.scope_pool_hint)?,
      print_execution_log: parse_bool_or(&lookup, ENV_PRINT_EXECUTION_LOG, defaults.print_execution_log)?,
      worker_pool_size: parse_or(&lookup, ENV_WORKER_POOL_SIZE, defaults.worker_pool_size)?,
      shutdown_grace: Duration::from_millis(shutdown_grace_ms),
    };

    if config.worker_pool_size == 0 {
      return Err(FlowError::Configuration {
        key: ENV_WORKER_POOL_SIZE.to_string(),
        message: "worker pool size must be at least 1".to_string(),
      });
    }
    Ok(config)
  }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> FlowResult<T>
where
  F: Fn(&str) -> Option<String>,
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match lookup(key) {
    None => Ok(default),
    Some(raw) => raw.trim().parse::<T>().map_err(|e| FlowError::Configuration {
      key: key.to_string(),
      message: format!("cannot parse '{}': {}", raw, e),
    }),
  }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> FlowResult<bool>
where
  F: Fn(&str) -> Option<String>,
{
  let Some(raw) = lookup(key) else {
    return Ok(default);
  };
  match raw.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Ok(true),
    "0" | "false" | "no" | "off" => Ok(false),
    other => Err(FlowError::Configuration {
      key: key.to_string(),
      message: format!("expected a boolean, got '{}'", other),
    }),
  }
}
