//! Configuration
//!
//! - [`Config`]: process-wide defaults and global middleware. Sessions read a
//!   [`snapshot`] when they are built (defaults) and on every call (global
//!   middleware), so policy registered later still runs first.
//! - [`ProviderConfig`]: the setup a provider implementation is built from.

use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::LlmError;
use crate::middleware::Middleware;
use crate::retry::RetryOptions;
use crate::tools::ToolExecutionMode;

pub const DEFAULT_MAX_TOOL_CALLS: usize = 5;
pub const DEFAULT_MAX_TOOL_RETRIES: u32 = 1;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub const ENV_MAX_TOOL_CALLS: &str = "CONFAB_MAX_TOOL_CALLS";
pub const ENV_MAX_TOOL_RETRIES: &str = "CONFAB_MAX_TOOL_RETRIES";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "CONFAB_REQUEST_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "CONFAB_MAX_RETRIES";

#[derive(Clone)]
pub struct Config {
    /// Tool-call round trips allowed per `ask`/`stream`.
    pub max_tool_calls: usize,
    /// Re-invocations a `Retry` answer may trigger per tool call.
    pub max_tool_retries: u32,
    pub tool_execution: ToolExecutionMode,
    pub parallel_tool_calls: bool,
    pub validate_tool_arguments: bool,
    pub request_timeout: Option<Duration>,
    /// Retry for provider calls; `None` disables it.
    pub retry: Option<RetryOptions>,
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            max_tool_retries: DEFAULT_MAX_TOOL_RETRIES,
            tool_execution: ToolExecutionMode::Auto,
            parallel_tool_calls: true,
            validate_tool_arguments: true,
            request_timeout: None,
            retry: Some(RetryOptions::backoff(DEFAULT_MAX_RETRIES)),
            middlewares: Vec::new(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("max_tool_calls", &self.max_tool_calls)
            .field("max_tool_retries", &self.max_tool_retries)
            .field("tool_execution", &self.tool_execution)
            .field("parallel_tool_calls", &self.parallel_tool_calls)
            .field("validate_tool_arguments", &self.validate_tool_arguments)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .field(
                "middlewares",
                &self
                    .middlewares
                    .iter()
                    .map(|m| m.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Config {
    /// Defaults overlaid with `CONFAB_*` environment variables.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LlmError> {
        if let Some(value) = parse_var::<usize>(&lookup, ENV_MAX_TOOL_CALLS)? {
            self.max_tool_calls = value;
        }
        if let Some(value) = parse_var::<u32>(&lookup, ENV_MAX_TOOL_RETRIES)? {
            self.max_tool_retries = value;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_REQUEST_TIMEOUT_SECS)? {
            self.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, ENV_MAX_RETRIES)? {
            self.retry = (attempts > 1).then(|| RetryOptions::backoff(attempts));
        }
        Ok(self)
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, LlmError>
where
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            LlmError::ConfigurationError(format!("{key}={raw:?} is invalid: {e}"))
        }),
    }
}

fn global() -> &'static RwLock<Config> {
    static GLOBAL: OnceLock<RwLock<Config>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(Config::default()))
}

/// Mutate the global configuration.
pub fn configure(f: impl FnOnce(&mut Config)) {
    let mut guard = global()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard);
}

/// Copy of the global configuration.
pub fn snapshot() -> Config {
    global()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Append a middleware that runs before every session's own middleware.
pub fn add_global_middleware(middleware: Arc<dyn Middleware>) {
    configure(|cfg| cfg.middlewares.push(middleware));
}

/// Global middleware in registration order.
pub fn global_middlewares() -> Vec<Arc<dyn Middleware>> {
    global()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .middlewares
        .clone()
}

/// Restore the defaults.
pub fn reset() {
    configure(|cfg| *cfg = Config::default());
}

/// Provider setup. The API key never appears in `Debug` output.
#[derive(Debug)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: SecretString,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl ProviderConfig {
    pub fn new(provider_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            api_key: SecretString::from(api_key.into()),
            base_url: None,
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    pub fn validate(&self) -> Result<(), LlmError> {
        if self.provider_id.trim().is_empty() {
            return Err(LlmError::ConfigurationError(
                "provider id must not be empty".into(),
            ));
        }
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(LlmError::ConfigurationError(format!(
                "API key for provider '{}' is empty",
                self.provider_id
            )));
        }
        if let Some(url) = &self.base_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(LlmError::ConfigurationError(format!(
                    "base URL for provider '{}' must be http(s): {url}",
                    self.provider_id
                )));
            }
        }
        Ok(())
    }
}
