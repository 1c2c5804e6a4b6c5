//! Tools
//!
//! Every tool a session can call is a [`ToolDefinition`]: a name, a
//! description, a JSON schema for the arguments and an async handler. Two
//! source shapes converge on it at registration time:
//!
//! - a type implementing [`TypedTool`], whose argument schema is derived with
//!   `schemars`;
//! - a raw `{"type": "function", "function": {...}}` declaration plus a
//!   handler closure ([`ToolDefinition::from_function_json`]).
//!
//! ```rust,ignore
//! use confab::tools::ToolDefinition;
//! use serde_json::json;
//!
//! let weather = ToolDefinition::new(
//!     "get_weather",
//!     "Current weather for a city",
//!     json!({"type": "object", "properties": {"location": {"type": "string"}}}),
//!     |_args| async move { Ok(json!({"temperature": 22})) },
//! );
//! ```

mod executor;
mod registry;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use executor::ToolExecutionMode;
pub(crate) use executor::ToolExecutor;
pub use registry::ToolRegistry;

use crate::error::{LlmError, ToolErrorKind};
use crate::types::{Tool, empty_object_schema};

/// Async tool body.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, LlmError>> + Send + Sync>;

/// A tool whose arguments are a Rust type.
#[async_trait]
pub trait TypedTool: Send + Sync + 'static {
    type Args: DeserializeOwned + schemars::JsonSchema + Send;
    type Output: Serialize + Send;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn execute(&self, args: Self::Args) -> Result<Self::Output, LlmError>;
}

/// Normalized tool: declaration plus handler.
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    parameters: Value,
    handler: ToolHandler,
    validator: Option<Arc<jsonschema::Validator>>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, LlmError>> + Send + 'static,
    {
        let handler: ToolHandler =
            Arc::new(move |args| -> BoxFuture<'static, Result<Value, LlmError>> {
                Box::pin(handler(args))
            });
        Self::from_parts(name.into(), description.into(), parameters, handler)
    }

    fn from_parts(
        name: String,
        description: String,
        parameters: Value,
        handler: ToolHandler,
    ) -> Self {
        let parameters = if parameters.is_null() {
            empty_object_schema()
        } else {
            parameters
        };
        let validator = match jsonschema::validator_for(&parameters) {
            Ok(validator) => Some(Arc::new(validator)),
            Err(e) => {
                tracing::warn!(
                    tool = %name,
                    "tool schema does not compile, arguments will not be validated: {}",
                    e
                );
                None
            }
        };
        Self {
            name,
            description,
            parameters,
            handler,
            validator,
        }
    }

    /// Normalize a raw `{"type": "function", "function": {name, description, parameters}}`
    /// declaration.
    pub fn from_function_json<F, Fut>(declaration: Value, handler: F) -> Result<Self, LlmError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, LlmError>> + Send + 'static,
    {
        if let Some(kind) = declaration.get("type").and_then(Value::as_str) {
            if kind != "function" {
                return Err(LlmError::ConfigurationError(format!(
                    "unsupported tool type '{kind}'"
                )));
            }
        }
        let function = declaration.get("function").ok_or_else(|| {
            LlmError::ConfigurationError("tool declaration has no 'function' object".into())
        })?;
        let name = function
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| LlmError::ConfigurationError("tool declaration has no name".into()))?;
        let description = function
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let parameters = function
            .get("parameters")
            .cloned()
            .unwrap_or_else(empty_object_schema);

        Ok(Self::new(name, description, parameters, handler))
    }

    /// Normalize a [`TypedTool`]; the argument schema is derived from `T::Args`.
    pub fn from_typed<T: TypedTool>(tool: T) -> Self {
        let parameters = serde_json::to_value(schemars::schema_for!(T::Args))
            .unwrap_or_else(|_| empty_object_schema());
        let name = tool.name().to_string();
        let description = tool.description().to_string();
        let tool = Arc::new(tool);
        let tool_name = name.clone();

        let handler: ToolHandler =
            Arc::new(move |args| -> BoxFuture<'static, Result<Value, LlmError>> {
                let tool = tool.clone();
                let tool_name = tool_name.clone();
                Box::pin(async move {
                    let typed: T::Args = serde_json::from_value(args).map_err(|e| {
                        LlmError::tool_error(
                            &tool_name,
                            ToolErrorKind::InvalidArguments,
                            e.to_string(),
                        )
                    })?;
                    let output = tool.execute(typed).await?;
                    Ok(serde_json::to_value(output)?)
                })
            });
        Self::from_parts(name, description, parameters, handler)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// The declaration sent to providers.
    pub fn to_tool(&self) -> Tool {
        Tool::function(&self.name, &self.description, self.parameters.clone())
    }

    /// Check `args` against the parameter schema.
    pub fn validate_arguments(&self, args: &Value) -> Result<(), LlmError> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(LlmError::tool_error(
                &self.name,
                ToolErrorKind::InvalidArguments,
                errors.join("; "),
            ))
        }
    }

    pub async fn invoke(&self, args: Value) -> Result<Value, LlmError> {
        (self.handler)(args).await
    }
}

/// Tool output as message text; strings pass through, everything else is JSON.
pub fn result_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
