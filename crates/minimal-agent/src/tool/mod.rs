//! Tool model.
//!
//! A [`Tool`] is a named, self-describing capability. Its [`ToolSpec`] is
//! projected into a [`ToolSchema`] for planning prompts; execution takes a
//! typed [`ToolArgs`] bag and yields a [`ToolOutput`], which the
//! [`ToolRegistry`] normalizes into a [`ToolResult`].

pub mod registry;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub use registry::ToolRegistry;

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

/// Broad grouping of a tool, shown to the planner next to its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Llm,
    Vision,
    Communication,
    FileSystem,
    Browser,
    System,
    Custom,
}

impl ToolCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Vision => "vision",
            Self::Communication => "communication",
            Self::FileSystem => "file_system",
            Self::Browser => "browser",
            Self::System => "system",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
}

impl ToolParameter {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_owned(),
            param_type,
            description: description.to_owned(),
            required: true,
            default: None,
            allowed: None,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_enum<I, V>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(allowed.into_iter().map(Into::into).collect());
        self
    }
}

/// Static description of a tool. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub parameters: Vec<ToolParameter>,
    pub requires_confirmation: bool,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, category: ToolCategory) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            category,
            parameters: Vec::new(),
            requires_confirmation: false,
        }
    }

    pub fn param(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Mark the tool as performing a sensitive action.
    pub fn confirmation_required(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    /// Schema projection under the tool's own name.
    pub fn schema(&self) -> ToolSchema {
        self.schema_as(&self.name)
    }

    /// Schema projection under an alias.
    pub fn schema_as(&self, name: &str) -> ToolSchema {
        ToolSchema {
            name: name.to_owned(),
            description: self.description.clone(),
            category: self.category,
            requires_confirmation: self.requires_confirmation,
            parameters: self.parameters.clone(),
        }
    }
}

/// What the planner sees of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub requires_confirmation: bool,
    pub parameters: Vec<ToolParameter>,
}

impl ToolSchema {
    /// JSON-Schema object describing the parameters.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for p in &self.parameters {
            let mut prop = json!({
                "type": p.param_type.as_str(),
                "description": p.description,
            });
            if let Some(default) = &p.default {
                prop["default"] = default.clone();
            }
            if let Some(allowed) = &p.allowed {
                prop["enum"] = Value::Array(allowed.clone());
            }
            properties.insert(p.name.clone(), prop);
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// A single argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl ArgValue {
    /// Convert a JSON value. Nulls are absent; arrays and objects are
    /// carried as their JSON text.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s.clone())),
            other => Some(Self::Text(other.to_string())),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for ArgValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Named argument bag passed to [`Tool::execute`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: BTreeMap<String, ArgValue>,
}

impl ToolArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object. Anything other than an object yields an
    /// empty bag.
    pub fn from_json(value: &Value) -> Self {
        let values = value
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| ArgValue::from_json(v).map(|a| (k.clone(), a)))
                    .collect()
            })
            .unwrap_or_default();
        Self { values }
    }

    pub fn with(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<ArgValue>) {
        self.values.insert(name.to_owned(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            ArgValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric argument; numeric text is accepted too.
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name)? {
            ArgValue::Number(n) => Some(*n),
            ArgValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name)? {
            ArgValue::Bool(b) => Some(*b),
            ArgValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        match self.values.get(name)? {
            ArgValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// A text argument that must be present and non-blank.
    pub fn require_text(&self, name: &str) -> Result<&str, ToolError> {
        match self.text(name) {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(ToolError::MissingArgument {
                name: name.to_owned(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.values.iter()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    /// Filled in by the registry after timing the call.
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<Value>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            latency_ms: 0,
            tokens_used: 0,
            metadata: Map::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            latency_ms: 0,
            tokens_used: 0,
            metadata: Map::new(),
        }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = tokens;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }

    /// The output as text. Strings pass through; other values are rendered
    /// as JSON; a missing output is empty.
    pub fn output_text(&self) -> String {
        match &self.output {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Model that served the call, when the tool reported one.
    pub fn model(&self) -> Option<&str> {
        self.metadata.get("model").and_then(Value::as_str)
    }
}

/// What a tool body returns: either a complete result or a bare value that
/// the registry wraps as a success.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Result(ToolResult),
    Value(Value),
}

impl ToolOutput {
    pub fn into_result(self) -> ToolResult {
        match self {
            Self::Result(r) => r,
            Self::Value(v) => ToolResult::ok(v),
        }
    }
}

impl From<ToolResult> for ToolOutput {
    fn from(value: ToolResult) -> Self {
        Self::Result(value)
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<String> for ToolOutput {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<&str> for ToolOutput {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure raised from a tool body. The registry reports it as
/// `"{kind}: {message}"` in a failed [`ToolResult`].
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("'{name}' is required")]
    MissingArgument { name: String },

    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("{what} is not configured")]
    NotConfigured { what: String },

    #[error("{0}")]
    Upstream(#[from] crate::error::AgentError),

    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    /// Variant name, used as the error kind in failed results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingArgument { .. } => "MissingArgument",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::NotConfigured { .. } => "NotConfigured",
            Self::Upstream(_) => "Upstream",
            Self::Internal(_) => "Internal",
        }
    }
}

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

/// An executable capability.
///
/// Implementations validate their arguments before performing any side
/// effect and may return either a full [`ToolResult`] or a plain value.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
