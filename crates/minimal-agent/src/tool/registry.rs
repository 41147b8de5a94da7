//! Name-keyed tool table with fault-isolated execution.
//!
//! Registration happens once at startup; afterwards the registry is shared
//! read-only across requests. [`ToolRegistry::execute`] never fails: an
//! unknown name, an error returned by the tool and a panic inside the tool
//! all come back as a failed [`ToolResult`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde_json::Value;

use super::{Tool, ToolArgs, ToolError, ToolResult, ToolSchema};
use crate::error::{AgentError, Result};

struct Entry {
    tool: Arc<dyn Tool>,
    schema: ToolSchema,
}

/// Registered tools, iterated in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Entry>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its spec name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.spec().name.clone();
        self.register_as(&name, tool)
    }

    /// Register a tool under `name`. The same tool object may be registered
    /// under several names; each name must be unique.
    pub fn register_as(&mut self, name: &str, tool: Arc<dyn Tool>) -> Result<()> {
        if self.tools.contains_key(name) {
            return Err(AgentError::DuplicateTool {
                name: name.to_owned(),
            });
        }

        let schema = tool.spec().schema_as(name);
        tracing::debug!(tool = %name, category = %schema.category, "tool registered");
        self.tools.insert(name.to_owned(), Entry { tool, schema });
        self.order.push(name.to_owned());
        Ok(())
    }

    /// Remove a tool. Unknown names are ignored.
    pub fn unregister(&mut self, name: &str) {
        if self.tools.remove(name).is_some() {
            self.order.retain(|n| n != name);
            tracing::debug!(tool = %name, "tool unregistered");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|e| Arc::clone(&e.tool))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Schemas of every registered tool in registration order.
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.order
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|e| e.schema.clone())
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: &ToolArgs) -> ToolResult {
        let Some(entry) = self.tools.get(name) else {
            let available = self.names();
            tracing::warn!(tool = %name, "tool not found");
            return ToolResult::failure(format!(
                "Tool '{name}' not found. Available: [{}]",
                available.join(", ")
            ))
            .with_meta(
                "available",
                available.iter().map(|n| Value::from(*n)).collect::<Vec<_>>(),
            );
        };

        let start = Instant::now();
        let outcome = AssertUnwindSafe(entry.tool.execute(args))
            .catch_unwind()
            .await;

        let mut result = match outcome {
            Ok(Ok(output)) => output.into_result(),
            Ok(Err(err)) => error_result(&err),
            Err(payload) => panic_result(payload),
        };
        result.latency_ms = start.elapsed().as_millis() as u64;

        if result.success {
            tracing::debug!(tool = %name, latency_ms = result.latency_ms, "tool succeeded");
        } else {
            tracing::warn!(
                tool = %name,
                latency_ms = result.latency_ms,
                error = result.error.as_deref().unwrap_or_default(),
                "tool failed"
            );
        }
        result
    }
}

fn error_result(err: &ToolError) -> ToolResult {
    let mut trace = format!("{err:?}");
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        trace.push_str(&format!("\ncaused by: {cause}"));
        source = cause.source();
    }

    ToolResult::failure(format!("{}: {err}", err.kind()))
        .with_meta("error_kind", err.kind())
        .with_meta("trace", trace)
}

fn panic_result(payload: Box<dyn Any + Send>) -> ToolResult {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "tool panicked".to_owned());

    ToolResult::failure(format!("Panic: {message}"))
        .with_meta("error_kind", "Panic")
        .with_meta("trace", format!("panic payload: {message}"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::tool::{ParamType, ToolCategory, ToolOutput, ToolParameter, ToolSpec};

    struct EchoTool {
        spec: ToolSpec,
        calls: AtomicU32,
    }

    impl EchoTool {
        fn new(name: &str) -> Self {
            Self {
                spec: ToolSpec::new(name, "Echo the text argument", ToolCategory::Custom)
                    .param(ToolParameter::required("text", ParamType::String, "Text")),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, args: &ToolArgs) -> std::result::Result<ToolOutput, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(args.require_text("text")?.to_owned().into())
        }
    }

    struct PanicTool {
        spec: ToolSpec,
    }

    #[async_trait]
    impl Tool for PanicTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, _args: &ToolArgs) -> std::result::Result<ToolOutput, ToolError> {
            panic!("boom");
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool::new("echo"))).unwrap();
        let err = reg.register(Arc::new(EchoTool::new("echo"))).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool { name } if name == "echo"));
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn one_tool_under_two_names_routes_both() {
        let tool = Arc::new(EchoTool::new("echo"));
        let mut reg = ToolRegistry::new();
        reg.register(tool.clone()).unwrap();
        reg.register_as("repeat", tool.clone()).unwrap();

        let args = ToolArgs::new().with("text", "hi");
        assert!(reg.execute("echo", &args).await.success);
        assert!(reg.execute("repeat", &args).await.success);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 2);
        assert_eq!(reg.list_schemas()[1].name, "repeat");
    }

    #[test]
    fn unregister_is_idempotent_and_keeps_order() {
        let mut reg = ToolRegistry::new();
        for name in ["a", "b", "c"] {
            reg.register(Arc::new(EchoTool::new(name))).unwrap();
        }
        reg.unregister("b");
        reg.unregister("b");
        reg.unregister("never");
        assert_eq!(reg.names(), ["a", "c"]);
        let schemas: Vec<_> = reg.list_schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(schemas, ["a", "c"]);
    }

    #[tokio::test]
    async fn unknown_tool_lists_available_names() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool::new("echo"))).unwrap();
        let result = reg.execute("missing", &ToolArgs::new()).await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Tool 'missing' not found. Available: [echo]")
        );
        assert_eq!(result.metadata["available"], json!(["echo"]));
    }

    #[tokio::test]
    async fn tool_errors_become_failed_results() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool::new("echo"))).unwrap();
        let result = reg.execute("echo", &ToolArgs::new()).await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("MissingArgument: 'text' is required")
        );
        assert_eq!(result.metadata["error_kind"], "MissingArgument");
        assert!(result.metadata.contains_key("trace"));
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(PanicTool {
            spec: ToolSpec::new("explode", "Always panics", ToolCategory::System),
        }))
        .unwrap();
        let result = reg.execute("explode", &ToolArgs::new()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Panic: boom"));
    }

    #[tokio::test]
    async fn bare_values_are_wrapped() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool::new("echo"))).unwrap();
        let result = reg
            .execute("echo", &ToolArgs::new().with("text", "hello"))
            .await;
        assert!(result.success);
        assert_eq!(result.output_text(), "hello");
        assert_eq!(result.tokens_used, 0);
    }
}
