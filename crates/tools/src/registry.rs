//! Tool registration (spec §4.8): `{name, json_schema, handler, timeout,
//! side_effect_class}`. Registration is idempotent by name — a second
//! `register` for the same name replaces the definition, the same semantics
//! as the teacher's `HashMap`-backed tool table in `aigent-daemon`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectClass {
    Pure,
    Read,
    Write,
    External,
}

/// Implemented once per tool. Handlers receive already-schema-validated
/// arguments (spec §9 redesign flag: "replace [dynamically-typed arguments]
/// with JSON-schema validation ... handlers receive validated ... records").
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<Value, ToolError>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, ToolError>> + Send,
{
    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        (self)(arguments).await
    }
}

pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub json_schema: Value,
    pub side_effect_class: SideEffectClass,
    pub timeout: Duration,
    /// A terminal tool (`send_message`) ends the reasoning loop's turn when
    /// it is successfully dispatched (spec §4.9).
    pub terminal: bool,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        json_schema: Value,
        side_effect_class: SideEffectClass,
        timeout: Duration,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            json_schema,
            side_effect_class,
            timeout,
            terminal: false,
            handler,
        }
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// Read-mostly registry: mutations (register) take the registry-wide
/// `DashMap` lock per shard, lookups don't block each other (spec §5).
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<ToolDefinition>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, def: ToolDefinition) {
        self.tools.insert(def.name.clone(), Arc::new(def));
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.tools.get(name).map(|e| e.clone())
    }

    pub fn list(&self) -> Vec<Arc<ToolDefinition>> {
        self.tools.iter().map(|e| e.value().clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop_def(name: &str) -> ToolDefinition {
        ToolDefinition::new(
            name,
            "test tool",
            json!({"type": "object"}),
            SideEffectClass::Pure,
            Duration::from_secs(1),
            Arc::new(|args: Value| async move { Ok(args) }),
        )
    }

    #[test]
    fn register_is_idempotent_by_name() {
        let registry = ToolRegistry::new();
        registry.register(noop_def("alpha"));
        registry.register(noop_def("alpha"));
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn get_missing_returns_none() {
        let registry = ToolRegistry::new();
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn closures_work_as_handlers() {
        let registry = ToolRegistry::new();
        registry.register(noop_def("echo"));
        let def = registry.get("echo").unwrap();
        let out = def.handler.call(json!({"x": 1})).await.unwrap();
        assert_eq!(out, json!({"x": 1}));
    }
}
