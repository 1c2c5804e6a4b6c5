use super::ToolDefinition;
use crate::types::Tool;

/// Registered tools in registration order.
///
/// Registering a name twice replaces the earlier definition in place.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolDefinition) {
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(existing) => {
                tracing::debug!(tool = tool.name(), "replacing registered tool");
                *existing = tool;
            }
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(ToolDefinition::name).collect()
    }

    /// Declarations for a request, or `None` when nothing is registered.
    pub fn to_tools(&self) -> Option<Vec<Tool>> {
        if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.iter().map(ToolDefinition::to_tool).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn tool(name: &str, description: &str) -> ToolDefinition {
        ToolDefinition::new(name, description, Value::Null, |_| async move {
            Ok(json!(null))
        })
    }

    #[test]
    fn keeps_order_and_replaces_by_name() {
        let mut registry = ToolRegistry::new();
        assert!(registry.to_tools().is_none());

        registry.register(tool("a", "first"));
        registry.register(tool("b", "second"));
        registry.register(tool("a", "replaced"));

        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.get("a").map(|t| t.description()), Some("replaced"));
        assert!(registry.get("missing").is_none());

        let declared = registry.to_tools().unwrap();
        assert_eq!(declared.len(), 2);
        assert_eq!(declared[0].function.parameters["type"], "object");
    }
}
