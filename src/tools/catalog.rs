//! Tool catalog: the fixed registry the server dispatches against
//!
//! Built once at startup and never mutated afterwards; share it by reference
//! or behind an `Arc`.

use std::collections::HashMap;

use serde_json::{Map, Value, json};

use super::{
    ApplyDiscountTool, CalculateTotalTool, GetPriceTool, HelpTool, Tool, ToolContext, ToolError, rejected,
};
use crate::config::CatalogConfig;
use crate::protocol::{CallResult, ToolDescriptor};

/// Catalog of tools plus the context their handlers run against
pub struct ToolCatalog {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<&'static str, usize>,
    ctx: ToolContext,
}

impl ToolCatalog {
    /// Create a catalog from an explicit tool list. Later duplicates are ignored.
    pub fn new(ctx: ToolContext, tools: Vec<Box<dyn Tool>>) -> Self {
        let mut kept: Vec<Box<dyn Tool>> = Vec::with_capacity(tools.len());
        let mut index = HashMap::new();
        for tool in tools {
            if index.contains_key(tool.name()) {
                log::warn!("Ignoring duplicate tool registration: {}", tool.name());
                continue;
            }
            index.insert(tool.name(), kept.len());
            kept.push(tool);
        }
        Self { tools: kept, index, ctx }
    }

    /// The four product tools, in advertisement order.
    pub fn builtin(ctx: ToolContext) -> Self {
        Self::new(
            ctx,
            vec![
                Box::new(HelpTool),
                Box::new(GetPriceTool),
                Box::new(CalculateTotalTool),
                Box::new(ApplyDiscountTool),
            ],
        )
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::builtin(ToolContext::from_config(config))
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// List all tool names in registration order
    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Descriptors advertised by `tools/list`
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|t| ToolDescriptor::new(t.name(), t.description(&self.ctx), t.input_schema()))
            .collect()
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get number of tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if catalog is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool. An unknown name is an error-shaped result, not a fault;
    /// absent or null arguments count as an empty object.
    pub fn call(&self, name: &str, arguments: Option<&Value>) -> Result<CallResult, ToolError> {
        let Some(tool) = self.get(name) else {
            return Ok(rejected(format!("Unknown tool: {}", name), json!({ "tool": name })));
        };

        let empty = Map::new();
        let args = match arguments {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => return Err(ToolError::NotAnObject),
        };

        log::debug!("Calling tool {} with {} argument(s)", name, args.len());
        tool.call(args, &self.ctx)
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::builtin(ToolContext::default())
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.list())
            .field("ctx", &self.ctx)
            .finish()
    }
}
