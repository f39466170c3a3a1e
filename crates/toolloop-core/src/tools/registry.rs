//! Tool registry
//!
//! Maps tool names to their declaration and handler. Registration happens at
//! startup through `&mut self`; afterwards the registry is shared read-only
//! (usually behind an `Arc`) by every conversation using it.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::logging::{NoOpLogger, SharedLogger};
use crate::types::ToolDeclaration;

use super::handler::ToolHandler;

/// Errors raised by registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A tool with this name is already registered
    #[error("tool already registered: {0}")]
    DuplicateName(String),

    /// No tool with this name is registered
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// A declaration together with its handler
#[derive(Clone)]
pub struct RegisteredTool {
    pub declaration: ToolDeclaration,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("declaration", &self.declaration)
            .finish_non_exhaustive()
    }
}

/// Registry of callable tools
pub struct ToolRegistry {
    /// Tools in registration order
    tools: Vec<RegisteredTool>,
    /// Name -> position in `tools`
    index: HashMap<String, usize>,
    logger: SharedLogger,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(Arc::new(NoOpLogger))
    }
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new(logger: SharedLogger) -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            logger,
        }
    }

    /// Register a tool. Fails if the name is taken.
    pub fn register(
        &mut self,
        declaration: ToolDeclaration,
        handler: Arc<dyn ToolHandler>,
    ) -> RegistryResult<()> {
        if self.index.contains_key(&declaration.name) {
            self.logger.error(&format!(
                "[ToolRegistry] Duplicate tool name: {}",
                declaration.name
            ));
            return Err(RegistryError::DuplicateName(declaration.name));
        }

        self.logger.debug(&format!(
            "[ToolRegistry] Registered tool: {}",
            declaration.name
        ));
        self.index.insert(declaration.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            declaration,
            handler,
        });
        Ok(())
    }

    /// Builder-style registration
    pub fn with_tool(
        mut self,
        declaration: ToolDeclaration,
        handler: Arc<dyn ToolHandler>,
    ) -> RegistryResult<Self> {
        self.register(declaration, handler)?;
        Ok(self)
    }

    /// Look up the handler for a tool; `UnknownTool` when it is not registered
    pub fn resolve(&self, name: &str) -> RegistryResult<Arc<dyn ToolHandler>> {
        self.get(name)
            .map(|tool| Arc::clone(&tool.handler))
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// Look up a registered tool with its declaration
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&idx| &self.tools[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declarations in registration order
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.iter().map(|t| t.declaration.clone()).collect()
    }

    /// Registered tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.declaration.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
