//! In-memory tool catalog.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use capgate_primitives::{ConfigError, ConfigResult, NotFoundError};
use tracing::{info, warn};

use crate::definition::Tool;

/// Tag set used to narrow listings. A tool passes when it carries at least one
/// of the tags.
pub type TagFilter = BTreeSet<String>;

#[derive(Default)]
struct Catalog {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

/// Registry that stores tools keyed by name, preserving registration order.
///
/// Registration takes the write lock; lookups and listings share the read
/// lock. Registration is expected to finish before request traffic starts.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Catalog>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new tool.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateName`] if the name is already present.
    pub fn register(&self, tool: Tool) -> ConfigResult<()> {
        let mut catalog = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let name = tool.name().to_owned();
        if catalog.index.contains_key(&name) {
            return Err(ConfigError::DuplicateName { name });
        }

        info!(
            tool = %name,
            required = tool.definition().required_capabilities().len(),
            "tool registered"
        );
        let position = catalog.tools.len();
        catalog.tools.push(tool);
        catalog.index.insert(name, position);
        Ok(())
    }

    /// Registers a tool, replacing any existing tool with the same name.
    ///
    /// A replaced tool keeps its original listing position. Returns the
    /// previous tool, if any.
    pub fn replace(&self, tool: Tool) -> Option<Tool> {
        let mut catalog = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let name = tool.name().to_owned();
        if let Some(&position) = catalog.index.get(&name) {
            warn!(tool = %name, "tool definition replaced");
            return Some(std::mem::replace(&mut catalog.tools[position], tool));
        }

        info!(tool = %name, "tool registered");
        let position = catalog.tools.len();
        catalog.tools.push(tool);
        catalog.index.insert(name, position);
        None
    }

    /// Returns the tool registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::UnknownOrForbidden`] when no such tool exists.
    pub fn get(&self, name: &str) -> Result<Tool, NotFoundError> {
        let catalog = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        catalog
            .index
            .get(name)
            .map(|&position| catalog.tools[position].clone())
            .ok_or(NotFoundError::UnknownOrForbidden)
    }

    /// Lists tools in registration order, optionally narrowed by tags.
    ///
    /// An empty filter is treated the same as no filter.
    #[must_use]
    pub fn list(&self, tags: Option<&TagFilter>) -> Vec<Tool> {
        let catalog = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let filter = tags.filter(|tags| !tags.is_empty());
        catalog
            .tools
            .iter()
            .filter(|tool| {
                filter.is_none_or(|wanted| !tool.definition().tags().is_disjoint(wanted))
            })
            .cloned()
            .collect()
    }

    /// Returns registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let catalog = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        catalog
            .tools
            .iter()
            .map(|tool| tool.name().to_owned())
            .collect()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tools
            .len()
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
