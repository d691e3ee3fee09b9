//! Runtime registry of node types.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tlm_core::TlmError;
use tlm_core::error::check_core_version;

use crate::error::{GraphError, GraphResult};
use crate::node::Node;
use crate::node_types::{NodeTemplate, builtin_templates};

/// Library name under which the built-in node types are registered.
pub const BUILTIN_LIBRARY: &str = "builtin";

struct Entry {
    template: Arc<NodeTemplate>,
    library: String,
}

/// Registry mapping node type names to templates.
///
/// Shared by reference between a session and the systems it builds; all
/// methods take `&self`.
#[derive(Default)]
pub struct NodeFactory {
    entries: RwLock<HashMap<String, Entry>>,
}

impl std::fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeFactory")
            .field("types", &self.type_names())
            .finish()
    }
}

impl NodeFactory {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the hydraulic, mechanic, electric and signal types.
    pub fn with_builtin() -> Self {
        let factory = Self::new();
        {
            let mut entries = factory.write();
            for template in builtin_templates() {
                entries.insert(
                    template.type_name.clone(),
                    Entry {
                        template: Arc::new(template),
                        library: BUILTIN_LIBRARY.to_string(),
                    },
                );
            }
        }
        factory
    }

    pub fn register(&self, library: &str, template: NodeTemplate) -> GraphResult<()> {
        let mut entries = self.write();
        if entries.contains_key(&template.type_name) {
            return Err(GraphError::DuplicateNodeType {
                node_type: template.type_name.clone(),
            });
        }
        tracing::debug!(node_type = %template.type_name, library, "registered node type");
        entries.insert(
            template.type_name.clone(),
            Entry {
                template: Arc::new(template),
                library: library.to_string(),
            },
        );
        Ok(())
    }

    /// Register a whole library's templates, or none of them.
    ///
    /// # Arguments
    /// * `library` - library name, used later by [`Self::unregister_library`]
    /// * `core_version` - core version the library was built against
    /// * `templates` - node types to add
    pub fn load_templates(
        &self,
        library: &str,
        core_version: &str,
        templates: Vec<NodeTemplate>,
    ) -> GraphResult<usize> {
        check_core_version(library, core_version).map_err(|e| match e {
            TlmError::IncompatibleVersion {
                library,
                expected,
                found,
            } => GraphError::IncompatibleLibrary {
                library,
                expected,
                found,
            },
            other => GraphError::IncompatibleLibrary {
                library: library.to_string(),
                expected: tlm_core::CORE_VERSION.to_string(),
                found: other.to_string(),
            },
        })?;

        let mut entries = self.write();
        for (i, t) in templates.iter().enumerate() {
            let clash = entries.contains_key(&t.type_name)
                || templates[..i].iter().any(|o| o.type_name == t.type_name);
            if clash {
                return Err(GraphError::DuplicateNodeType {
                    node_type: t.type_name.clone(),
                });
            }
        }
        let count = templates.len();
        for template in templates {
            entries.insert(
                template.type_name.clone(),
                Entry {
                    template: Arc::new(template),
                    library: library.to_string(),
                },
            );
        }
        tracing::info!(library, count, "loaded node types");
        Ok(count)
    }

    pub fn unregister(&self, node_type: &str) -> GraphResult<()> {
        self.write()
            .remove(node_type)
            .map(|_| ())
            .ok_or_else(|| GraphError::UnknownNodeType {
                node_type: node_type.to_string(),
            })
    }

    /// Remove every type registered by `library`. Returns how many went.
    pub fn unregister_library(&self, library: &str) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, e| e.library != library);
        before - entries.len()
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.read().contains_key(node_type)
    }

    pub fn template(&self, node_type: &str) -> GraphResult<Arc<NodeTemplate>> {
        self.read()
            .get(node_type)
            .map(|e| Arc::clone(&e.template))
            .ok_or_else(|| GraphError::UnknownNodeType {
                node_type: node_type.to_string(),
            })
    }

    /// A fresh node of `node_type` with template defaults.
    pub fn create(&self, node_type: &str) -> GraphResult<Node> {
        Ok(self.template(node_type)?.instantiate())
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
