//! Module resolution.
//!
//! Route scripts, layout scripts and components are loaded through an
//! injected [`ModuleResolver`] keyed by logical kind, name and the
//! conventional path, so the router never evaluates code by path itself.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::script::{ComponentRegistry, ScriptDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    RouteScript,
    LayoutScript,
    Component,
    ComponentRegistry,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModuleKind::RouteScript => "route script",
            ModuleKind::LayoutScript => "layout script",
            ModuleKind::Component => "component",
            ModuleKind::ComponentRegistry => "component registry",
        })
    }
}

/// What to load: the logical identity plus the conventional URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRequest {
    pub kind: ModuleKind,
    pub name: String,
    pub path: String,
}

impl ModuleRequest {
    pub fn new(kind: ModuleKind, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            path: path.into(),
        }
    }
}

/// A loaded module's default export.
#[derive(Debug, Clone)]
pub enum ModuleExport {
    Script(Arc<ScriptDefinition>),
    Registry(ComponentRegistry),
    /// The module loaded but exported nothing usable.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleErrorKind {
    Missing,
    Failed,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ModuleLoadError {
    pub kind: ModuleErrorKind,
    pub message: String,
}

impl ModuleLoadError {
    pub fn missing(path: &str) -> Self {
        Self {
            kind: ModuleErrorKind::Missing,
            message: format!("Failed to resolve module: {path}"),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            kind: ModuleErrorKind::Failed,
            message: message.into(),
        }
    }

    /// Missing kind, or a message that reads like a missing resource.
    pub fn is_not_found(&self) -> bool {
        if self.kind == ModuleErrorKind::Missing {
            return true;
        }
        let message = self.message.to_ascii_lowercase();
        ["not found", "failed to resolve", "failed to fetch"]
            .iter()
            .any(|needle| message.contains(needle))
    }
}

#[async_trait]
pub trait ModuleResolver: Send + Sync {
    async fn resolve(&self, request: &ModuleRequest) -> Result<ModuleExport, ModuleLoadError>;
}

#[async_trait]
impl<R: ModuleResolver + ?Sized> ModuleResolver for Arc<R> {
    async fn resolve(&self, request: &ModuleRequest) -> Result<ModuleExport, ModuleLoadError> {
        (**self).resolve(request).await
    }
}

/// Resolver backed by a fixed table, for embedded bundles and tests.
#[derive(Default)]
pub struct StaticModuleResolver {
    modules: RwLock<HashMap<(ModuleKind, String), ModuleExport>>,
}

impl StaticModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: ModuleKind, name: impl Into<String>, export: ModuleExport) {
        self.modules.write().insert((kind, name.into()), export);
    }

    pub fn with_route(self, name: impl Into<String>, script: ScriptDefinition) -> Self {
        self.insert(ModuleKind::RouteScript, name, ModuleExport::Script(Arc::new(script)));
        self
    }

    pub fn with_layout(self, name: impl Into<String>, script: ScriptDefinition) -> Self {
        self.insert(ModuleKind::LayoutScript, name, ModuleExport::Script(Arc::new(script)));
        self
    }

    pub fn with_component(self, name: impl Into<String>, script: ScriptDefinition) -> Self {
        self.insert(ModuleKind::Component, name, ModuleExport::Script(Arc::new(script)));
        self
    }

    pub fn with_registry(self, registry: ComponentRegistry) -> Self {
        self.insert(ModuleKind::ComponentRegistry, "_components", ModuleExport::Registry(registry));
        self
    }

    pub fn remove(&self, kind: ModuleKind, name: &str) -> bool {
        self.modules.write().remove(&(kind, name.to_string())).is_some()
    }
}

#[async_trait]
impl ModuleResolver for StaticModuleResolver {
    async fn resolve(&self, request: &ModuleRequest) -> Result<ModuleExport, ModuleLoadError> {
        self.modules
            .read()
            .get(&(request.kind, request.name.clone()))
            .cloned()
            .ok_or_else(|| ModuleLoadError::missing(&request.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticModuleResolver::new()
            .with_route("home", ScriptDefinition::new().with_name("Home"));

        let request = ModuleRequest::new(ModuleKind::RouteScript, "home", "/src/logic/home.js");
        match resolver.resolve(&request).await.unwrap() {
            ModuleExport::Script(script) => assert_eq!(script.name.as_deref(), Some("Home")),
            other => panic!("unexpected export: {other:?}"),
        }

        let request =
            ModuleRequest::new(ModuleKind::LayoutScript, "home", "/src/logic/layout/home.js");
        let err = resolver.resolve(&request).await.unwrap_err();
        assert_eq!(err.kind, ModuleErrorKind::Missing);
        assert!(err.to_string().contains("/src/logic/layout/home.js"));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(ModuleLoadError::failed("Module Not Found").is_not_found());
        assert!(ModuleLoadError::failed("Failed to fetch").is_not_found());
        assert!(!ModuleLoadError::failed("ReferenceError: x is not defined").is_not_found());
    }
}
