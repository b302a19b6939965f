// Mock module resolver

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use vellum_core::module::{
    ModuleExport, ModuleKind, ModuleLoadError, ModuleRequest, ModuleResolver, StaticModuleResolver,
};
use vellum_core::script::{ComponentRegistry, ScriptDefinition};

/// [`StaticModuleResolver`] with call recording, gates, delays and
/// injected failures.
#[derive(Default)]
pub struct MockModuleResolver {
    modules: StaticModuleResolver,
    failures: RwLock<HashMap<(ModuleKind, String), String>>,
    gates: RwLock<HashMap<String, Arc<Notify>>>,
    delays: RwLock<HashMap<String, Duration>>,
    calls: Mutex<Vec<ModuleRequest>>,
}

impl MockModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(self, name: &str, script: ScriptDefinition) -> Self {
        self.modules.insert(ModuleKind::RouteScript, name, ModuleExport::Script(Arc::new(script)));
        self
    }

    pub fn with_layout(self, name: &str, script: ScriptDefinition) -> Self {
        self.modules.insert(ModuleKind::LayoutScript, name, ModuleExport::Script(Arc::new(script)));
        self
    }

    pub fn with_component(self, name: &str, script: ScriptDefinition) -> Self {
        self.modules.insert(ModuleKind::Component, name, ModuleExport::Script(Arc::new(script)));
        self
    }

    pub fn with_registry(self, registry: ComponentRegistry) -> Self {
        self.modules
            .insert(ModuleKind::ComponentRegistry, "_components", ModuleExport::Registry(registry));
        self
    }

    /// Route module that loads but has no default export.
    pub fn with_empty_route(self, name: &str) -> Self {
        self.modules.insert(ModuleKind::RouteScript, name, ModuleExport::Empty);
        self
    }

    /// Fail loads of `name` with `message`.
    pub fn with_failure(self, kind: ModuleKind, name: &str, message: &str) -> Self {
        self.failures.write().insert((kind, name.to_string()), message.to_string());
        self
    }

    /// Slow down route script loads for `route`.
    pub fn with_delay(self, route: &str, delay: Duration) -> Self {
        self.delays.write().insert(route.to_string(), delay);
        self
    }

    /// Hold route script loads for `route` until the returned gate is
    /// notified.
    pub fn gate(&self, route: &str) -> Arc<Notify> {
        self.gates
            .write()
            .entry(route.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    pub fn calls(&self) -> Vec<ModuleRequest> {
        self.calls.lock().clone()
    }

    /// How often a module of `kind` named `name` was requested.
    pub fn call_count(&self, kind: ModuleKind, name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.kind == kind && r.name == name)
            .count()
    }
}

#[async_trait]
impl ModuleResolver for MockModuleResolver {
    async fn resolve(&self, request: &ModuleRequest) -> Result<ModuleExport, ModuleLoadError> {
        self.calls.lock().push(request.clone());

        if request.kind == ModuleKind::RouteScript {
            let gate = self.gates.read().get(&request.name).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let delay = self.delays.read().get(&request.name).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }

        let failure = self.failures.read().get(&(request.kind, request.name.clone())).cloned();
        if let Some(message) = failure {
            return Err(ModuleLoadError::failed(message));
        }
        self.modules.resolve(request).await
    }
}
