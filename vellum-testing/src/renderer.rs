// Mock render runtime

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use vellum_core::{
    ComponentContext, ContainerId, ErrorPage, MountHandle, RenderRuntime, RenderedComponent, Result,
    RouterError,
};

/// Something the runtime was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    Created { container: ContainerId, route: String },
    MarkedExiting { except: ContainerId },
    RemovedExiting { containers: Vec<ContainerId> },
    Style { route: String },
    Mounted { container: ContainerId, route: String },
    Unmounted { container: ContainerId, route: String },
    Error { code: u16 },
    Cleared,
}

#[derive(Default)]
struct State {
    events: Vec<RenderEvent>,
    live: BTreeSet<ContainerId>,
    exiting: BTreeSet<ContainerId>,
    styles: BTreeMap<String, String>,
    mounted: Vec<(ContainerId, Arc<RenderedComponent>)>,
    errors: Vec<ErrorPage>,
}

/// Render runtime that records calls instead of drawing.
///
/// `next_frame` resolves immediately.
#[derive(Clone, Default)]
pub struct MockRenderer {
    state: Arc<Mutex<State>>,
    next_id: Arc<AtomicU64>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make mounts of `route` fail.
    pub fn fail_mount(&self, route: &str) {
        self.failing.lock().insert(route.to_string());
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.state.lock().events.clone()
    }

    /// Routes mounted so far, in order.
    pub fn mounted_routes(&self) -> Vec<String> {
        self.state
            .lock()
            .mounted
            .iter()
            .map(|(_, component)| component.route.name.clone())
            .collect()
    }

    pub fn last_mounted(&self) -> Option<Arc<RenderedComponent>> {
        self.state.lock().mounted.last().map(|(_, c)| c.clone())
    }

    /// Containers not yet removed.
    pub fn live_containers(&self) -> Vec<ContainerId> {
        self.state.lock().live.iter().copied().collect()
    }

    pub fn style(&self, route: &str) -> Option<String> {
        self.state.lock().styles.get(route).cloned()
    }

    pub fn errors(&self) -> Vec<ErrorPage> {
        self.state.lock().errors.clone()
    }

    pub fn last_error(&self) -> Option<ErrorPage> {
        self.state.lock().errors.last().cloned()
    }
}

struct MockMountHandle {
    container: ContainerId,
    route: String,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl MountHandle for MockMountHandle {
    async fn unmount(&self) {
        self.state.lock().events.push(RenderEvent::Unmounted {
            container: self.container,
            route: self.route.clone(),
        });
    }
}

#[async_trait]
impl RenderRuntime for MockRenderer {
    fn create_container(&self, route: &str) -> ContainerId {
        let container = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock();
        state.live.insert(container);
        state.events.push(RenderEvent::Created {
            container,
            route: route.to_string(),
        });
        container
    }

    fn mark_exiting(&self, except: ContainerId) {
        let mut state = self.state.lock();
        let leaving: Vec<_> = state.live.iter().copied().filter(|id| *id != except).collect();
        state.exiting.extend(leaving);
        state.events.push(RenderEvent::MarkedExiting { except });
    }

    fn remove_exiting_containers(&self) {
        let mut state = self.state.lock();
        let containers: Vec<_> = std::mem::take(&mut state.exiting).into_iter().collect();
        for id in &containers {
            state.live.remove(id);
        }
        state.events.push(RenderEvent::RemovedExiting { containers });
    }

    fn apply_style(&self, route: &str, css: &str) {
        let mut state = self.state.lock();
        state.styles.insert(route.to_string(), css.to_string());
        state.events.push(RenderEvent::Style {
            route: route.to_string(),
        });
    }

    async fn mount(
        &self,
        container: ContainerId,
        component: Arc<RenderedComponent>,
        _ctx: ComponentContext,
    ) -> Result<Box<dyn MountHandle>> {
        let route = component.route.name.clone();
        if self.failing.lock().contains(&route) {
            return Err(RouterError::Render(format!("mount failed for {route}")));
        }

        let mut state = self.state.lock();
        state.events.push(RenderEvent::Mounted {
            container,
            route: route.clone(),
        });
        state.mounted.push((container, component));
        Ok(Box::new(MockMountHandle {
            container,
            route,
            state: self.state.clone(),
        }))
    }

    fn next_frame(&self) -> BoxFuture<'static, ()> {
        futures::future::ready(()).boxed()
    }

    async fn show_error(&self, page: ErrorPage) {
        let mut state = self.state.lock();
        state.events.push(RenderEvent::Error { code: page.code });
        state.errors.push(page);
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.live.clear();
        state.exiting.clear();
        state.styles.clear();
        state.events.push(RenderEvent::Cleared);
    }
}
