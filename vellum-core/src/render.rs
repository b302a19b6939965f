//! Render runtime contract.
//!
//! The router never touches a DOM. It asks a [`RenderRuntime`] for
//! containers, mounts [`RenderedComponent`]s into them and schedules
//! cleanup on the runtime's next frame.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::Result;
use crate::component::{ComponentContext, RenderedComponent};
use crate::script::HookPoint;

/// Identifier of a mount container.
pub type ContainerId = u64;

/// Content of the built-in error page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPage {
    pub code: u16,
    pub title: String,
    pub message: String,
    pub route: String,
}

/// Handle returned by [`RenderRuntime::mount`].
#[async_trait]
pub trait MountHandle: Send + Sync {
    async fn unmount(&self);
}

#[async_trait]
pub trait RenderRuntime: Send + Sync {
    /// A fresh, visible container for `route`.
    fn create_container(&self, route: &str) -> ContainerId;

    /// Mark every container except `except` as leaving.
    fn mark_exiting(&self, except: ContainerId);

    fn remove_exiting_containers(&self);

    /// Install the stylesheet for `route`, replacing the previous one.
    fn apply_style(&self, route: &str, css: &str);

    async fn mount(
        &self,
        container: ContainerId,
        component: Arc<RenderedComponent>,
        ctx: ComponentContext,
    ) -> Result<Box<dyn MountHandle>>;

    /// Resolves on the next animation frame.
    fn next_frame(&self) -> BoxFuture<'static, ()>;

    async fn show_error(&self, page: ErrorPage);

    /// Remove every container and style.
    fn clear(&self);
}

/// A mounted component with its context.
pub struct MountedComponent {
    pub container: ContainerId,
    pub ctx: ComponentContext,
    handle: Box<dyn MountHandle>,
}

impl MountedComponent {
    pub fn new(
        container: ContainerId,
        ctx: ComponentContext,
        handle: Box<dyn MountHandle>,
    ) -> Self {
        Self { container, ctx, handle }
    }

    pub fn route(&self) -> &str {
        self.ctx.route()
    }

    /// Run the unmount hook chains around the runtime unmount.
    pub async fn unmount(self) {
        let script = &self.ctx.component().script;
        // Hook errors are logged by the chain; unmount continues regardless.
        let _ = script.run_hook(HookPoint::BeforeUnmount, &self.ctx).await;
        self.handle.unmount().await;
        let _ = script.run_hook(HookPoint::Unmounted, &self.ctx).await;
        debug!(route = %self.ctx.route(), container = self.container, "Component unmounted");
    }
}

impl std::fmt::Debug for MountedComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedComponent")
            .field("container", &self.container)
            .field("route", &self.route())
            .finish()
    }
}
