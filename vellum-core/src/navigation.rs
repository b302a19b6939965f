//! Transition state machine and navigation generations.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::query::QueryParams;

/// Whether a route transition is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    Idle,
    InProgress,
}

/// Owner of the [`TransitionState`]. At most one transition runs at a time.
#[derive(Debug, Default)]
pub struct TransitionMachine {
    state: Arc<Mutex<TransitionState>>,
}

impl TransitionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransitionState {
        *self.state.lock()
    }

    pub fn is_in_progress(&self) -> bool {
        self.state() == TransitionState::InProgress
    }

    /// Enter `InProgress`, or `None` when a transition is already running.
    ///
    /// The state returns to `Idle` when the guard is dropped, including on
    /// early return and error paths.
    pub fn try_begin(&self) -> Option<TransitionGuard> {
        let mut state = self.state.lock();
        if *state == TransitionState::InProgress {
            return None;
        }
        *state = TransitionState::InProgress;
        Some(TransitionGuard {
            state: self.state.clone(),
        })
    }
}

#[must_use = "the transition ends when the guard is dropped"]
#[derive(Debug)]
pub struct TransitionGuard {
    state: Arc<Mutex<TransitionState>>,
}

impl Drop for TransitionGuard {
    fn drop(&mut self) {
        *self.state.lock() = TransitionState::Idle;
    }
}

/// Result of one navigation trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// A new component was mounted.
    Rendered,
    /// Route and query matched the current state; nothing re-rendered.
    Unchanged,
    /// Another transition was running; the trigger was discarded.
    Dropped,
    /// Navigation continued at another route (login or error route).
    Redirected(String),
    /// Resolution failed and an error page was shown with this status.
    Failed(u16),
}

impl NavigationOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, NavigationOutcome::Rendered)
    }
}

/// Token bound to the navigation generation that created it.
#[derive(Debug, Clone)]
pub struct NavigationToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl NavigationToken {
    pub fn new(current: Arc<AtomicU64>) -> Self {
        Self {
            generation: current.load(Ordering::SeqCst),
            current,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once a newer navigation has started.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

/// Monotonic navigation counter shared with every [`NavigationToken`].
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating all outstanding tokens.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn token(&self) -> NavigationToken {
        NavigationToken::new(self.0.clone())
    }
}

/// Programmatic navigation, as seen from inside a component.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate_to(&self, route: &str, params: Option<QueryParams>) -> NavigationOutcome;

    fn current_route(&self) -> String;
}
