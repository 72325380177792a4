//! Agent version lifecycle and the user-acknowledged hot swap.
//!
//! [`WorkerLifecycle`] is the state machine of one pending agent version.
//! Transitions are published on a watch channel; [`UpdateCoordinator`]
//! consumes them and decides which client-facing signal (if any) each state
//! deserves.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Installing,
    Installed,
    Waiting,
    Activating,
    Activated,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Waiting => "waiting",
            Self::Activating => "activating",
            Self::Activated => "activated",
        }
    }

    pub fn can_advance_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Installing, Installed)
                | (Installed, Waiting)
                | (Installed, Activating)
                | (Waiting, Activating)
                | (Activating, Activated)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands a client may post to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMessage {
    /// Take control now instead of waiting for old clients to go away.
    SkipWaiting,
}

impl FromStr for AgentMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skipWaiting" => Ok(Self::SkipWaiting),
            other => Err(Error::InvalidInput(format!("unknown agent message: {other:?}"))),
        }
    }
}

/// State machine for a pending agent version.
pub struct WorkerLifecycle {
    state: watch::Sender<LifecycleState>,
    skip_waiting: AtomicBool,
}

impl Default for WorkerLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerLifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Installing);
        Self { state, skip_waiting: AtomicBool::new(false) }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Channel of transitions. Slow receivers see only the latest state.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Move to `next`, rejecting anything the state machine does not allow.
    pub fn advance(&self, next: LifecycleState) -> Result<(), Error> {
        let mut from = None;
        let changed = self.state.send_if_modified(|current| {
            if current.can_advance_to(next) {
                *current = next;
                true
            } else {
                from = Some(*current);
                false
            }
        });
        if !changed {
            let from = from.unwrap_or(next);
            return Err(Error::InvalidTransition { from: from.to_string(), to: next.to_string() });
        }
        tracing::info!(state = %next, "lifecycle transition");
        Ok(())
    }

    pub fn request_skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::Release);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::Acquire)
    }
}

/// Client-facing outcome of a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// A new version is installed behind an active one.
    UpdateAvailable,
    /// First ever activation; the app now works offline.
    OfflineReady,
    /// The controlling version changed; the client must reload.
    Reload,
}

/// The user-facing side of the update flow.
#[async_trait]
pub trait UpdatePrompt: Send + Sync {
    /// Ask whether to switch to the new version now.
    async fn confirm_update(&self) -> bool;

    fn offline_ready(&self);

    fn reload(&self);
}

/// Where the coordinator posts messages for the pending version.
#[async_trait]
pub trait WorkerPort: Send + Sync {
    async fn post_message(&self, message: AgentMessage) -> Result<(), Error>;
}

/// Maps lifecycle states to signals, each at most once.
#[derive(Debug)]
pub struct UpdateCoordinator {
    had_controller: bool,
    update_signalled: bool,
    ready_signalled: bool,
    reload_signalled: bool,
}

impl UpdateCoordinator {
    /// `had_controller` is whether a version was already in control when
    /// the pending one appeared.
    pub fn new(had_controller: bool) -> Self {
        Self { had_controller, update_signalled: false, ready_signalled: false, reload_signalled: false }
    }

    pub fn observe(&mut self, state: LifecycleState) -> Option<LifecycleSignal> {
        match state {
            LifecycleState::Installed | LifecycleState::Waiting if self.had_controller && !self.update_signalled => {
                self.update_signalled = true;
                Some(LifecycleSignal::UpdateAvailable)
            }
            LifecycleState::Activated if !self.had_controller && !self.ready_signalled => {
                self.ready_signalled = true;
                Some(LifecycleSignal::OfflineReady)
            }
            LifecycleState::Activated if self.had_controller && !self.reload_signalled => {
                self.reload_signalled = true;
                Some(LifecycleSignal::Reload)
            }
            _ => None,
        }
    }

    /// Follow `states` until the sender goes away.
    ///
    /// A confirmed update posts [`AgentMessage::SkipWaiting`] to `worker`.
    pub async fn run(
        mut self, mut states: watch::Receiver<LifecycleState>, prompt: Arc<dyn UpdatePrompt>,
        worker: Arc<dyn WorkerPort>,
    ) {
        loop {
            let state = *states.borrow_and_update();
            match self.observe(state) {
                Some(LifecycleSignal::UpdateAvailable) => {
                    tracing::info!("update available");
                    if prompt.confirm_update().await {
                        if let Err(e) = worker.post_message(AgentMessage::SkipWaiting).await {
                            tracing::warn!(error = %e, "skip waiting failed");
                        }
                    }
                }
                Some(LifecycleSignal::OfflineReady) => {
                    tracing::info!("ready to work offline");
                    prompt.offline_ready();
                }
                Some(LifecycleSignal::Reload) => {
                    tracing::info!("controller changed, reloading");
                    prompt.reload();
                }
                None => {}
            }
            if states.changed().await.is_err() {
                break;
            }
        }
    }
}
