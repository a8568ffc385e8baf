//! App lifecycle phases
//!
//! Maps foreground/background notifications onto orchestrator transitions.
//! Backgrounding is debounced: the suspend fires after a grace period, and
//! coming back before then cancels it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::VoiceSessionOrchestrator;
use crate::error::{AgentError, AgentResult};

/// Host app visibility
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenePhase {
    /// Visible and interactive
    Active,
    /// Visible but not receiving input
    Inactive,
    /// Not visible
    Background,
}

#[derive(Default)]
struct PendingSuspend {
    /// Bumped on every phase change; a timer only fires for its own generation
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

/// Debounced background/foreground driver for an orchestrator
pub struct LifecyclePhaseController {
    orchestrator: VoiceSessionOrchestrator,
    grace: Duration,
    pending: Arc<Mutex<PendingSuspend>>,
}

impl LifecyclePhaseController {
    /// Controller suspending `orchestrator` `grace` after backgrounding
    pub fn new(orchestrator: VoiceSessionOrchestrator, grace: Duration) -> Self {
        LifecyclePhaseController {
            orchestrator,
            grace,
            pending: Arc::new(Mutex::new(PendingSuspend::default())),
        }
    }

    /// Whether a suspend is scheduled
    pub async fn has_pending_suspend(&self) -> bool {
        self.pending.lock().await.handle.is_some()
    }

    /// React to a phase change
    pub async fn handle_phase_change(&self, phase: ScenePhase) -> AgentResult<()> {
        match phase {
            ScenePhase::Background => {
                self.schedule_suspend().await;
                Ok(())
            }
            ScenePhase::Active => {
                self.cancel_pending().await;
                match self.orchestrator.transition_to_foreground().await {
                    Err(AgentError::InvalidStateTransition { .. }) => Ok(()),
                    other => other,
                }
            }
            ScenePhase::Inactive => Ok(()),
        }
    }

    async fn schedule_suspend(&self) {
        let mut pending = self.pending.lock().await;
        pending.generation = pending.generation.wrapping_add(1);
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }

        let generation = pending.generation;
        let grace = self.grace;
        let orchestrator = self.orchestrator.clone();
        let slot = Arc::clone(&self.pending);

        tracing::debug!(grace_ms = grace.as_millis() as u64, "suspend scheduled");
        pending.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            // Held across the transition so a foreground return waits for it
            let mut pending = slot.lock().await;
            if pending.generation != generation {
                return;
            }
            pending.handle = None;

            match orchestrator.transition_to_background().await {
                Ok(()) | Err(AgentError::InvalidStateTransition { .. }) => {}
                Err(err) => tracing::warn!(error = %err, "background suspend failed"),
            }
        }));
    }

    async fn cancel_pending(&self) {
        let mut pending = self.pending.lock().await;
        pending.generation = pending.generation.wrapping_add(1);
        if let Some(handle) = pending.handle.take() {
            handle.abort();
            tracing::debug!("pending suspend cancelled");
        }
    }
}

impl Drop for LifecyclePhaseController {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.try_lock() {
            if let Some(handle) = pending.handle.take() {
                handle.abort();
            }
        }
    }
}
