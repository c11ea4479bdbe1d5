//! Background reconciliation between stored challenge statuses and the
//! upstream game source.
//!
//! A single task wakes on a fixed interval, loads the non-terminal
//! challenges, resolves each one's game snapshot through the shared
//! [`GameStatusProvider`], and applies `-> LIVE` / `-> FINISHED` transitions
//! through the store's conditional writes. Pass failures are logged and the
//! loop keeps running; a challenge that fails to sync never blocks the rest
//! of the pass.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::ChallengeEntity,
    error::ServiceError,
    services::{
        broadcast_events,
        game_status::{GameStatusProvider, GameStatusSnapshot},
    },
    state::{SharedState, lifecycle::ChallengeStatus},
};

/// Periodic status reconciliation driver.
pub struct StatusSyncScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    state: SharedState,
    provider: Arc<GameStatusProvider>,
    default_interval: Duration,
    page_limit: i64,
    task: Mutex<Option<SchedulerTask>>,
}

struct SchedulerTask {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl StatusSyncScheduler {
    /// Build a scheduler bound to the shared state. Interval and page size
    /// come from the application configuration.
    pub fn new(state: SharedState, provider: Arc<GameStatusProvider>) -> Self {
        let default_interval = state.config().sync_interval;
        let page_limit = state.config().sync_page_limit;
        Self {
            inner: Arc::new(SchedulerInner {
                state,
                provider,
                default_interval,
                page_limit,
                task: Mutex::new(None),
            }),
        }
    }

    /// Start the periodic loop. The first pass runs immediately; subsequent
    /// passes fire every `interval` (configuration default when `None`).
    /// Calling start on a running scheduler is a logged no-op.
    pub async fn start(&self, interval: Option<Duration>) {
        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            warn!("status sync scheduler already running");
            return;
        }

        let interval = interval.unwrap_or(self.inner.default_interval);
        let inner = Arc::clone(&self.inner);
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        info!(interval_secs = interval.as_secs(), "starting status sync scheduler");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = inner.run_pass().await {
                            error!(error = %err, "status sync pass failed");
                        }
                    }
                }
            }
        });
        *task = Some(SchedulerTask { handle, shutdown });
    }

    /// Stop the loop, waiting for any in-flight pass to drain first; only
    /// future passes are prevented. Safe to call when not running.
    pub async fn stop(&self) {
        let mut task = self.inner.task.lock().await;
        if let Some(SchedulerTask { handle, shutdown }) = task.take() {
            let _ = shutdown.send(true);
            let _ = handle.await;
            info!("status sync scheduler stopped");
        }
    }

    /// Run one reconciliation pass immediately, outside the periodic loop.
    pub async fn run_once(&self) -> Result<SyncReport, ServiceError> {
        self.inner.run_pass().await
    }

    /// Synchronize a single challenge on demand. Returns the updated entity
    /// when a transition was applied.
    pub async fn sync_challenge(
        &self,
        id: Uuid,
    ) -> Result<Option<ChallengeEntity>, ServiceError> {
        let store = self.inner.state.require_challenge_store().await?;
        let challenge = store
            .find(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("challenge {id} not found")))?;

        if challenge.status.is_terminal() {
            return Ok(None);
        }

        self.inner.apply_transition(&challenge).await
    }
}

/// Outcome counts of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncReport {
    /// Non-terminal challenges examined.
    pub examined: usize,
    /// Challenges whose status changed this pass.
    pub transitioned: usize,
}

impl SchedulerInner {
    async fn run_pass(&self) -> Result<SyncReport, ServiceError> {
        let store = self.state.require_challenge_store().await?;
        let challenges = store.list(1, self.page_limit).await?;

        let pending: Vec<ChallengeEntity> = challenges
            .into_iter()
            .filter(|challenge| !challenge.status.is_terminal())
            .collect();

        let examined = pending.len();
        let outcomes = join_all(pending.into_iter().map(|challenge| self.sync_one(challenge))).await;
        let transitioned = outcomes.iter().filter(|outcome| outcome.is_some()).count();

        debug!(examined, transitioned, "status sync pass complete");
        Ok(SyncReport {
            examined,
            transitioned,
        })
    }

    /// Batch-path wrapper around [`Self::apply_transition`]: a failure for one
    /// challenge is logged and absorbed so the rest of the pass proceeds.
    async fn sync_one(&self, challenge: ChallengeEntity) -> Option<ChallengeEntity> {
        match self.apply_transition(&challenge).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(challenge_id = %challenge.id, error = %err, "challenge sync failed");
                None
            }
        }
    }

    /// Reconcile one challenge against its game snapshot. Returns the updated
    /// entity when a transition was applied, `Ok(None)` when there was nothing
    /// to do, and surfaces store failures to the caller.
    async fn apply_transition(
        &self,
        challenge: &ChallengeEntity,
    ) -> Result<Option<ChallengeEntity>, ServiceError> {
        let Some(snapshot) = self.provider.get_status(&challenge.game_id).await else {
            debug!(
                challenge_id = %challenge.id,
                game_id = %challenge.game_id,
                "no game snapshot available; skipping"
            );
            return Ok(None);
        };

        let Some(target) = decide_transition(challenge.status, &snapshot) else {
            return Ok(None);
        };

        let store = self.state.require_challenge_store().await?;
        match store.update_status(challenge.id, target, None).await? {
            Some(updated) => {
                info!(
                    challenge_id = %updated.id,
                    from = %challenge.status,
                    to = %updated.status,
                    "challenge status transitioned"
                );
                broadcast_events::broadcast_status_changed(self.state.broadcaster(), &updated);
                Ok(Some(updated))
            }
            None => {
                // Lost a race with a concurrent writer; the next pass
                // re-reads the record and reconciles from there.
                debug!(challenge_id = %challenge.id, "status update matched nothing");
                Ok(None)
            }
        }
    }
}

/// Pick the lifecycle transition implied by a game snapshot, if any.
fn decide_transition(
    current: ChallengeStatus,
    snapshot: &GameStatusSnapshot,
) -> Option<ChallengeStatus> {
    if snapshot.is_live && current.can_transition(ChallengeStatus::Live) {
        return Some(ChallengeStatus::Live);
    }
    if snapshot.is_finished && current.can_transition(ChallengeStatus::Finished) {
        return Some(ChallengeStatus::Finished);
    }
    None
}
