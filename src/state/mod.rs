pub mod broadcast;
pub mod lifecycle;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::challenge_store::ChallengeStore, error::ServiceError};

pub use self::broadcast::{EventBroadcaster, Topic};

/// Cheaply clonable handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state shared by the request handlers and the
/// background scheduler.
pub struct AppState {
    challenge_store: RwLock<Option<Arc<dyn ChallengeStore>>>,
    broadcaster: Arc<EventBroadcaster>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned
    /// cheaply. The broadcaster is injected rather than owned globally so
    /// tests and embedders can wire their own instance.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed.
    pub fn new(config: AppConfig, broadcaster: Arc<EventBroadcaster>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            challenge_store: RwLock::new(None),
            broadcaster,
            degraded: degraded_tx,
            config,
        })
    }

    /// Obtain a handle to the current challenge store, if one is installed.
    pub async fn challenge_store(&self) -> Option<Arc<dyn ChallengeStore>> {
        let guard = self.challenge_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the challenge store or fail with the degraded-mode error.
    pub async fn require_challenge_store(&self) -> Result<Arc<dyn ChallengeStore>, ServiceError> {
        self.challenge_store()
            .await
            .ok_or(ServiceError::Degraded)
    }

    /// Install a new challenge store implementation and leave degraded mode.
    pub async fn install_challenge_store(&self, store: Arc<dyn ChallengeStore>) {
        {
            let mut guard = self.challenge_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current challenge store and enter degraded mode.
    pub async fn clear_challenge_store(&self) {
        {
            let mut guard = self.challenge_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.challenge_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Fan-out hub delivering lifecycle events to connected sessions.
    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
