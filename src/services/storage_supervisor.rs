//! Keeps a storage backend installed in the shared state, reconnecting with
//! exponential backoff and flipping degraded mode while storage is away.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{challenge_store::ChallengeStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend, keep it under health surveillance, and
/// fall back to degraded mode when it is unavailable.
///
/// While the store is healthy the loop polls it every few seconds. A failed
/// probe triggers a bounded run of reconnect attempts with backoff; exhausting
/// them drops the store from the shared state and starts over from a fresh
/// connection.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ChallengeStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_challenge_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(_) => {
                            if !reconnect_with_backoff(&state, store.as_ref()).await {
                                warn!(
                                    "exhausted storage reconnect attempts; staying in degraded mode"
                                );
                                break;
                            }
                            state.install_challenge_store(store.clone()).await;
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Try a bounded number of reconnects after a failed health probe. The first
/// failure clears the installed store so callers see degraded mode while we
/// keep retrying. Returns whether the backend came back.
async fn reconnect_with_backoff(state: &SharedState, store: &dyn ChallengeStore) -> bool {
    let mut attempt = 0;
    let mut reconnect_delay = INITIAL_DELAY;

    while attempt < MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!("storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.clear_challenge_store().await;
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                attempt += 1;
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}
