//! Cached view over the upstream game schedule.
//!
//! The provider keeps one snapshot per game id, refreshed at most once per
//! TTL window no matter how many challenges track the same game. Upstream
//! errors are absorbed: callers get `None` and decide what to skip, and a
//! failed refresh never poisons the cache.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use crate::dao::schedule::{RawGame, ScheduleSource};

const LIVE_STATES: [&str; 3] = ["LIVE", "CRIT", "PRE"];
const FINISHED_STATES: [&str; 2] = ["OFF", "FINAL"];
const SCHEDULED_STATES: [&str; 2] = ["FUT", "SCHEDULED"];

const POLL_LIVE: Duration = Duration::from_secs(30);
const POLL_FINISHED: Duration = Duration::from_secs(300);
const POLL_STARTING_SOON: Duration = Duration::from_secs(60);
const POLL_WITHIN_HOUR: Duration = Duration::from_secs(300);
const POLL_DISTANT: Duration = Duration::from_secs(600);

/// Point-in-time classification of one upstream game.
#[derive(Debug, Clone)]
pub struct GameStatusSnapshot {
    /// Upstream game identifier.
    pub game_id: String,
    /// Raw state code as reported upstream, kept for logging.
    pub raw_state: String,
    /// Game is in progress (including warm-up and end-of-game stoppage).
    pub is_live: bool,
    /// Game is over.
    pub is_finished: bool,
    /// Game has not started yet.
    pub is_scheduled: bool,
    /// Scheduled start, when known.
    pub start_time: Option<OffsetDateTime>,
    observed_at: Instant,
}

impl GameStatusSnapshot {
    pub(crate) fn classify(game: &RawGame) -> Self {
        let state = game.state.as_str();
        Self {
            game_id: game.id.clone(),
            raw_state: game.state.clone(),
            is_live: LIVE_STATES.contains(&state),
            is_finished: FINISHED_STATES.contains(&state),
            is_scheduled: SCHEDULED_STATES.contains(&state),
            start_time: game.start_time,
            observed_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.observed_at.elapsed() < ttl
    }

    /// Advisory re-poll delay for this game: frequent while live, relaxed the
    /// further away the start is, slow once finished or unclassifiable.
    pub fn suggested_poll_interval(&self, now: OffsetDateTime) -> Duration {
        if self.is_live {
            return POLL_LIVE;
        }
        if self.is_finished {
            return POLL_FINISHED;
        }
        if self.is_scheduled {
            let Some(start) = self.start_time else {
                return POLL_DISTANT;
            };
            let until_start = start - now;
            if until_start < time::Duration::minutes(10) {
                return POLL_STARTING_SOON;
            }
            if until_start < time::Duration::hours(1) {
                return POLL_WITHIN_HOUR;
            }
        }
        POLL_DISTANT
    }
}

/// TTL-cached game status lookups shared by every caller that tracks the same
/// game.
pub struct GameStatusProvider {
    source: Arc<dyn ScheduleSource>,
    cache: DashMap<String, GameStatusSnapshot>,
    /// Per-game refresh gates; concurrent stale lookups for the same game
    /// coalesce into one upstream fetch.
    inflight: DashMap<String, Arc<Mutex<()>>>,
    ttl: Duration,
}

impl GameStatusProvider {
    /// Wrap `source` with a cache whose entries stay fresh for `ttl`.
    pub fn new(source: Arc<dyn ScheduleSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: DashMap::new(),
            inflight: DashMap::new(),
            ttl,
        }
    }

    /// Current snapshot for `game_id`, served from cache while fresh.
    ///
    /// A stale or missing entry triggers a bulk schedule fetch first (one
    /// request covers every game of the day); a game absent from the bulk
    /// response, or a failed bulk fetch, falls back to a direct per-game
    /// lookup. Concurrent misses on the same game wait for the first caller's
    /// refresh instead of fetching again. When both paths fail the previous
    /// entry is left in place and `None` is returned.
    pub async fn get_status(&self, game_id: &str) -> Option<GameStatusSnapshot> {
        if let Some(snapshot) = self.fresh_snapshot(game_id) {
            return Some(snapshot);
        }

        let gate = self
            .inflight
            .entry(game_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _refresh = gate.lock().await;

        // Another caller may have refreshed while we waited on the gate.
        if let Some(snapshot) = self.fresh_snapshot(game_id) {
            return Some(snapshot);
        }

        let game = match self.fetch_from_schedule(game_id).await {
            Some(game) => Some(game),
            None => self.fetch_single(game_id).await,
        }?;

        let snapshot = GameStatusSnapshot::classify(&game);
        debug!(
            game_id,
            state = %snapshot.raw_state,
            "refreshed game status snapshot"
        );
        self.cache.insert(game_id.to_owned(), snapshot.clone());
        Some(snapshot)
    }

    fn fresh_snapshot(&self, game_id: &str) -> Option<GameStatusSnapshot> {
        self.cache
            .get(game_id)
            .filter(|snapshot| snapshot.is_fresh(self.ttl))
            .map(|snapshot| snapshot.value().clone())
    }

    /// Drop cached snapshots: one game when `game_id` is given, everything
    /// otherwise. The next lookup refetches.
    pub fn clear(&self, game_id: Option<&str>) {
        match game_id {
            Some(id) => {
                self.cache.remove(id);
            }
            None => self.cache.clear(),
        }
    }

    async fn fetch_from_schedule(&self, game_id: &str) -> Option<RawGame> {
        match self.source.fetch_schedule().await {
            Ok(games) => games.into_iter().find(|game| game.id == game_id),
            Err(err) => {
                warn!(game_id, error = %err, "bulk schedule fetch failed");
                None
            }
        }
    }

    async fn fetch_single(&self, game_id: &str) -> Option<RawGame> {
        match self.source.fetch_event(game_id.to_owned()).await {
            Ok(game) => game,
            Err(err) => {
                warn!(game_id, error = %err, "single game fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::BoxFuture;

    use super::*;
    use crate::dao::schedule::ScheduleError;

    struct FakeSource {
        schedule: Vec<RawGame>,
        schedule_fails: bool,
        schedule_delay: Option<Duration>,
        event: Option<RawGame>,
        event_fails: bool,
        schedule_calls: AtomicUsize,
        event_calls: AtomicUsize,
    }

    impl FakeSource {
        fn with_schedule(games: Vec<RawGame>) -> Self {
            Self {
                schedule: games,
                schedule_fails: false,
                schedule_delay: None,
                event: None,
                event_fails: false,
                schedule_calls: AtomicUsize::new(0),
                event_calls: AtomicUsize::new(0),
            }
        }
    }

    impl ScheduleSource for Arc<FakeSource> {
        fn fetch_schedule(&self) -> BoxFuture<'static, Result<Vec<RawGame>, ScheduleError>> {
            let this = Arc::clone(self);
            Box::pin(async move {
                this.schedule_calls.fetch_add(1, Ordering::SeqCst);
                if let Some(delay) = this.schedule_delay {
                    tokio::time::sleep(delay).await;
                }
                if this.schedule_fails {
                    Err(ScheduleError::Status { status: 503 })
                } else {
                    Ok(this.schedule.clone())
                }
            })
        }

        fn fetch_event(
            &self,
            _game_id: String,
        ) -> BoxFuture<'static, Result<Option<RawGame>, ScheduleError>> {
            let this = Arc::clone(self);
            Box::pin(async move {
                this.event_calls.fetch_add(1, Ordering::SeqCst);
                if this.event_fails {
                    Err(ScheduleError::Status { status: 500 })
                } else {
                    Ok(this.event.clone())
                }
            })
        }
    }

    fn game(id: &str, state: &str) -> RawGame {
        RawGame {
            id: id.to_owned(),
            state: state.to_owned(),
            start_time: None,
        }
    }

    fn provider(source: Arc<FakeSource>, ttl: Duration) -> GameStatusProvider {
        GameStatusProvider::new(Arc::new(source) as Arc<dyn ScheduleSource>, ttl)
    }

    #[tokio::test(start_paused = true)]
    async fn cache_serves_within_ttl_and_refetches_after() {
        let source = Arc::new(FakeSource::with_schedule(vec![game("g1", "LIVE")]));
        let provider = provider(Arc::clone(&source), Duration::from_secs(30));

        for _ in 0..5 {
            assert!(provider.get_status("g1").await.is_some());
        }
        assert_eq!(source.schedule_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(provider.get_status("g1").await.is_some());
        assert_eq!(source.schedule_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_fetch() {
        let mut source = FakeSource::with_schedule(vec![game("g1", "LIVE")]);
        source.schedule_delay = Some(Duration::from_millis(50));
        let source = Arc::new(source);
        let provider = provider(Arc::clone(&source), Duration::from_secs(30));

        let (first, second) = tokio::join!(provider.get_status("g1"), provider.get_status("g1"));

        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(source.schedule_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn raw_states_classify_into_lifecycle_buckets() {
        let cases = [
            ("LIVE", (true, false, false)),
            ("CRIT", (true, false, false)),
            ("PRE", (true, false, false)),
            ("OFF", (false, true, false)),
            ("FINAL", (false, true, false)),
            ("FUT", (false, false, true)),
            ("SCHEDULED", (false, false, true)),
            ("MYSTERY", (false, false, false)),
        ];

        for (state, (live, finished, scheduled)) in cases {
            let snapshot = GameStatusSnapshot::classify(&game("g1", state));
            assert_eq!(snapshot.is_live, live, "{state}");
            assert_eq!(snapshot.is_finished, finished, "{state}");
            assert_eq!(snapshot.is_scheduled, scheduled, "{state}");
        }
    }

    #[tokio::test]
    async fn bulk_miss_falls_back_to_single_fetch() {
        let mut source = FakeSource::with_schedule(vec![game("other", "LIVE")]);
        source.event = Some(game("g1", "OFF"));
        let source = Arc::new(source);
        let provider = provider(Arc::clone(&source), Duration::from_secs(30));

        let snapshot = provider.get_status("g1").await.unwrap();
        assert!(snapshot.is_finished);
        assert_eq!(source.event_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bulk_error_falls_back_to_single_fetch() {
        let mut source = FakeSource::with_schedule(vec![]);
        source.schedule_fails = true;
        source.event = Some(game("g1", "LIVE"));
        let source = Arc::new(source);
        let provider = provider(Arc::clone(&source), Duration::from_secs(30));

        let snapshot = provider.get_status("g1").await.unwrap();
        assert!(snapshot.is_live);
    }

    #[tokio::test]
    async fn total_upstream_failure_yields_none_and_caches_nothing() {
        let mut source = FakeSource::with_schedule(vec![]);
        source.schedule_fails = true;
        source.event_fails = true;
        let source = Arc::new(source);
        let provider = provider(Arc::clone(&source), Duration::from_secs(30));

        assert!(provider.get_status("g1").await.is_none());
        assert!(provider.cache.is_empty());

        // Next call hits upstream again rather than a cached failure.
        assert!(provider.get_status("g1").await.is_none());
        assert_eq!(source.schedule_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_forces_a_refetch() {
        let source = Arc::new(FakeSource::with_schedule(vec![game("g1", "FUT")]));
        let provider = provider(Arc::clone(&source), Duration::from_secs(30));

        provider.get_status("g1").await.unwrap();
        provider.clear(Some("g1"));
        provider.get_status("g1").await.unwrap();
        assert_eq!(source.schedule_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn poll_interval_tracks_proximity_to_start() {
        let now = OffsetDateTime::now_utc();

        let mut snapshot = GameStatusSnapshot::classify(&game("g1", "LIVE"));
        assert_eq!(snapshot.suggested_poll_interval(now), POLL_LIVE);

        snapshot = GameStatusSnapshot::classify(&game("g1", "FINAL"));
        assert_eq!(snapshot.suggested_poll_interval(now), POLL_FINISHED);

        snapshot = GameStatusSnapshot::classify(&RawGame {
            id: "g1".into(),
            state: "FUT".into(),
            start_time: Some(now + time::Duration::minutes(5)),
        });
        assert_eq!(snapshot.suggested_poll_interval(now), POLL_STARTING_SOON);

        snapshot = GameStatusSnapshot::classify(&RawGame {
            id: "g1".into(),
            state: "FUT".into(),
            start_time: Some(now + time::Duration::minutes(45)),
        });
        assert_eq!(snapshot.suggested_poll_interval(now), POLL_WITHIN_HOUR);

        snapshot = GameStatusSnapshot::classify(&RawGame {
            id: "g1".into(),
            state: "FUT".into(),
            start_time: Some(now + time::Duration::hours(6)),
        });
        assert_eq!(snapshot.suggested_poll_interval(now), POLL_DISTANT);

        snapshot = GameStatusSnapshot::classify(&game("g1", "MYSTERY"));
        assert_eq!(snapshot.suggested_poll_interval(now), POLL_DISTANT);
    }
}
