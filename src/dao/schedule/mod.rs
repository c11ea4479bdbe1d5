//! External game schedule/score collaborator.
//!
//! The lifecycle core only ever sees [`RawGame`] records; everything about
//! the upstream API (endpoints, shapes, timeouts) stays behind
//! [`ScheduleSource`].

pub mod http;

use futures::future::BoxFuture;
use thiserror::Error;
use time::OffsetDateTime;

pub use http::HttpScheduleSource;

/// Raw per-game record as reported by the upstream source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGame {
    /// Upstream identifier of the game.
    pub id: String,
    /// Raw state code (`LIVE`, `CRIT`, `PRE`, `OFF`, `FINAL`, `FUT`, ...).
    /// Codes outside the known set are carried through untouched.
    pub state: String,
    /// Scheduled start time, when the upstream reports one.
    pub start_time: Option<OffsetDateTime>,
}

/// Errors from the upstream schedule source. These never reach callers of the
/// lifecycle core; the status provider absorbs them into "no snapshot".
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Transport-level failure, including request timeouts.
    #[error("schedule request failed")]
    Request(#[from] reqwest::Error),
    /// Upstream answered with a non-success status.
    #[error("schedule endpoint returned HTTP {status}")]
    Status { status: u16 },
}

/// Source of game schedule and score information.
pub trait ScheduleSource: Send + Sync {
    /// Fetch the current bulk schedule (today's slate of games).
    fn fetch_schedule(&self) -> BoxFuture<'static, Result<Vec<RawGame>, ScheduleError>>;

    /// Fetch a single game directly. `Ok(None)` when the upstream does not
    /// know the id.
    fn fetch_event(
        &self,
        game_id: String,
    ) -> BoxFuture<'static, Result<Option<RawGame>, ScheduleError>>;
}
