//! Challenge lifecycle state machine shared by the service layer and the
//! status-sync scheduler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a challenge.
///
/// `Pending -> Active -> Live -> Finished`, with `Cancelled` reachable from
/// the two pre-game states. `Finished` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeStatus {
    /// Challenge has been created; members can still be gathered.
    Pending,
    /// Challenge has been confirmed by its owner (manual transition).
    Active,
    /// The tracked game is in progress; membership is frozen.
    Live,
    /// The tracked game is over; terminal.
    Finished,
    /// The owner cancelled the challenge before it went live; terminal.
    Cancelled,
}

impl ChallengeStatus {
    /// Wire representation used in store filters and event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Live => "LIVE",
            Self::Finished => "FINISHED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether no further transition can ever leave this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }

    /// Whether new members may still join a challenge in this status.
    pub fn allows_join(&self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }

    /// Whether a non-owner member may leave a challenge in this status.
    pub fn allows_leave(&self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }

    /// Whether the edge `self -> to` is part of the lifecycle graph.
    ///
    /// Self-loops are not legal edges; callers that observe the target status
    /// already in place should treat the operation as a no-op instead.
    pub fn can_transition(&self, to: ChallengeStatus) -> bool {
        use ChallengeStatus::*;
        matches!(
            (self, to),
            (Pending, Active)
                | (Pending, Live)
                | (Pending, Finished)
                | (Pending, Cancelled)
                | (Active, Live)
                | (Active, Finished)
                | (Active, Cancelled)
                | (Live, Finished)
        )
    }

    /// Validate the edge `self -> to`, returning the offending pair on error.
    pub fn transition(&self, to: ChallengeStatus) -> Result<ChallengeStatus, InvalidTransition> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: *self, to })
        }
    }
}

impl std::fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a requested status change is not a legal edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// Status the challenge was in when the transition was requested.
    pub from: ChallengeStatus,
    /// Requested target status.
    pub to: ChallengeStatus,
}

#[cfg(test)]
mod tests {
    use super::ChallengeStatus::*;
    use super::*;

    const ALL: [ChallengeStatus; 5] = [Pending, Active, Live, Finished, Cancelled];

    #[test]
    fn happy_path_edges_are_legal() {
        assert!(Pending.can_transition(Active));
        assert!(Active.can_transition(Live));
        assert!(Live.can_transition(Finished));
    }

    #[test]
    fn finish_is_reachable_from_every_non_terminal_state() {
        for from in [Pending, Active, Live] {
            assert!(from.can_transition(Finished), "{from} -> FINISHED");
        }
    }

    #[test]
    fn cancel_only_before_going_live() {
        assert!(Pending.can_transition(Cancelled));
        assert!(Active.can_transition(Cancelled));
        assert!(!Live.can_transition(Cancelled));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in [Finished, Cancelled] {
            for to in ALL {
                assert!(!from.can_transition(to), "{from} -> {to} should be illegal");
            }
        }
    }

    #[test]
    fn self_loops_are_not_edges() {
        for status in ALL {
            assert!(!status.can_transition(status));
        }
    }

    #[test]
    fn no_backward_edges() {
        assert!(!Active.can_transition(Pending));
        assert!(!Live.can_transition(Active));
        assert!(!Finished.can_transition(Pending));
        assert!(!Cancelled.can_transition(Active));
    }

    #[test]
    fn membership_gates_follow_status() {
        assert!(Pending.allows_join() && Pending.allows_leave());
        assert!(Active.allows_join() && Active.allows_leave());
        for status in [Live, Finished, Cancelled] {
            assert!(!status.allows_join());
            assert!(!status.allows_leave());
        }
    }

    #[test]
    fn transition_reports_offending_edge() {
        let err = Finished.transition(Pending).unwrap_err();
        assert_eq!(
            err,
            InvalidTransition {
                from: Finished,
                to: Pending
            }
        );
        assert_eq!(err.to_string(), "invalid transition: FINISHED -> PENDING");
    }

    #[test]
    fn wire_names_round_trip_through_serde() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: ChallengeStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }
}
