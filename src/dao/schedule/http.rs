use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use time::OffsetDateTime;

use super::{RawGame, ScheduleError, ScheduleSource};

/// HTTP implementation of [`ScheduleSource`].
///
/// Talks to the league's public JSON API: one bulk "scores now" document for
/// the whole slate, plus a per-game landing document used as a fallback for
/// games outside the current slate.
#[derive(Clone)]
pub struct HttpScheduleSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ScoreboardDocument {
    #[serde(default)]
    games: Vec<GameDocument>,
}

#[derive(Debug, Deserialize)]
struct GameDocument {
    id: u64,
    #[serde(rename = "gameState")]
    game_state: String,
    #[serde(
        rename = "startTimeUTC",
        default,
        with = "time::serde::rfc3339::option"
    )]
    start_time_utc: Option<OffsetDateTime>,
}

impl From<GameDocument> for RawGame {
    fn from(value: GameDocument) -> Self {
        Self {
            id: value.id.to_string(),
            state: value.game_state,
            start_time: value.start_time_utc,
        }
    }
}

impl HttpScheduleSource {
    /// Build a source with a per-request timeout. Trailing slashes on
    /// `base_url` are tolerated.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ScheduleError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    async fn fetch_scoreboard(&self) -> Result<Vec<RawGame>, ScheduleError> {
        let url = format!("{}/score/now", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ScheduleError::Status {
                status: response.status().as_u16(),
            });
        }

        let document: ScoreboardDocument = response.json().await?;
        Ok(document.games.into_iter().map(Into::into).collect())
    }

    async fn fetch_game(&self, game_id: &str) -> Result<Option<RawGame>, ScheduleError> {
        let url = format!("{}/gamecenter/{game_id}/landing", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ScheduleError::Status {
                status: response.status().as_u16(),
            });
        }

        let document: GameDocument = response.json().await?;
        Ok(Some(document.into()))
    }
}

impl ScheduleSource for HttpScheduleSource {
    fn fetch_schedule(&self) -> BoxFuture<'static, Result<Vec<RawGame>, ScheduleError>> {
        let source = self.clone();
        Box::pin(async move { source.fetch_scoreboard().await })
    }

    fn fetch_event(
        &self,
        game_id: String,
    ) -> BoxFuture<'static, Result<Option<RawGame>, ScheduleError>> {
        let source = self.clone();
        Box::pin(async move { source.fetch_game(&game_id).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoreboard_document_parses_slate() {
        let payload = r#"{
            "games": [
                {"id": 2024020001, "gameState": "LIVE", "startTimeUTC": "2024-10-04T23:00:00Z"},
                {"id": 2024020002, "gameState": "FUT"}
            ]
        }"#;
        let document: ScoreboardDocument = serde_json::from_str(payload).unwrap();
        let games: Vec<RawGame> = document.games.into_iter().map(Into::into).collect();

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].id, "2024020001");
        assert_eq!(games[0].state, "LIVE");
        assert!(games[0].start_time.is_some());
        assert!(games[1].start_time.is_none());
    }

    #[test]
    fn empty_scoreboard_is_not_an_error() {
        let document: ScoreboardDocument = serde_json::from_str("{}").unwrap();
        assert!(document.games.is_empty());
    }
}
