use crate::domain::BattleSnapshot;
use crate::domain::gifts;
use crate::interface_adapters::protocol::StateUpdateDto;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ManualScoreRequest<'a> {
    country: &'a str,
    points: u64,
    gift: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ResetRequest {}

// Success payload shared by the admin endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl MessageResponse {
    /// Text to surface to the operator; prefers the detail line.
    pub fn summary(&self) -> String {
        self.detail
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_default()
    }
}

// Error payload; validation failures send a structured `detail`.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BattleHistoryItem {
    pub id: String,
    pub creator_username: String,
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub winner_country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardEntry {
    pub country_name: String,
    pub total_wins: u64,
    pub total_second_place: u64,
    pub total_third_place: u64,
    pub total_battles: u64,
}

impl LeaderboardEntry {
    /// Whole-percent win rate, 0 when no battles were played.
    pub fn win_rate_pct(&self) -> u64 {
        if self.total_battles == 0 {
            return 0;
        }
        (self.total_wins as f64 / self.total_battles as f64 * 100.0).round() as u64
    }
}

#[derive(Debug, Deserialize)]
struct ActiveBattleResponse {
    active: bool,
    #[serde(default)]
    battle: Option<StateUpdateDto>,
}

#[derive(Debug)]
pub enum AdminError {
    Transport(reqwest::Error),
    // Non-2xx answer; `detail` is the server-provided explanation when present.
    Rejected {
        status: StatusCode,
        detail: Option<String>,
    },
    Decode(reqwest::Error),
}

impl fmt::Display for AdminError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminError::Transport(err) => write!(f, "admin transport error: {err}"),
            AdminError::Rejected { status, detail } => {
                if let Some(detail) = detail {
                    write!(f, "{detail} ({status})")
                } else {
                    write!(f, "request rejected with {status}")
                }
            }
            AdminError::Decode(err) => write!(f, "admin response decode error: {err}"),
        }
    }
}

impl std::error::Error for AdminError {}

// Thin reqwest client for the admin and read-only HTTP endpoints.
#[derive(Clone)]
pub struct AdminClient {
    http: Client,
    base_url: String,
}

impl AdminClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Adds points to an entity. A known gift name overrides `points` with its
    /// catalog value.
    pub async fn manual_score(
        &self,
        entity: &str,
        points: u64,
        gift: Option<&str>,
    ) -> Result<MessageResponse, AdminError> {
        let url = format!("{}/manual-score", self.base_url);
        let body = ManualScoreRequest {
            country: entity,
            points: gifts::resolve_points(gift, points),
            gift,
        };
        let res = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(AdminError::Transport)?;
        decode(res).await
    }

    pub async fn reset(&self) -> Result<MessageResponse, AdminError> {
        let url = format!("{}/reset", self.base_url);
        let res = self
            .http
            .post(url)
            .json(&ResetRequest {})
            .send()
            .await
            .map_err(AdminError::Transport)?;
        decode(res).await
    }

    pub async fn history(&self) -> Result<Vec<BattleHistoryItem>, AdminError> {
        self.get_json("history").await
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, AdminError> {
        self.get_json("leaderboard").await
    }

    /// Current battle as an inactive snapshot when none runs.
    pub async fn active_battle(&self) -> Result<BattleSnapshot, AdminError> {
        let response: ActiveBattleResponse = self.get_json("active-battle").await?;
        Ok(match (response.active, response.battle) {
            (true, Some(battle)) => battle.into_snapshot(0),
            _ => BattleSnapshot::inactive(0),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, AdminError> {
        let url = format!("{}/{path}", self.base_url);
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(AdminError::Transport)?;
        decode(res).await
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(res: reqwest::Response) -> Result<T, AdminError> {
    let status = res.status();

    // Keep the server's explanation so the operator sees why it was refused.
    if !status.is_success() {
        let detail = res
            .json::<ErrorResponse>()
            .await
            .ok()
            .map(|payload| match payload.detail {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            });
        return Err(AdminError::Rejected { status, detail });
    }

    res.json::<T>().await.map_err(AdminError::Decode)
}
