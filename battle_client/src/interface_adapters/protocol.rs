// Wire protocol DTOs for the live-update channel and their domain conversions.
// Admin HTTP DTOs live next to the admin client.

use crate::domain::gifts;
use crate::domain::snapshot::DEFAULT_BATTLE_SECONDS;
use crate::domain::{BattleSnapshot, FinalRanking, LastGift, MessageKind, ProtocolError, Scores};
use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};
use std::fmt;

/// Bare keepalive token, echoed verbatim (not JSON-wrapped).
pub const HEARTBEAT_TOKEN: &str = "ping";

const KNOWN_TYPES: &[&str] = &["ping", "pong", "state_update", "game_over", "no_battle"];

/// Messages the server pushes over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    // Keepalive probe; must be answered with `HEARTBEAT_TOKEN`.
    Ping,
    // Server reply to a client-initiated ping.
    Pong,
    StateUpdate(StateUpdateDto),
    GameOver(GameOverDto),
    NoBattle {
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateUpdateDto {
    #[serde(default)]
    pub battle_id: Option<String>,
    #[serde(default)]
    pub creator_username: Option<String>,
    #[serde(default)]
    pub scores: Option<WireScores>,
    #[serde(default)]
    pub time_remaining: Option<i64>,
    #[serde(default)]
    pub total_seconds: Option<i64>,
    #[serde(default)]
    pub battle_finished: bool,
    #[serde(default)]
    pub last_gift: Option<LastGiftDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastGiftDto {
    pub user: String,
    pub gift: String,
    pub points: i64,
    pub country: String,
    #[serde(default)]
    pub is_lion: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameOverDto {
    #[serde(default)]
    pub battle_id: Option<String>,
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub rankings: Vec<RankingEntryDto>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingEntryDto {
    pub country: String,
    pub score: i64,
    pub position: usize,
}

/// Score map that keeps the order keys appear on the wire.
#[derive(Debug, Clone, Default)]
pub struct WireScores(Vec<(String, i64)>);

impl<'de> Deserialize<'de> for WireScores {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = WireScores;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of entity name to integer score")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, score)) = map.next_entry::<String, i64>()? {
                    entries.push((name, score));
                }
                Ok(WireScores(entries))
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}

impl From<WireScores> for Scores {
    fn from(wire: WireScores) -> Self {
        wire.0
            .into_iter()
            .map(|(name, score)| (name, non_negative(score)))
            .collect()
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Classifies one text frame. A bare heartbeat token counts as a ping.
pub fn decode_frame(text: &str) -> Result<InboundMessage, ProtocolError> {
    if text.trim() == HEARTBEAT_TOKEN {
        return Ok(InboundMessage::Ping);
    }

    // Peek at the tag first so unknown message types are reported as such.
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    let kind = envelope.kind.unwrap_or_default();
    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Err(ProtocolError::UnknownType(kind));
    }

    serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
}

impl InboundMessage {
    /// Converts a state-bearing message into a snapshot; heartbeats yield None.
    pub fn into_snapshot(self, sequence: u64) -> Option<BattleSnapshot> {
        match self {
            InboundMessage::Ping | InboundMessage::Pong => None,
            InboundMessage::StateUpdate(dto) => Some(dto.into_snapshot(sequence)),
            InboundMessage::GameOver(dto) => Some(dto.into_snapshot(sequence)),
            InboundMessage::NoBattle { message } => {
                let mut snapshot = BattleSnapshot::inactive(sequence);
                snapshot.notice = message;
                Some(snapshot)
            }
        }
    }
}

impl StateUpdateDto {
    pub fn into_snapshot(self, sequence: u64) -> BattleSnapshot {
        let total_seconds = self
            .total_seconds
            .map(non_negative)
            .unwrap_or(DEFAULT_BATTLE_SECONDS);
        let time_remaining_seconds = self
            .time_remaining
            .map(non_negative)
            .unwrap_or(total_seconds);

        BattleSnapshot {
            sequence,
            kind: MessageKind::StateUpdate,
            battle_id: self.battle_id,
            creator_name: self.creator_username,
            scores: self.scores.map(Scores::from).unwrap_or_default(),
            time_remaining_seconds,
            total_seconds,
            finished: self.battle_finished,
            last_gift: self.last_gift.map(LastGift::from),
            winner: None,
            final_rankings: Vec::new(),
            notice: None,
        }
    }
}

impl GameOverDto {
    pub fn into_snapshot(self, sequence: u64) -> BattleSnapshot {
        let final_rankings: Vec<FinalRanking> = self
            .rankings
            .into_iter()
            .map(|entry| FinalRanking {
                name: entry.country,
                score: non_negative(entry.score),
                position: entry.position,
            })
            .collect();
        // Terminal snapshots carry no score map; rank from the final standings.
        let scores: Scores = final_rankings
            .iter()
            .map(|entry| (entry.name.clone(), entry.score))
            .collect();
        let total_seconds = self
            .duration_seconds
            .map(non_negative)
            .unwrap_or(DEFAULT_BATTLE_SECONDS);

        BattleSnapshot {
            sequence,
            kind: MessageKind::GameOver,
            battle_id: self.battle_id,
            creator_name: None,
            scores,
            time_remaining_seconds: 0,
            total_seconds,
            finished: true,
            last_gift: None,
            winner: self.winner,
            final_rankings,
            notice: None,
        }
    }
}

impl From<LastGiftDto> for LastGift {
    fn from(dto: LastGiftDto) -> Self {
        // Older servers omit the flag; fall back to the catalog.
        let is_top_tier = dto.is_lion.unwrap_or_else(|| gifts::is_top_tier(&dto.gift));
        Self {
            user: dto.user,
            gift_name: dto.gift,
            points: non_negative(dto.points),
            target_entity: dto.country,
            is_top_tier,
        }
    }
}

fn non_negative(value: i64) -> u64 {
    value.max(0) as u64
}
