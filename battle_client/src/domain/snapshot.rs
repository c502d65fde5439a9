// Domain-level battle snapshot: the single authoritative state pushed by the server.

use crate::domain::timer::BattleClock;

/// Battle length assumed when the server has not reported one (or no battle runs).
pub const DEFAULT_BATTLE_SECONDS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    StateUpdate,
    GameOver,
    // Sent on connect when the server has no active battle.
    NoBattle,
}

/// Entity scores in the order the server listed them.
///
/// The order is the deterministic tie-break key for ranking, so it is kept
/// as a sequence instead of a hash map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scores(Vec<(String, u64)>);

impl Scores {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Inserts or replaces a score; a replaced entry keeps its original slot.
    pub fn insert(&mut self, name: impl Into<String>, score: u64) {
        let name = name.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = score,
            None => self.0.push((name, score)),
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, score)| *score)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, score)| (name.as_str(), *score))
    }

    pub fn max_score(&self) -> u64 {
        self.0.iter().map(|(_, score)| *score).max().unwrap_or(0)
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for Scores {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut scores = Scores::new();
        for (name, score) in iter {
            scores.insert(name, score);
        }
        scores
    }
}

/// One-shot scoring event announced alongside a state update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastGift {
    pub user: String,
    pub gift_name: String,
    pub points: u64,
    pub target_entity: String,
    pub is_top_tier: bool,
}

/// Final standing reported by the server on the terminal snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalRanking {
    pub name: String,
    pub score: u64,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleSnapshot {
    // Per-push identity assigned on receipt; a re-applied push keeps its sequence.
    pub sequence: u64,
    pub kind: MessageKind,
    pub battle_id: Option<String>,
    pub creator_name: Option<String>,
    pub scores: Scores,
    pub time_remaining_seconds: u64,
    pub total_seconds: u64,
    pub finished: bool,
    pub last_gift: Option<LastGift>,
    pub winner: Option<String>,
    pub final_rankings: Vec<FinalRanking>,
    // Human-readable server notice (e.g. "No active battle").
    pub notice: Option<String>,
}

impl BattleSnapshot {
    /// Snapshot representing "no active battle".
    pub fn inactive(sequence: u64) -> Self {
        Self {
            sequence,
            kind: MessageKind::NoBattle,
            battle_id: None,
            creator_name: None,
            scores: Scores::new(),
            time_remaining_seconds: DEFAULT_BATTLE_SECONDS,
            total_seconds: DEFAULT_BATTLE_SECONDS,
            finished: false,
            last_gift: None,
            winner: None,
            final_rankings: Vec::new(),
            notice: None,
        }
    }

    /// Zero entities is the explicit "no active battle" condition.
    pub fn is_active(&self) -> bool {
        !self.scores.is_empty()
    }

    pub fn clock(&self) -> BattleClock {
        BattleClock::new(self.time_remaining_seconds, self.total_seconds)
    }

    /// Whether this snapshot announces a finished battle with a usable result.
    pub fn has_final_result(&self) -> bool {
        self.kind == MessageKind::GameOver
            && self.winner.as_deref().is_some_and(|w| !w.is_empty())
            && !self.final_rankings.is_empty()
    }
}
