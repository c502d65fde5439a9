// Ranking projection over a score map, with timed rank-improvement highlights.
//
// Positions are always sequential (1, 2, 3, ...) even when scores tie; ties
// keep the order the entities appear in the score map. Shared positions for
// ties are intentionally not produced.

use crate::domain::snapshot::Scores;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default lifetime of a rank-improvement highlight.
pub const RANK_HIGHLIGHT_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntity {
    pub name: String,
    pub score: u64,
    pub position: usize,
    // None when the entity was absent from the previous projection.
    pub previous_position: Option<usize>,
}

impl RankedEntity {
    pub fn moved_up(&self) -> bool {
        self.previous_position
            .is_some_and(|previous| self.position < previous)
    }
}

#[derive(Debug)]
pub struct RankingProjector {
    highlight_window: Duration,
    current: Vec<RankedEntity>,
    // Expiry deadline per entity that recently moved up.
    highlights: HashMap<String, Instant>,
}

impl Default for RankingProjector {
    fn default() -> Self {
        Self::new(RANK_HIGHLIGHT_WINDOW)
    }
}

impl RankingProjector {
    pub fn new(highlight_window: Duration) -> Self {
        Self {
            highlight_window,
            current: Vec::new(),
            highlights: HashMap::new(),
        }
    }

    /// Ranks `scores` and arms highlights for entities that moved up since the
    /// previous projection. The previous ranking is superseded.
    pub fn project(&mut self, scores: &Scores, now: Instant) -> &[RankedEntity] {
        let previous: HashMap<&str, usize> = self
            .current
            .iter()
            .map(|entity| (entity.name.as_str(), entity.position))
            .collect();

        let mut ordered: Vec<(&str, u64)> = scores.iter().collect();
        // `sort_by` is stable: equal scores keep their score-map order.
        ordered.sort_by(|a, b| b.1.cmp(&a.1));

        let next: Vec<RankedEntity> = ordered
            .into_iter()
            .enumerate()
            .map(|(idx, (name, score))| RankedEntity {
                name: name.to_string(),
                score,
                position: idx + 1,
                previous_position: previous.get(name).copied(),
            })
            .collect();

        // Entities that left the projection cannot stay highlighted.
        self.highlights
            .retain(|name, _| next.iter().any(|entity| entity.name == *name));

        for entity in next.iter().filter(|entity| entity.moved_up()) {
            self.highlights
                .insert(entity.name.clone(), now + self.highlight_window);
        }

        self.current = next;
        &self.current
    }

    pub fn rankings(&self) -> &[RankedEntity] {
        &self.current
    }

    /// The entity at position 1, if any.
    pub fn winner(&self) -> Option<&RankedEntity> {
        self.current.first()
    }

    pub fn is_rank_improved(&self, name: &str, now: Instant) -> bool {
        self.highlights
            .get(name)
            .is_some_and(|expires_at| now < *expires_at)
    }

    /// Earliest pending highlight expiry.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.highlights.values().min().copied()
    }

    /// Drops expired highlights; returns true when at least one cleared.
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.highlights.len();
        self.highlights.retain(|_, expires_at| now < *expires_at);
        self.highlights.len() != before
    }

    pub fn cancel_highlights(&mut self) {
        self.highlights.clear();
    }

    /// Forgets the previous ranking, e.g. when a different battle starts.
    pub fn reset(&mut self) {
        self.current.clear();
        self.highlights.clear();
    }
}
