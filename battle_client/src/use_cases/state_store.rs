// Holds the single current battle snapshot and derives edge-triggered notifications.

use crate::domain::{BattleSnapshot, MessageKind};

/// Notifications raised by one applied snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Notifications {
    pub arrived_top_tier_gift: bool,
    pub battle_just_ended: bool,
    // A different battle id replaced the previous one.
    pub battle_changed: bool,
}

impl Notifications {
    pub fn any(&self) -> bool {
        self.arrived_top_tier_gift || self.battle_just_ended || self.battle_changed
    }
}

#[derive(Debug)]
pub struct StateStore {
    current: BattleSnapshot,
    // Sequence of the last push that raised a top-tier gift.
    last_gift_sequence: Option<u64>,
    // Id of the last battle whose end was announced.
    ended_battle_id: Option<String>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            current: BattleSnapshot::inactive(0),
            last_gift_sequence: None,
            ended_battle_id: None,
        }
    }

    pub fn current(&self) -> &BattleSnapshot {
        &self.current
    }

    /// Replaces the current snapshot in full and reports the edges it crossed.
    pub fn apply(&mut self, snapshot: BattleSnapshot) -> Notifications {
        let arrived_top_tier_gift = snapshot.kind == MessageKind::StateUpdate
            && snapshot
                .last_gift
                .as_ref()
                .is_some_and(|gift| gift.is_top_tier)
            && self.last_gift_sequence != Some(snapshot.sequence);
        if arrived_top_tier_gift {
            self.last_gift_sequence = Some(snapshot.sequence);
        }

        let battle_just_ended = snapshot.has_final_result() && !self.has_already_ended(&snapshot);
        if battle_just_ended {
            self.ended_battle_id = snapshot.battle_id.clone();
        }

        let battle_changed = match (&self.current.battle_id, &snapshot.battle_id) {
            (Some(previous), Some(incoming)) => previous != incoming,
            _ => false,
        };

        self.current = snapshot;

        Notifications {
            arrived_top_tier_gift,
            battle_just_ended,
            battle_changed,
        }
    }

    fn has_already_ended(&self, snapshot: &BattleSnapshot) -> bool {
        match (&self.ended_battle_id, &snapshot.battle_id) {
            // Known ids decide: each battle ends once.
            (Some(ended), Some(incoming)) => ended == incoming,
            // Without ids fall back to the finished edge.
            _ => self.current.finished,
        }
    }
}
