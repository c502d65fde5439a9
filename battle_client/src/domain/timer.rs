// Countdown presentation rules for the battle timer.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Calm,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleClock {
    remaining: u64,
    total: u64,
}

impl BattleClock {
    /// Remaining time is clamped to the total; the server contract is not trusted.
    pub fn new(remaining: u64, total: u64) -> Self {
        Self {
            remaining: remaining.min(total),
            total,
        }
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining
    }

    /// Remaining time as a percentage of the total (0 when total is 0).
    pub fn progress_pct(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.remaining as f64 / self.total as f64 * 100.0
    }

    pub fn urgency(&self) -> Urgency {
        let pct = self.progress_pct();
        if pct > 50.0 {
            Urgency::Calm
        } else if pct > 20.0 {
            Urgency::Warning
        } else {
            Urgency::Critical
        }
    }

    /// `mm:ss`, minutes are not wrapped into hours.
    pub fn format_remaining(&self) -> String {
        format!("{:02}:{:02}", self.remaining / 60, self.remaining % 60)
    }
}
