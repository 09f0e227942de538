use std::time::Duration;

/// Seed of the maintenance countdown: 24 hours.
pub const DEFAULT_COUNTDOWN_SEED: Duration = Duration::from_secs(24 * 60 * 60);

/// Countdown
///
/// The display-only timer on the maintenance page. It is not authoritative: nothing
/// happens when it reaches zero, it simply stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u64,
}

impl Countdown {
    pub fn new(seed: Duration) -> Self {
        Self {
            remaining: seed.as_secs(),
        }
    }

    /// Seconds left.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    /// tick
    ///
    /// One second elapsed. Floors at zero.
    pub fn tick(&mut self) -> u64 {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining
    }

    /// `HH:MM:SS`, hours not wrapped at 24.
    pub fn format(&self) -> String {
        format_hms(self.remaining)
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTDOWN_SEED)
    }
}

pub fn format_hms(seconds: u64) -> String {
    let hrs = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hrs:02}:{mins:02}:{secs:02}")
}
