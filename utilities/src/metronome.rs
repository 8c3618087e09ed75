/// Periodic timer expressed as a next wake time on a millisecond clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metronome {
    period_ms: u64,
    next_ms: u64,
}

impl Metronome {
    pub fn new(period_ms: u64, now_ms: u64) -> Self {
        Self {
            period_ms,
            next_ms: now_ms.saturating_add(period_ms),
        }
    }

    /// Returns `true` at most once per period. Missed periods are not
    /// replayed.
    pub fn ready(&mut self, now_ms: u64) -> bool {
        if now_ms < self.next_ms {
            return false;
        }
        self.next_ms = now_ms.saturating_add(self.period_ms);
        true
    }

    pub fn restart(&mut self, now_ms: u64) {
        self.next_ms = now_ms.saturating_add(self.period_ms);
    }
}
