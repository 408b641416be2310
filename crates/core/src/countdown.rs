//! Per-question answer timer.

/// Default time allowed per question, in seconds.
pub const DEFAULT_QUESTION_SECS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick was counted and time still remains.
    Advanced,
    /// This tick used up the last of the allotted time.
    Expired,
    /// The timer is stopped or already expired, nothing changed.
    Holding,
}

/// Counts whole seconds towards a per-question limit.
///
/// Progress is reported as a percentage and is capped at 100.
#[derive(Debug, Clone)]
pub struct Countdown {
    duration_secs: u32,
    elapsed_ticks: u32,
    running: bool,
}

impl Countdown {
    pub fn new(duration_secs: u32) -> Self {
        Self {
            duration_secs: duration_secs.max(1),
            elapsed_ticks: 0,
            running: false,
        }
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Back to zero and stopped.
    pub fn reset(&mut self) {
        self.elapsed_ticks = 0;
        self.running = false;
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed_ticks >= self.duration_secs
    }

    pub fn remaining_secs(&self) -> u32 {
        self.duration_secs.saturating_sub(self.elapsed_ticks)
    }

    pub fn progress(&self) -> f64 {
        let percent = f64::from(self.elapsed_ticks) * 100.0 / f64::from(self.duration_secs);
        percent.min(100.0)
    }

    /// Counts one second if the timer is running.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running || self.is_expired() {
            return TickOutcome::Holding;
        }
        self.elapsed_ticks += 1;
        if self.is_expired() {
            TickOutcome::Expired
        } else {
            TickOutcome::Advanced
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(DEFAULT_QUESTION_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_timer_holds() {
        let mut countdown = Countdown::new(10);
        assert_eq!(countdown.tick(), TickOutcome::Holding);
        assert_eq!(countdown.progress(), 0.0);
    }

    #[test]
    fn test_progress_is_linear_and_capped() {
        let mut countdown = Countdown::new(4);
        countdown.start();

        assert_eq!(countdown.tick(), TickOutcome::Advanced);
        assert_eq!(countdown.progress(), 25.0);
        countdown.tick();
        countdown.tick();
        assert_eq!(countdown.tick(), TickOutcome::Expired);
        assert_eq!(countdown.progress(), 100.0);

        // Expiry fires exactly once.
        assert_eq!(countdown.tick(), TickOutcome::Holding);
        assert_eq!(countdown.progress(), 100.0);
        assert_eq!(countdown.remaining_secs(), 0);
    }

    #[test]
    fn test_reset_returns_to_zero() {
        let mut countdown = Countdown::new(2);
        countdown.start();
        countdown.tick();

        countdown.reset();

        assert!(!countdown.is_running());
        assert_eq!(countdown.progress(), 0.0);
        assert_eq!(countdown.remaining_secs(), 2);
    }

    #[test]
    fn test_stop_freezes_progress() {
        let mut countdown = Countdown::new(10);
        countdown.start();
        countdown.tick();
        countdown.stop();
        countdown.tick();
        assert_eq!(countdown.progress(), 10.0);
    }

    #[test]
    fn test_zero_duration_is_clamped() {
        let countdown = Countdown::new(0);
        assert_eq!(countdown.duration_secs(), 1);
    }
}
