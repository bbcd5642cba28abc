//! Single-shot deadline polled by the table tick.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// Arm the timer, replacing any pending deadline.
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fires once: true when the deadline has passed, disarming the timer.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_after_deadline() {
        let now = Instant::now();
        let mut timer = Timer::default();
        assert!(!timer.fire(now));
        timer.schedule(now, Duration::from_secs(2));
        assert!(!timer.fire(now + Duration::from_secs(1)));
        assert_eq!(timer.remaining(now), Some(Duration::from_secs(2)));
        assert!(timer.fire(now + Duration::from_secs(2)));
        assert!(!timer.fire(now + Duration::from_secs(3)));
    }

    #[test]
    fn test_reschedule_replaces_and_cancel_disarms() {
        let now = Instant::now();
        let mut timer = Timer::default();
        timer.schedule(now, Duration::from_secs(1));
        timer.schedule(now, Duration::from_secs(10));
        assert!(!timer.fire(now + Duration::from_secs(5)));
        timer.cancel();
        assert!(!timer.is_armed());
        assert!(!timer.fire(now + Duration::from_secs(60)));
    }
}
