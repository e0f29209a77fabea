use chrono::{Local, Timelike};

/// Current wall-clock hour, 0..=23
pub fn local_hour() -> u32 {
    Local::now().hour()
}

/// Strikes for a 24h hour: the 12h clock value with midnight/noon as 12
pub fn strikes_for_hour(hour: u32) -> u32 {
    match hour % 12 {
        0 => 12,
        h => h,
    }
}

/// Detects the moment the wall-clock hour changes.
///
/// The first observed hour only primes the watcher, so starting the
/// program never chimes on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct HourWatcher {
    last_hour: Option<u32>,
}

impl HourWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `hour`, returning true when it differs from the previous one
    pub fn observe(&mut self, hour: u32) -> bool {
        let crossed = self.last_hour.is_some_and(|last| last != hour);
        self.last_hour = Some(hour);
        crossed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strikes_follow_twelve_hour_clock() {
        assert_eq!(strikes_for_hour(0), 12);
        assert_eq!(strikes_for_hour(12), 12);
        assert_eq!(strikes_for_hour(13), 1);
        assert_eq!(strikes_for_hour(3), 3);
        assert_eq!(strikes_for_hour(23), 11);
    }

    #[test]
    fn first_observation_only_primes() {
        let mut watcher = HourWatcher::new();
        assert!(!watcher.observe(9));
        assert!(!watcher.observe(9));
        assert!(watcher.observe(10));
        assert!(!watcher.observe(10));
        assert!(watcher.observe(0));
        assert!(!watcher.observe(0));
    }
}
