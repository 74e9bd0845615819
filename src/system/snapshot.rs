use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// The system-wide figures a renderer reads after each refresh cycle.
/// Memory and swap are in KiB.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub uptime: i64,
    pub memmax: u64,
    pub mem: u64,
    pub memwithbuffers: u64,
    pub memfree: u64,
    pub memeasyfree: u64,
    pub legacymem: u64,
    pub swapmax: u64,
    pub swap: u64,
    pub swapfree: u64,
    pub cpu_count: usize,
    /// Slot 0 is the aggregate, slots 1..=cpu_count the individual cores.
    pub cpu_usage: Vec<f32>,
    pub loadavg: [f32; 3],
    pub procs: u32,
    pub run_procs: u32,
}

/// Timing of refresh cycles, driven by the scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UpdateClock {
    /// Seconds at the start of the current cycle.
    pub current_update_time: f64,
    /// Seconds at the start of the previous cycle.
    pub last_update_time: f64,
    /// Count of completed cycles.
    pub tick: u64,
}

impl UpdateClock {
    /// Starts a new cycle at `now` seconds.
    pub fn advance(&mut self, now: f64) {
        self.last_update_time = self.current_update_time;
        self.current_update_time = now;
        self.tick += 1;
    }

    /// Starts a new cycle at the current wall-clock time.
    pub fn advance_to_now(&mut self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(self.current_update_time);
        self.advance(now);
    }

    /// Seconds between the previous cycle and this one.
    pub fn delta(&self) -> f64 {
        self.current_update_time - self.last_update_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_shifts_times_and_ticks() {
        let mut clock = UpdateClock::default();
        clock.advance(10.0);
        clock.advance(12.5);
        assert_eq!(clock.tick, 2);
        assert!((clock.delta() - 2.5).abs() < f64::EPSILON);
    }
}
