//! Frame timing.

use std::time::{Duration, Instant};

/// Tracks total run time and per-frame delta time.
///
/// [`Timer::tick`] returns the time since the previous tick and moves
/// the baseline forward; the render loop calls it once per frame.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Starts the timer at the current instant.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Time since the timer started or was last reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Same as [`Timer::elapsed`] in fractional seconds.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Time since the previous tick; advances the tick baseline.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }

    /// Same as [`Timer::tick`] in fractional seconds.
    pub fn delta_secs(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }

    /// Restarts both the start time and the tick baseline.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_is_monotonic() {
        let timer = Timer::new();
        let a = timer.elapsed();
        let b = timer.elapsed();
        assert!(b >= a);
    }

    #[test]
    fn test_tick_advances_baseline() {
        let mut timer = Timer::new();
        let _ = timer.tick();
        let second = timer.tick();
        assert!(second <= timer.elapsed());
    }

    #[test]
    fn test_reset_rewinds_elapsed() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(5));
        let before = timer.elapsed();
        timer.reset();
        assert!(timer.elapsed() < before);
    }
}
