use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Clamped seconds since the previous tick.
    pub dt: f32,
    /// Seconds since the clock started; sum of the clamped deltas.
    pub elapsed: f32,
    pub now: Instant,
    /// Monotonic tick counter. Independent of the renderer's frame index,
    /// which skips frames that fail to acquire a surface texture.
    pub tick: u64,
}

/// Produces `FrameTime` snapshots with clamped delta time.
///
/// Clamping keeps animation stable after stalls (debugger, minimised window).
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    elapsed: f32,
    tick: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            elapsed: 0.0,
            tick: 0,
            dt_min,
            dt_max,
        }
    }

    /// Resets the delta baseline, e.g. after the surface was reconfigured.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max)
            .as_secs_f32();

        self.last = now;
        self.elapsed += dt;

        let time = FrameTime {
            dt,
            elapsed: self.elapsed,
            now,
            tick: self.tick,
        };
        self.tick = self.tick.wrapping_add(1);
        time
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_clamped_both_ways() {
        let mut clock = FrameClock::with_clamps(Duration::from_millis(1), Duration::from_millis(100));
        let start = clock.last;

        let t0 = clock.tick_at(start);
        assert!((t0.dt - 0.001).abs() < 1e-6);

        let t1 = clock.tick_at(start + Duration::from_secs(5));
        assert!((t1.dt - 0.1).abs() < 1e-6);
    }

    #[test]
    fn ticks_count_up_and_accumulate_elapsed() {
        let mut clock = FrameClock::new();
        let start = clock.last;

        let a = clock.tick_at(start + Duration::from_millis(10));
        let b = clock.tick_at(start + Duration::from_millis(30));

        assert_eq!(a.tick, 0);
        assert_eq!(b.tick, 1);
        assert!((b.elapsed - 0.030).abs() < 1e-4);
    }
}
