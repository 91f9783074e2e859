/// Throttled timer - minimum interval between fires
#[derive(Debug, Clone, Copy)]
pub struct Throttled {
    min_interval: f32,
    time_since_last: f32,
}

impl Throttled {
    /// Create throttled timer with minimum interval
    pub fn new(min_interval: f32) -> Self {
        Self {
            min_interval,
            time_since_last: 0.0,
        }
    }

    /// Attempt to fire, returns true if enough time has passed
    pub fn try_tick(&mut self, delta: f32) -> bool {
        self.time_since_last += delta;

        if self.time_since_last >= self.min_interval {
            self.time_since_last = 0.0;
            true
        } else {
            false
        }
    }
}

/// Frame-rate meter, reports average FPS once per interval
#[derive(Debug, Clone, Copy)]
pub struct FpsMeter {
    window: Throttled,
    frames: u32,
    elapsed: f32,
}

impl FpsMeter {
    pub fn new(interval: f32) -> Self {
        Self {
            window: Throttled::new(interval),
            frames: 0,
            elapsed: 0.0,
        }
    }

    /// Count one frame of length `delta`; returns the average once per interval
    pub fn tick(&mut self, delta: f32) -> Option<f32> {
        self.frames += 1;
        self.elapsed += delta;
        if !self.window.try_tick(delta) {
            return None;
        }

        let fps = if self.elapsed > 0.0 {
            self.frames as f32 / self.elapsed
        } else {
            0.0
        };
        self.frames = 0;
        self.elapsed = 0.0;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttled_enforces_minimum() {
        let mut timer = Throttled::new(0.1);

        assert!(!timer.try_tick(0.05)); // Too soon
        assert!(timer.try_tick(0.06)); // Enough time
        assert!(!timer.try_tick(0.05));
    }

    #[test]
    fn fps_meter_averages_over_window() {
        let mut meter = FpsMeter::new(1.0);

        for _ in 0..59 {
            assert!(meter.tick(1.0 / 60.0).is_none());
        }
        let fps = meter.tick(1.0 / 60.0 + 1e-4).unwrap();
        assert!((fps - 60.0).abs() < 0.5);
    }
}
