//! Frame timing statistics.
//!
//! The monitor averages frame times over a short window and reports the
//! average frame time and the rounded frame rate once per window.

use std::time::Instant;

/// How much accumulated frame time makes one report window (seconds).
pub const REPORT_INTERVAL: f32 = 0.5;

/// One report from [`FrameRateMonitor`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameRateSample {
    pub average_frame_time: f32,
    pub frames: u32,
}

impl FrameRateSample {
    pub fn frame_time_ms(&self) -> f32 {
        self.average_frame_time * 1000.0
    }

    /// Frames per second, rounded to the nearest integer.
    pub fn fps(&self) -> u32 {
        if self.average_frame_time > 0.0 {
            (1.0 / self.average_frame_time).round() as u32
        } else {
            0
        }
    }
}

#[derive(Clone, Debug)]
pub struct FrameRateMonitor {
    interval: f32,
    total_time: f32,
    frames: u32,
}

impl Default for FrameRateMonitor {
    fn default() -> Self {
        Self::new(REPORT_INTERVAL)
    }
}

impl FrameRateMonitor {
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            total_time: 0.0,
            frames: 0,
        }
    }

    /// Accumulate one frame. Returns a sample once the window is exceeded.
    pub fn record(&mut self, frame_time: f32) -> Option<FrameRateSample> {
        self.total_time += frame_time;
        self.frames += 1;
        if self.total_time <= self.interval {
            return None;
        }

        let sample = FrameRateSample {
            average_frame_time: self.total_time / self.frames as f32,
            frames: self.frames,
        };
        log::info!(
            "Frame time: {:.2}ms, FPS: {}",
            sample.frame_time_ms(),
            sample.fps()
        );
        self.total_time = 0.0;
        self.frames = 0;
        Some(sample)
    }
}

/// Run `f` and log how long it took.
pub fn timed<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::debug!("[PERF] {}: {:.2}ms", label, start.elapsed().as_secs_f64() * 1000.0);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_report_within_window() {
        let mut monitor = FrameRateMonitor::default();
        for _ in 0..10 {
            assert!(monitor.record(0.04).is_none());
        }
    }

    #[test]
    fn test_report_after_window() {
        let mut monitor = FrameRateMonitor::default();
        let mut sample = None;
        for _ in 0..4 {
            sample = sample.or(monitor.record(0.15));
        }
        let sample = sample.unwrap();
        assert_eq!(sample.frames, 4);
        assert!((sample.frame_time_ms() - 150.0).abs() < 1e-3);
        assert_eq!(sample.fps(), 7);
    }

    #[test]
    fn test_window_resets() {
        let mut monitor = FrameRateMonitor::new(0.1);
        assert!(monitor.record(0.2).is_some());
        assert!(monitor.record(0.05).is_none());
        let sample = monitor.record(0.1).unwrap();
        assert_eq!(sample.frames, 2);
    }

    #[test]
    fn test_fps_rounding() {
        let sample = FrameRateSample {
            average_frame_time: 1.0 / 59.6,
            frames: 1,
        };
        assert_eq!(sample.fps(), 60);
    }

    #[test]
    fn test_timed_returns_value() {
        assert_eq!(timed("add", || 2 + 2), 4);
    }
}
