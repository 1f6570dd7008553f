//! Wall-clock pacing for the fixed-step simulation.
//!
//! The match itself only counts frames. When the host runs in realtime mode
//! this accumulator decides how many frames are due, capping catch-up so a
//! stall does not snowball.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Most frames simulated for one wall-clock tick.
const MAX_CATCH_UP: u32 = 10;

/// Fixed-step frame pacer.
#[derive(Debug)]
pub struct FrameTiming {
    /// Simulation frames per second
    target_fps: u32,
    /// Wall-clock length of one frame
    frame_budget: Duration,
    /// Time of the last tick
    last_tick: Instant,
    /// Unsimulated wall-clock time in seconds
    accumulator: f32,
    /// Largest delta accepted for one tick
    max_dt: f32,
    /// Recent tick lengths for averaging
    tick_times: VecDeque<f32>,
    /// Maximum samples for averaging
    max_samples: usize,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FrameTiming {
    /// Create a pacer for `target_fps` frames per second.
    #[must_use]
    pub fn new(target_fps: u32) -> Self {
        let target_fps = target_fps.max(1);
        Self {
            target_fps,
            frame_budget: Duration::from_secs_f64(1.0 / f64::from(target_fps)),
            last_tick: Instant::now(),
            accumulator: 0.0,
            max_dt: 0.25,
            tick_times: VecDeque::with_capacity(120),
            max_samples: 120,
        }
    }

    /// Wall-clock length of one simulated frame in seconds.
    #[must_use]
    pub fn fixed_dt(&self) -> f32 {
        self.frame_budget.as_secs_f32()
    }

    /// Time since the previous tick, clamped.
    pub fn delta_time(&mut self) -> f32 {
        let now = Instant::now();
        let dt = (now - self.last_tick).as_secs_f32().min(self.max_dt);
        self.last_tick = now;

        self.tick_times.push_back(dt);
        if self.tick_times.len() > self.max_samples {
            self.tick_times.pop_front();
        }
        dt
    }

    /// Adds `dt` seconds and returns how many frames are due.
    pub fn accumulate(&mut self, dt: f32) -> u32 {
        let fixed_dt = self.fixed_dt();
        self.accumulator += dt;
        let mut due = 0;
        while self.accumulator >= fixed_dt && due < MAX_CATCH_UP {
            self.accumulator -= fixed_dt;
            due += 1;
        }

        // Still behind after catching up: drop the backlog
        if self.accumulator > fixed_dt * 2.0 {
            self.accumulator = 0.0;
        }
        due
    }

    /// Sleeps until the next frame is due.
    pub fn sleep_remainder(&self) {
        let elapsed = self.last_tick.elapsed();
        if elapsed < self.frame_budget {
            std::thread::sleep(self.frame_budget - elapsed);
        }
    }

    /// Average ticks per second over recent ticks.
    #[must_use]
    pub fn current_rate(&self) -> f32 {
        if self.tick_times.is_empty() {
            return 0.0;
        }
        let average = self.tick_times.iter().sum::<f32>() / self.tick_times.len() as f32;
        if average > 0.0 {
            1.0 / average
        } else {
            0.0
        }
    }

    /// Target frames per second.
    #[must_use]
    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    /// Restarts the clock, dropping time spent before the first frame.
    pub fn reset(&mut self) {
        self.last_tick = Instant::now();
        self.accumulator = 0.0;
        self.tick_times.clear();
    }
}
