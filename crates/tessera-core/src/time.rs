//! Frame timing for the Tessera runtime
//!
//! Turns raw frame deltas into the clamped, scaled delta handed to states and
//! systems.

use serde::{Deserialize, Serialize};

/// Configuration for frame time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// How many game seconds pass per real second
    pub time_scale: f32,
    /// Maximum delta time to prevent a spiral of death after a stall
    pub max_delta_time: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            max_delta_time: 0.25,
        }
    }
}

/// Frame time tracking
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    /// Configuration
    pub config: ClockConfig,
    /// Time since start in seconds
    pub total_time: f64,
    /// Delta time for this frame (clamped and scaled)
    pub delta_time: f32,
    /// Clamped but unscaled delta time
    pub unscaled_delta_time: f32,
    /// Frame counter
    pub frame_count: u64,
}

impl FrameClock {
    /// Create a new clock with custom config
    pub fn new(config: ClockConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Advance by the raw delta of the previous frame and return the delta to
    /// dispatch this frame.
    pub fn tick(&mut self, raw_delta: f32) -> f32 {
        self.unscaled_delta_time = raw_delta.clamp(0.0, self.config.max_delta_time);
        self.frame_count += 1;
        self.delta_time = self.unscaled_delta_time * self.config.time_scale;
        self.total_time += f64::from(self.delta_time);
        self.delta_time
    }
}
