//! Spawn timing policies mapping a unit index to its offset from wave start.

use serde::{Deserialize, Serialize};

const DEFAULT_SPAWN_DELAY: f32 = 1.0;
const DEFAULT_BURST_SIZE: u32 = 5;
const DEFAULT_BURST_DELAY: f32 = 3.0;
const DEFAULT_SPAWN_DURATION: f32 = 30.0;
const DEFAULT_INITIAL_DELAY: f32 = 3.0;

/// Policies describing how spawns are spread across a wave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimingMode {
    /// Every unit appears at the initial delay.
    Instant,
    /// Units appear one after another separated by a fixed delay.
    Sequential,
    /// Units appear in groups separated by a fixed delay.
    Burst,
    /// Units are spread evenly across the spawn duration.
    #[default]
    Gradual,
}

/// Pure function object computing per-unit spawn offsets.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnTiming {
    mode: TimingMode,
    spawn_delay: f32,
    burst_size: u32,
    burst_delay: f32,
    spawn_duration: f32,
    initial_delay: f32,
}

impl Default for SpawnTiming {
    fn default() -> Self {
        Self {
            mode: TimingMode::Gradual,
            spawn_delay: DEFAULT_SPAWN_DELAY,
            burst_size: DEFAULT_BURST_SIZE,
            burst_delay: DEFAULT_BURST_DELAY,
            spawn_duration: DEFAULT_SPAWN_DURATION,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl SpawnTiming {
    /// Every unit spawns at the initial delay.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            mode: TimingMode::Instant,
            ..Self::default()
        }
    }

    /// Units spawn `spawn_delay` seconds apart.
    #[must_use]
    pub fn sequential(spawn_delay: f32) -> Self {
        Self {
            mode: TimingMode::Sequential,
            spawn_delay: non_negative(spawn_delay),
            ..Self::default()
        }
    }

    /// Units spawn in groups of `burst_size`, `burst_delay` seconds apart.
    #[must_use]
    pub fn burst(burst_size: u32, burst_delay: f32) -> Self {
        Self {
            mode: TimingMode::Burst,
            burst_size: burst_size.max(1),
            burst_delay: non_negative(burst_delay),
            ..Self::default()
        }
    }

    /// Units are spread evenly across `spawn_duration` seconds.
    #[must_use]
    pub fn gradual(spawn_duration: f32) -> Self {
        Self {
            mode: TimingMode::Gradual,
            spawn_duration: non_negative(spawn_duration),
            ..Self::default()
        }
    }

    /// Replaces the delay before the first unit appears.
    #[must_use]
    pub fn with_initial_delay(mut self, initial_delay: f32) -> Self {
        self.initial_delay = non_negative(initial_delay);
        self
    }

    /// Active timing policy.
    #[must_use]
    pub const fn mode(&self) -> TimingMode {
        self.mode
    }

    /// Delay between sequential spawns in seconds.
    #[must_use]
    pub const fn spawn_delay(&self) -> f32 {
        self.spawn_delay
    }

    /// Number of units per burst.
    #[must_use]
    pub const fn burst_size(&self) -> u32 {
        self.burst_size
    }

    /// Delay between bursts in seconds.
    #[must_use]
    pub const fn burst_delay(&self) -> f32 {
        self.burst_delay
    }

    /// Window gradual spawns are spread across, in seconds.
    #[must_use]
    pub const fn spawn_duration(&self) -> f32 {
        self.spawn_duration
    }

    /// Delay before the first unit appears, in seconds.
    #[must_use]
    pub const fn initial_delay(&self) -> f32 {
        self.initial_delay
    }

    /// Seconds after wave start at which the unit at `index` of `total` appears.
    #[must_use]
    pub fn spawn_time_for(&self, index: u32, total: u32) -> f32 {
        match self.mode {
            TimingMode::Instant => self.initial_delay,
            TimingMode::Sequential => self.initial_delay + index as f32 * self.spawn_delay,
            TimingMode::Burst => {
                let group = index / self.burst_size.max(1);
                self.initial_delay + group as f32 * self.burst_delay
            }
            TimingMode::Gradual => {
                if total <= 1 {
                    return self.initial_delay;
                }
                let last = total - 1;
                let fraction = index.min(last) as f32 / last as f32;
                self.initial_delay + self.spawn_duration * fraction
            }
        }
    }

    /// Offset of the last of `total` units, or zero for an empty wave.
    #[must_use]
    pub fn total_duration(&self, total: u32) -> f32 {
        match total {
            0 => 0.0,
            _ => self.spawn_time_for(total - 1, total),
        }
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
