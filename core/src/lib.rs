#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Wave Forge orchestration engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative orchestrator, and pure systems. Adapters submit [`Command`]
//! values describing desired mutations, the orchestrator executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for gameplay and presentation collaborators to react to. The value types
//! describing a wave ([`WaveConfig`], [`SpawnTiming`], [`SpawnEvent`],
//! [`WaveHistory`]) live here so every system agrees on a single shape.

mod config;
mod history;
mod timing;

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use config::{
    ConfigError, WaveConfig, BOSS_WAVE_INTERVAL, MAX_DIFFICULTY_MULTIPLIER,
    MAX_UNIT_COUNT, MIN_DIFFICULTY_MULTIPLIER,
};
pub use history::{FactionPerformance, WaveHistory};
pub use timing::{SpawnTiming, TimingMode};

/// Modifier key scaling spawned unit health.
pub const MODIFIER_HEALTH: &str = "health";
/// Modifier key scaling spawned unit damage.
pub const MODIFIER_DAMAGE: &str = "damage";
/// Modifier key scaling spawned unit movement speed.
pub const MODIFIER_SPEED: &str = "speed";

/// Commands that express all permissible orchestrator mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the ordered list of positions enemies spawn at.
    ConfigureSpawnLocations {
        /// Spawn positions cycled round-robin by unit index.
        locations: Vec<Vec2>,
    },
    /// Changes the faction that spawned units belong to.
    ConfigureEnemyFaction {
        /// Faction assigned to every spawn request.
        faction: FactionId,
    },
    /// Changes the countdown that precedes each wave.
    ConfigureCountdown {
        /// Countdown length in seconds.
        duration: f32,
    },
    /// Selects the unit-count scaling curve.
    ConfigureDifficultyMode {
        /// Curve used for subsequent waves.
        mode: ScalingMode,
    },
    /// Changes the global difficulty multiplier applied after scaling.
    ConfigureDifficultyMultiplier {
        /// Requested multiplier, clamped to the supported range.
        multiplier: f32,
    },
    /// Begins the countdown for the next wave.
    Start,
    /// Halts the orchestrator and discards in-flight progress.
    Stop,
    /// Freezes the countdown and spawn clock.
    Pause,
    /// Restores the state that was active before pausing.
    Resume,
    /// Ends the current countdown immediately.
    SkipCountdown,
    /// Leaves the error state.
    ClearError,
    /// Forces the active wave to fail.
    FailWave {
        /// Human readable failure cause.
        reason: String,
    },
    /// Reports that the unit system materialised a requested unit.
    ReportUnitSpawned {
        /// Identifier assigned to the unit by the unit system.
        unit: UnitId,
    },
    /// Reports that a unit spawned during the active wave died.
    ReportUnitKilled {
        /// Identifier of the unit that died.
        unit: UnitId,
        /// Faction credited with the kill.
        killer: FactionId,
    },
    /// Reports damage dealt by a faction during the active wave.
    ReportDamage {
        /// Faction that dealt the damage.
        faction: FactionId,
        /// Amount of damage dealt.
        amount: f32,
    },
    /// Advances the orchestrator clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the orchestrator after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Announces that the countdown for a wave began.
    WaveStarting {
        /// Wave that will start once the countdown expires.
        wave_number: u32,
        /// Countdown length in seconds.
        countdown: f32,
    },
    /// Announces that a wave began spawning.
    WaveStarted {
        /// Wave that started.
        wave_number: u32,
        /// Configuration driving the wave.
        config: Arc<WaveConfig>,
    },
    /// Reports the remaining countdown whenever its whole-second value changes.
    CountdownTick {
        /// Remaining countdown in seconds.
        remaining: f32,
    },
    /// Requests that the unit system materialise an enemy.
    SpawnRequested {
        /// Wave the unit belongs to.
        wave_number: u32,
        /// Type of unit to create.
        unit_type: UnitType,
        /// Position to create the unit at.
        position: Vec2,
        /// Faction owning the unit.
        faction: FactionId,
        /// Stat modifiers to apply to the unit.
        modifiers: BTreeMap<String, f32>,
    },
    /// Announces that every unit of a wave was spawned and eliminated.
    WaveCompleted {
        /// Wave that completed.
        wave_number: u32,
        /// Snapshot of the completed wave.
        history: WaveHistory,
    },
    /// Announces that a wave was failed by an external collaborator.
    WaveFailed {
        /// Wave that failed.
        wave_number: u32,
        /// Human readable failure cause.
        reason: String,
    },
    /// Announces that the last living unit of a wave was killed.
    AllUnitsEliminated {
        /// Wave whose units were eliminated.
        wave_number: u32,
    },
    /// Reports that the orchestrator entered the error state.
    OrchestratorError {
        /// Description of the fault.
        message: String,
    },
    /// Advisory notice that a tick exceeded the frame budget.
    PerformanceWarning {
        /// Description of the overrun.
        message: String,
        /// Wall time spent in the offending tick.
        frame_time_ms: f32,
    },
    /// Announces a state machine transition.
    StateChanged {
        /// State before the transition.
        from: OrchestratorState,
        /// State after the transition.
        to: OrchestratorState,
    },
}

/// States of the wave orchestrator state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrchestratorState {
    /// Idle; configuration may be changed.
    #[default]
    Stopped,
    /// Counting down toward the next wave.
    Countdown,
    /// Units of the current wave are still scheduled to appear.
    Spawning,
    /// Every unit was scheduled; waiting for the survivors to be eliminated.
    Active,
    /// Frozen; remembers the state that was active before pausing.
    Paused,
    /// Halted by a fault until the error is cleared.
    Error,
}

impl OrchestratorState {
    /// Reports whether a wave is currently spawning or active.
    #[must_use]
    pub const fn is_wave_running(self) -> bool {
        matches!(self, Self::Spawning | Self::Active)
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Countdown => "countdown",
            Self::Spawning => "spawning",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Curves available for scaling unit counts across waves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalingMode {
    /// Adds a fixed number of units per wave.
    Linear,
    /// Multiplies the unit count by a constant growth factor per wave.
    #[default]
    Exponential,
    /// Exponential growth adjusted by recent player performance.
    Adaptive,
}

/// Unique identifier assigned to a unit by the external unit system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(u64);

impl UnitId {
    /// Creates a new unit identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Identifier of a side participating in combat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(String);

impl FactionId {
    /// Creates a faction identifier from the provided name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name of the faction.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reports whether the identifier is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for FactionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a unit archetype the unit system knows how to create.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitType(String);

impl UnitType {
    /// Creates a unit type from the provided name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name of the unit type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single scheduled unit appearance within a wave.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnEvent {
    /// Type of unit to create.
    pub unit_type: UnitType,
    /// Seconds after wave start at which the unit appears.
    pub spawn_time: f32,
    /// Position the unit appears at.
    pub spawn_location: Vec2,
    /// Position of the unit within the wave's spawn order.
    pub index: u32,
}
