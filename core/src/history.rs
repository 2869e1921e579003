//! Records describing how factions performed during a wave.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{FactionId, WaveConfig};

/// Kills and damage attributed to a faction during one wave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FactionPerformance {
    /// Units of the wave killed by the faction.
    pub kills: u32,
    /// Total damage dealt by the faction.
    pub damage_dealt: f32,
}

/// Immutable snapshot of a finished wave.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveHistory {
    /// Wave the snapshot describes.
    pub wave_number: u32,
    /// Session clock reading, in seconds, when the wave finished.
    pub timestamp: f64,
    /// Seconds the wave ran for.
    pub duration: f32,
    /// Units scheduled to appear before the wave finished.
    pub units_spawned: u32,
    /// Units killed before the wave finished.
    pub units_killed: u32,
    /// Units still alive when the wave finished.
    pub units_survived: u32,
    /// Per-faction kills and damage.
    pub faction_performance: BTreeMap<FactionId, FactionPerformance>,
    /// Configuration that drove the wave.
    pub configuration: Arc<WaveConfig>,
    /// Whether the wave completed with every unit eliminated.
    pub was_successful: bool,
    /// Seed the wave was generated with.
    pub seed: u64,
}

impl WaveHistory {
    /// Fraction of spawned units that were killed, `0.0` when nothing spawned.
    #[must_use]
    pub fn kill_ratio(&self) -> f32 {
        if self.units_spawned == 0 {
            return 0.0;
        }
        self.units_killed as f32 / self.units_spawned as f32
    }
}
