use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wave_forge_core::{OrchestratorState, SpawnEvent, WaveConfig};
use wave_forge_system_analytics::StateManagerState;
use wave_forge_system_difficulty::DifficultyState;
use wave_forge_system_wave_generation::WaveQueueState;

use crate::{OrchestratorConfig, OrchestratorError};

/// Everything needed to resume an orchestrator exactly where it left off.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorSnapshot {
    /// State machine position.
    pub state: OrchestratorState,
    /// State to return to on resume.
    pub paused_from: Option<OrchestratorState>,
    /// Seconds left in the countdown.
    pub countdown_remaining: f32,
    /// Whole-second value of the last countdown tick emitted.
    pub last_countdown_second: Option<u32>,
    /// Tunables, including countdown duration and advance policy.
    pub config: OrchestratorConfig,
    /// Lookahead queue.
    pub wave_queue: WaveQueueState,
    /// Difficulty calculator.
    pub difficulty: DifficultyState,
    /// Active wave and history.
    pub state_manager: StateManagerState,
    /// Configuration of the wave counting down or running.
    pub current_config: Option<Arc<WaveConfig>>,
    /// Due spawns not yet requested.
    pub pending_spawns: Vec<SpawnEvent>,
    /// Simulated seconds since the session began.
    pub session_clock: f64,
    /// Message describing the current fault.
    pub error_message: Option<String>,
}

impl OrchestratorSnapshot {
    /// Serializes the snapshot into pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, OrchestratorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a snapshot previously produced by [`Self::to_json`].
    pub fn from_json(json: &str) -> Result<Self, OrchestratorError> {
        Ok(serde_json::from_str(json)?)
    }
}
