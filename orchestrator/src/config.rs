use glam::Vec2;
use serde::{Deserialize, Serialize};
use wave_forge_core::{FactionId, ScalingMode};
use wave_forge_system_analytics::DEFAULT_MAX_HISTORY_SIZE;
use wave_forge_system_difficulty::{DifficultyCalculator, DifficultyTuning};
use wave_forge_system_wave_generation::DEFAULT_MAX_QUEUE_SIZE;

/// Faction seed used when none is configured.
pub const DEFAULT_FACTION_SEED: u64 = 0x7761_7665_666f_7267;
/// Seconds of countdown preceding each wave by default.
pub const DEFAULT_COUNTDOWN_DURATION: f32 = 10.0;
/// Spawn requests emitted per tick by default.
pub const DEFAULT_MAX_SPAWNS_PER_FRAME: usize = 10;
/// Per-tick wall time budget in milliseconds.
pub const DEFAULT_FRAME_BUDGET_MS: f32 = 2.0;

/// Every tunable of the wave orchestrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Root seed all wave seeds derive from.
    pub faction_seed: u64,
    /// Faction spawned units belong to.
    pub enemy_faction: FactionId,
    /// Ordered spawn positions.
    pub spawn_locations: Vec<Vec2>,
    /// Seconds of countdown preceding each wave.
    pub countdown_duration: f32,
    /// Whether a completed wave immediately counts down to the next one.
    pub auto_advance: bool,
    /// Whether the countdown may be skipped.
    pub skip_enabled: bool,
    /// Upper bound on spawn requests emitted per tick.
    pub max_spawns_per_frame: usize,
    /// Wall time per tick, in milliseconds, above which a warning is raised.
    pub frame_budget_ms: f32,
    /// Lookahead depth of the wave queue.
    pub max_queue_size: usize,
    /// Number of finished waves retained.
    pub max_history_size: usize,
    /// Seconds after which a running wave is failed, unlimited when absent.
    pub max_wave_duration: Option<f32>,
    /// Difficulty scaling settings.
    pub difficulty: DifficultyConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            faction_seed: DEFAULT_FACTION_SEED,
            enemy_faction: FactionId::new("enemy"),
            spawn_locations: vec![Vec2::ZERO],
            countdown_duration: DEFAULT_COUNTDOWN_DURATION,
            auto_advance: true,
            skip_enabled: true,
            max_spawns_per_frame: DEFAULT_MAX_SPAWNS_PER_FRAME,
            frame_budget_ms: DEFAULT_FRAME_BUDGET_MS,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            max_wave_duration: None,
            difficulty: DifficultyConfig::default(),
        }
    }
}

/// Difficulty scaling settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    /// Unit-count curve.
    pub mode: ScalingMode,
    /// Global multiplier applied after scaling.
    pub multiplier: f32,
    /// Success rate adaptive scaling steers toward.
    pub target_success_rate: f32,
    /// Unit count of the first wave.
    pub base_unit_count: f32,
    /// Per-wave growth factor of the exponential curve.
    pub growth_rate: f32,
    /// Units added per wave by the linear curve.
    pub linear_step: f32,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        let tuning = DifficultyTuning::default();
        let calculator = DifficultyCalculator::default();
        Self {
            mode: calculator.scaling_mode(),
            multiplier: calculator.multiplier(),
            target_success_rate: calculator.target_success_rate(),
            base_unit_count: tuning.base_unit_count,
            growth_rate: tuning.growth_rate,
            linear_step: tuning.linear_step,
        }
    }
}

impl DifficultyConfig {
    /// Builds a calculator judging success against `enemy`.
    #[must_use]
    pub fn build_calculator(&self, enemy: &FactionId) -> DifficultyCalculator {
        let mut calculator = DifficultyCalculator::new(DifficultyTuning {
            base_unit_count: self.base_unit_count,
            growth_rate: self.growth_rate,
            linear_step: self.linear_step,
            ..DifficultyTuning::default()
        });
        calculator.set_scaling_mode(self.mode);
        calculator.set_multiplier(self.multiplier);
        calculator.set_target_success_rate(self.target_success_rate);
        calculator.set_enemy_faction(enemy.clone());
        calculator
    }
}

/// Replaces non-finite or negative seconds with zero.
pub(crate) fn sanitize_seconds(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Replaces a NaN or negative frame budget with [`DEFAULT_FRAME_BUDGET_MS`].
pub(crate) fn sanitize_budget_ms(value: f32) -> f32 {
    if value.is_nan() || value < 0.0 {
        DEFAULT_FRAME_BUDGET_MS
    } else {
        value
    }
}
