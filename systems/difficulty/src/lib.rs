#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Difficulty curve mapping wave numbers and recent performance to wave parameters.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;
use wave_forge_core::{
    FactionId, FactionPerformance, ScalingMode, UnitType, BOSS_WAVE_INTERVAL,
    MAX_DIFFICULTY_MULTIPLIER, MAX_UNIT_COUNT, MIN_DIFFICULTY_MULTIPLIER,
};

/// Unit type forming the bulk of early waves.
pub const UNIT_TYPE_BASIC: &str = "basic";
/// Unit type that attacks from range.
pub const UNIT_TYPE_RANGED: &str = "ranged";
/// Unit type that fills the remainder of each wave's composition.
pub const UNIT_TYPE_HEAVY: &str = "heavy";

/// Maximum number of success-rate samples kept for adaptive scaling.
pub const PERFORMANCE_WINDOW: usize = 10;

const ADAPTIVE_BAND: f32 = 0.1;
const MAX_ADAPTIVE_SCALE: f32 = 2.0;
const MIN_ADAPTIVE_SCALE: f32 = 0.5;
const DEFAULT_TARGET_SUCCESS_RATE: f32 = 0.6;

/// Tuning knobs shaping the difficulty curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyTuning {
    /// Unit count of wave 1 before any scaling.
    pub base_unit_count: f32,
    /// Per-wave growth factor of the exponential curve.
    pub growth_rate: f32,
    /// Units added per wave by the linear curve.
    pub linear_step: f32,
    /// Ceiling of the unit count before the global multiplier.
    ///
    /// Values above [`MAX_UNIT_COUNT`] are treated as that limit.
    pub max_unit_count: u32,
    /// Health multiplier added per wave.
    pub health_growth: f32,
    /// Damage multiplier added per wave.
    pub damage_growth: f32,
    /// Speed multiplier added per wave.
    pub speed_growth: f32,
    /// Ceiling of the speed multiplier.
    pub max_speed_multiplier: f32,
    /// Basic unit fraction of wave 1.
    pub basic_start: f32,
    /// Basic unit fraction removed per wave.
    pub basic_decay: f32,
    /// Lowest basic unit fraction.
    pub basic_floor: f32,
    /// Ranged unit fraction of wave 1.
    pub ranged_start: f32,
    /// Ranged unit fraction added per wave.
    pub ranged_growth: f32,
    /// Highest ranged unit fraction.
    pub ranged_ceiling: f32,
    /// Spawn window of wave 1 in seconds.
    pub spawn_duration_base: f32,
    /// Seconds added to the spawn window per wave.
    pub spawn_duration_growth: f32,
    /// Longest spawn window in seconds.
    pub spawn_duration_max: f32,
}

impl Default for DifficultyTuning {
    fn default() -> Self {
        Self {
            base_unit_count: 10.0,
            growth_rate: 1.15,
            linear_step: 3.0,
            max_unit_count: MAX_UNIT_COUNT,
            health_growth: 0.05,
            damage_growth: 0.03,
            speed_growth: 0.02,
            max_speed_multiplier: 1.5,
            basic_start: 0.7,
            basic_decay: 0.02,
            basic_floor: 0.3,
            ranged_start: 0.2,
            ranged_growth: 0.01,
            ranged_ceiling: 0.4,
            spawn_duration_base: 20.0,
            spawn_duration_growth: 2.0,
            spawn_duration_max: 60.0,
        }
    }
}

/// Parameter bundle describing how hard a wave is.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveParameters {
    /// Wave the parameters were calculated for.
    pub wave_number: u32,
    /// Unit count after curve and adaptive scaling, before the global multiplier.
    pub base_unit_count: u32,
    /// Final unit count.
    pub unit_count: u32,
    /// Global multiplier applied last.
    pub difficulty_multiplier: f32,
    /// Health scalar for spawned units.
    pub health_multiplier: f32,
    /// Damage scalar for spawned units.
    pub damage_multiplier: f32,
    /// Speed scalar for spawned units.
    pub speed_multiplier: f32,
    /// Fraction of units per unit type, summing to one.
    pub composition: BTreeMap<UnitType, f32>,
    /// Window across which spawns are spread, in seconds.
    pub spawn_duration: f32,
    /// Whether the wave is a boss wave.
    pub is_boss_wave: bool,
}

/// Serializable state of a [`DifficultyCalculator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyState {
    /// Active scaling curve.
    pub scaling_mode: ScalingMode,
    /// Global difficulty multiplier.
    pub multiplier: f32,
    /// Rolling success-rate samples, oldest first.
    pub performance_history: Vec<f32>,
    /// Success rate adaptive scaling steers toward.
    pub target_success_rate: f32,
    /// Faction whose damage does not count toward player success.
    pub enemy_faction: FactionId,
    /// Curve tuning.
    pub tuning: DifficultyTuning,
}

/// Calculates wave parameters and tracks recent player performance.
#[derive(Clone, Debug)]
pub struct DifficultyCalculator {
    scaling_mode: ScalingMode,
    multiplier: f32,
    performance_history: VecDeque<f32>,
    target_success_rate: f32,
    enemy_faction: FactionId,
    tuning: DifficultyTuning,
}

impl Default for DifficultyCalculator {
    fn default() -> Self {
        Self::new(DifficultyTuning::default())
    }
}

impl DifficultyCalculator {
    /// Creates an exponential calculator with the provided tuning.
    #[must_use]
    pub fn new(tuning: DifficultyTuning) -> Self {
        Self {
            scaling_mode: ScalingMode::default(),
            multiplier: 1.0,
            performance_history: VecDeque::with_capacity(PERFORMANCE_WINDOW),
            target_success_rate: DEFAULT_TARGET_SUCCESS_RATE,
            enemy_faction: FactionId::new("enemy"),
            tuning,
        }
    }

    /// Restores a calculator from a saved state.
    #[must_use]
    pub fn from_state(state: DifficultyState) -> Self {
        let mut calculator = Self::new(state.tuning);
        calculator.scaling_mode = state.scaling_mode;
        calculator.set_multiplier(state.multiplier);
        calculator.set_target_success_rate(state.target_success_rate);
        calculator.enemy_faction = state.enemy_faction;
        let skip = state
            .performance_history
            .len()
            .saturating_sub(PERFORMANCE_WINDOW);
        calculator
            .performance_history
            .extend(state.performance_history.into_iter().skip(skip));
        calculator
    }

    /// Captures the calculator's state for persistence.
    #[must_use]
    pub fn state(&self) -> DifficultyState {
        DifficultyState {
            scaling_mode: self.scaling_mode,
            multiplier: self.multiplier,
            performance_history: self.performance_history.iter().copied().collect(),
            target_success_rate: self.target_success_rate,
            enemy_faction: self.enemy_faction.clone(),
            tuning: self.tuning.clone(),
        }
    }

    /// Active scaling curve.
    #[must_use]
    pub const fn scaling_mode(&self) -> ScalingMode {
        self.scaling_mode
    }

    /// Selects the scaling curve.
    pub fn set_scaling_mode(&mut self, mode: ScalingMode) {
        self.scaling_mode = mode;
    }

    /// Global difficulty multiplier.
    #[must_use]
    pub const fn multiplier(&self) -> f32 {
        self.multiplier
    }

    /// Sets the global difficulty multiplier, clamped to the supported range.
    pub fn set_multiplier(&mut self, multiplier: f32) {
        self.multiplier = if multiplier.is_finite() {
            multiplier.clamp(MIN_DIFFICULTY_MULTIPLIER, MAX_DIFFICULTY_MULTIPLIER)
        } else {
            1.0
        };
    }

    /// Success rate adaptive scaling steers toward.
    #[must_use]
    pub const fn target_success_rate(&self) -> f32 {
        self.target_success_rate
    }

    /// Sets the adaptive target, clamped to `[0, 1]`.
    pub fn set_target_success_rate(&mut self, target: f32) {
        self.target_success_rate = if target.is_finite() {
            target.clamp(0.0, 1.0)
        } else {
            DEFAULT_TARGET_SUCCESS_RATE
        };
    }

    /// Sets the faction whose damage counts against the player.
    pub fn set_enemy_faction(&mut self, faction: FactionId) {
        self.enemy_faction = faction;
    }

    /// Curve tuning.
    #[must_use]
    pub fn tuning(&self) -> &DifficultyTuning {
        &self.tuning
    }

    /// Rolling success-rate samples, oldest first.
    pub fn performance_history(&self) -> impl Iterator<Item = f32> + '_ {
        self.performance_history.iter().copied()
    }

    /// Average of the stored success-rate samples.
    #[must_use]
    pub fn rolling_success_rate(&self) -> Option<f32> {
        average(self.window(None))
    }

    /// Records the outcome of a finished wave.
    ///
    /// Returns the recorded sample, or `None` when no damage was dealt.
    pub fn record_wave(
        &mut self,
        performance: &BTreeMap<FactionId, FactionPerformance>,
    ) -> Option<f32> {
        let sample = success_rate(performance, &self.enemy_faction)?;
        if self.performance_history.len() == PERFORMANCE_WINDOW {
            let _ = self.performance_history.pop_front();
        }
        self.performance_history.push_back(sample);
        debug!(
            sample,
            window = self.performance_history.len(),
            "recorded wave success rate"
        );
        Some(sample)
    }

    /// Forgets every recorded sample.
    pub fn clear_history(&mut self) {
        self.performance_history.clear();
    }

    /// Unit-count scale derived from recent performance.
    ///
    /// `pending` is folded in as the newest sample without being stored.
    #[must_use]
    pub fn adaptive_scale(&self, pending: Option<f32>) -> f32 {
        let Some(rate) = average(self.window(pending)) else {
            return 1.0;
        };

        let upper = self.target_success_rate + ADAPTIVE_BAND;
        let lower = self.target_success_rate - ADAPTIVE_BAND;
        if rate > upper {
            let span = (1.0 - upper).max(f32::EPSILON);
            let progress = ((rate - upper) / span).clamp(0.0, 1.0);
            1.0 + (MAX_ADAPTIVE_SCALE - 1.0) * progress
        } else if rate < lower {
            let span = lower.max(f32::EPSILON);
            let progress = ((lower - rate) / span).clamp(0.0, 1.0);
            1.0 - (1.0 - MIN_ADAPTIVE_SCALE) * progress
        } else {
            1.0
        }
    }

    /// Calculates the parameters of `wave_number`.
    ///
    /// `performance`, when provided, is treated as the newest adaptive sample
    /// without being recorded, so repeated calls return identical results.
    #[must_use]
    pub fn calculate(
        &self,
        wave_number: u32,
        performance: Option<&BTreeMap<FactionId, FactionPerformance>>,
    ) -> WaveParameters {
        let wave_number = wave_number.max(1);
        let steps = (wave_number - 1) as f32;
        let tuning = &self.tuning;

        let curve = match self.scaling_mode {
            ScalingMode::Linear => tuning.base_unit_count + steps * tuning.linear_step,
            ScalingMode::Exponential | ScalingMode::Adaptive => {
                tuning.base_unit_count * tuning.growth_rate.powf(steps)
            }
        };
        let scale = match self.scaling_mode {
            ScalingMode::Adaptive => {
                let pending =
                    performance.and_then(|map| success_rate(map, &self.enemy_faction));
                self.adaptive_scale(pending)
            }
            ScalingMode::Linear | ScalingMode::Exponential => 1.0,
        };

        let ceiling = tuning.max_unit_count.clamp(1, MAX_UNIT_COUNT) as f32;
        let base_unit_count = ((curve * scale).round().clamp(1.0, ceiling) as u32).max(1);
        let scaled = (base_unit_count as f32 * self.multiplier).round();
        let unit_count = (scaled.min(MAX_UNIT_COUNT as f32) as u32).clamp(1, MAX_UNIT_COUNT);

        WaveParameters {
            wave_number,
            base_unit_count,
            unit_count,
            difficulty_multiplier: self.multiplier,
            health_multiplier: (1.0 + tuning.health_growth * steps) * self.multiplier,
            damage_multiplier: (1.0 + tuning.damage_growth * steps) * self.multiplier,
            speed_multiplier: (1.0 + tuning.speed_growth * steps).min(tuning.max_speed_multiplier),
            composition: self.composition_for(steps),
            spawn_duration: (tuning.spawn_duration_base + tuning.spawn_duration_growth * steps)
                .min(tuning.spawn_duration_max),
            is_boss_wave: wave_number % BOSS_WAVE_INTERVAL == 0,
        }
    }

    fn composition_for(&self, steps: f32) -> BTreeMap<UnitType, f32> {
        let tuning = &self.tuning;
        let basic = (tuning.basic_start - tuning.basic_decay * steps).max(tuning.basic_floor);
        let ranged = (tuning.ranged_start + tuning.ranged_growth * steps)
            .min(tuning.ranged_ceiling)
            .min(1.0 - basic);
        let heavy = (1.0 - basic - ranged).max(0.0);

        let mut composition = BTreeMap::new();
        let _ = composition.insert(UnitType::new(UNIT_TYPE_BASIC), basic);
        let _ = composition.insert(UnitType::new(UNIT_TYPE_RANGED), ranged);
        let _ = composition.insert(UnitType::new(UNIT_TYPE_HEAVY), heavy);
        composition
    }

    fn window(&self, pending: Option<f32>) -> impl Iterator<Item = f32> + '_ {
        let full = self.performance_history.len() == PERFORMANCE_WINDOW;
        let skip = usize::from(pending.is_some() && full);
        self.performance_history
            .iter()
            .copied()
            .skip(skip)
            .chain(pending)
    }
}

/// Share of the damage in `performance` dealt by factions other than `enemy`.
///
/// Returns `None` when no damage was dealt.
#[must_use]
pub fn success_rate(
    performance: &BTreeMap<FactionId, FactionPerformance>,
    enemy: &FactionId,
) -> Option<f32> {
    let mut total = 0.0;
    let mut player = 0.0;
    for (faction, record) in performance {
        let damage = record.damage_dealt;
        if !damage.is_finite() || damage <= 0.0 {
            continue;
        }
        total += damage;
        if faction != enemy {
            player += damage;
        }
    }

    if total <= 0.0 {
        None
    } else {
        Some(player / total)
    }
}

fn average(samples: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, count) = samples.fold((0.0, 0u32), |(sum, count), sample| (sum + sample, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f32)
    }
}
