//! Immutable description of a single wave.

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{FactionId, SpawnTiming, UnitType};

/// Every wave whose number is a multiple of this interval is a boss wave.
pub const BOSS_WAVE_INTERVAL: u32 = 10;
/// Smallest supported difficulty multiplier.
pub const MIN_DIFFICULTY_MULTIPLIER: f32 = 0.1;
/// Largest supported difficulty multiplier.
pub const MAX_DIFFICULTY_MULTIPLIER: f32 = 10.0;
/// Most regular units a single wave spawns, after the difficulty multiplier.
pub const MAX_UNIT_COUNT: u32 = 10_000;

/// Reasons a [`WaveConfig`] fails validation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Waves are numbered from 1.
    #[error("wave number must be at least 1, got {0}")]
    InvalidWaveNumber(u32),
    /// The spawning faction is blank.
    #[error("wave {0} has no spawning faction")]
    EmptyFaction(u32),
    /// The wave would spawn nothing.
    #[error("wave {0} has no units to spawn")]
    NoUnits(u32),
    /// No unit types were provided.
    #[error("wave {0} has an empty unit composition")]
    EmptyComposition(u32),
    /// No positions to spawn at were provided.
    #[error("wave {0} has no spawn locations")]
    NoSpawnLocations(u32),
}

/// Configuration of one wave, shared read-only once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveConfig {
    wave_number: u32,
    faction: FactionId,
    base_unit_count: u32,
    composition: BTreeMap<UnitType, f32>,
    spawn_locations: Vec<Vec2>,
    timing: SpawnTiming,
    difficulty_multiplier: f32,
    seed: u64,
    modifiers: BTreeMap<String, f32>,
    is_boss_wave: bool,
    boss_unit_type: Option<UnitType>,
}

impl WaveConfig {
    /// Creates a configuration with default timing, no composition, and seed zero.
    #[must_use]
    pub fn new(wave_number: u32, faction: FactionId, base_unit_count: u32) -> Self {
        Self {
            wave_number,
            faction,
            base_unit_count,
            composition: BTreeMap::new(),
            spawn_locations: Vec::new(),
            timing: SpawnTiming::default(),
            difficulty_multiplier: 1.0,
            seed: 0,
            modifiers: BTreeMap::new(),
            is_boss_wave: wave_number > 0 && wave_number % BOSS_WAVE_INTERVAL == 0,
            boss_unit_type: None,
        }
    }

    /// Replaces the unit composition, normalising the fractions.
    #[must_use]
    pub fn with_composition<I, T>(mut self, composition: I) -> Self
    where
        I: IntoIterator<Item = (T, f32)>,
        T: Into<UnitType>,
    {
        self.set_composition(composition);
        self
    }

    /// Replaces the ordered spawn positions.
    #[must_use]
    pub fn with_spawn_locations(mut self, locations: Vec<Vec2>) -> Self {
        self.spawn_locations = locations;
        self
    }

    /// Replaces the timing policy.
    #[must_use]
    pub fn with_timing(mut self, timing: SpawnTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Replaces the difficulty multiplier, clamped to the supported range.
    #[must_use]
    pub fn with_difficulty_multiplier(mut self, multiplier: f32) -> Self {
        self.difficulty_multiplier = if multiplier.is_finite() {
            multiplier.clamp(MIN_DIFFICULTY_MULTIPLIER, MAX_DIFFICULTY_MULTIPLIER)
        } else {
            1.0
        };
        self
    }

    /// Overrides the deterministic seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets a named stat modifier.
    #[must_use]
    pub fn with_modifier(mut self, key: impl Into<String>, value: f32) -> Self {
        let _ = self.modifiers.insert(key.into(), value);
        self
    }

    /// Sets the unit type spawned once at the end of boss waves.
    #[must_use]
    pub fn with_boss_unit_type(mut self, unit_type: UnitType) -> Self {
        self.boss_unit_type = Some(unit_type);
        self
    }

    /// Replaces the unit composition so the fractions sum to one.
    ///
    /// Entries that are not finite and positive are dropped. When nothing
    /// remains the composition is left empty and fails validation.
    pub fn set_composition<I, T>(&mut self, composition: I)
    where
        I: IntoIterator<Item = (T, f32)>,
        T: Into<UnitType>,
    {
        let mut retained = BTreeMap::new();
        for (unit_type, fraction) in composition {
            if fraction.is_finite() && fraction > 0.0 {
                *retained.entry(unit_type.into()).or_insert(0.0) += fraction;
            }
        }

        let total: f32 = retained.values().sum();
        if total > 0.0 {
            for fraction in retained.values_mut() {
                *fraction /= total;
            }
        }
        self.composition = retained;
    }

    /// Sequential number of the wave, starting at 1.
    #[must_use]
    pub const fn wave_number(&self) -> u32 {
        self.wave_number
    }

    /// Faction the spawned units belong to.
    #[must_use]
    pub fn faction(&self) -> &FactionId {
        &self.faction
    }

    /// Unit count before the difficulty multiplier is applied.
    #[must_use]
    pub const fn base_unit_count(&self) -> u32 {
        self.base_unit_count
    }

    /// Number of regular units after the difficulty multiplier, capped at
    /// [`MAX_UNIT_COUNT`].
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        if self.base_unit_count == 0 {
            return 0;
        }
        let scaled = (self.base_unit_count as f32 * self.difficulty_multiplier).round();
        (scaled.min(MAX_UNIT_COUNT as f32) as u32).clamp(1, MAX_UNIT_COUNT)
    }

    /// Normalised fraction of units per unit type.
    #[must_use]
    pub fn composition(&self) -> &BTreeMap<UnitType, f32> {
        &self.composition
    }

    /// Ordered positions units spawn at.
    #[must_use]
    pub fn spawn_locations(&self) -> &[Vec2] {
        &self.spawn_locations
    }

    /// Timing policy spreading spawns across the wave.
    #[must_use]
    pub const fn timing(&self) -> &SpawnTiming {
        &self.timing
    }

    /// Multiplier applied to the base unit count.
    #[must_use]
    pub const fn difficulty_multiplier(&self) -> f32 {
        self.difficulty_multiplier
    }

    /// Deterministic seed for everything random about the wave.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Named stat modifiers applied to spawned units.
    #[must_use]
    pub fn modifiers(&self) -> &BTreeMap<String, f32> {
        &self.modifiers
    }

    /// Value of a named modifier, `1.0` when absent.
    #[must_use]
    pub fn modifier(&self, key: &str) -> f32 {
        self.modifiers.get(key).copied().unwrap_or(1.0)
    }

    /// Whether this is a boss wave.
    #[must_use]
    pub const fn is_boss_wave(&self) -> bool {
        self.is_boss_wave
    }

    /// Unit type spawned once at the end of a boss wave.
    #[must_use]
    pub fn boss_unit_type(&self) -> Option<&UnitType> {
        self.boss_unit_type.as_ref()
    }

    /// Splits [`Self::unit_count`] across unit types, plus the boss unit if any.
    ///
    /// Uses largest-remainder apportionment so regular counts always sum to
    /// [`Self::unit_count`]. Ties are resolved in unit-type order.
    #[must_use]
    pub fn composition_counts(&self) -> Vec<(UnitType, u32)> {
        let total = self.unit_count();
        let mut counts = Vec::with_capacity(self.composition.len() + 1);

        if total > 0 && !self.composition.is_empty() {
            let mut floors = Vec::with_capacity(self.composition.len());
            let mut remainders = Vec::with_capacity(self.composition.len());
            for fraction in self.composition.values() {
                let exact = fraction * total as f32;
                let floor = exact.floor();
                floors.push((floor as u32).min(total));
                remainders.push(exact - floor);
            }

            let assigned: u64 = floors.iter().map(|&count| u64::from(count)).sum();
            let mut order: Vec<usize> = (0..floors.len()).collect();
            order.sort_by(|&a, &b| remainders[b].total_cmp(&remainders[a]));
            if assigned <= u64::from(total) {
                let leftover = u64::from(total) - assigned;
                for slot in 0..leftover {
                    floors[order[(slot % order.len() as u64) as usize]] += 1;
                }
            } else {
                // Rounding overshoot comes off the smallest remainders first.
                let mut excess = assigned - u64::from(total);
                for &index in order.iter().rev() {
                    let taken = u64::from(floors[index]).min(excess);
                    floors[index] -= taken as u32;
                    excess -= taken;
                }
            }

            for (unit_type, count) in self.composition.keys().zip(floors) {
                if count > 0 {
                    counts.push((unit_type.clone(), count));
                }
            }
        }

        if self.is_boss_wave {
            if let Some(boss) = &self.boss_unit_type {
                counts.push((boss.clone(), 1));
            }
        }
        counts
    }

    /// Total number of units the wave spawns, boss included.
    #[must_use]
    pub fn total_units(&self) -> u32 {
        self.composition_counts().iter().map(|(_, count)| count).sum()
    }

    /// Checks the configuration can drive a wave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wave_number < 1 {
            return Err(ConfigError::InvalidWaveNumber(self.wave_number));
        }
        if self.faction.is_empty() {
            return Err(ConfigError::EmptyFaction(self.wave_number));
        }
        if self.unit_count() == 0 {
            return Err(ConfigError::NoUnits(self.wave_number));
        }
        if self.composition.is_empty() {
            return Err(ConfigError::EmptyComposition(self.wave_number));
        }
        if self.spawn_locations.is_empty() {
            return Err(ConfigError::NoSpawnLocations(self.wave_number));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_config(wave_number: u32, base: u32) -> WaveConfig {
        WaveConfig::new(wave_number, FactionId::new("horde"), base)
            .with_composition([("basic", 0.7), ("ranged", 0.2), ("heavy", 0.1)])
            .with_spawn_locations(vec![Vec2::ZERO])
    }

    #[test]
    fn composition_is_normalised_on_assignment() {
        let config = sample_config(1, 10).with_composition([("basic", 3.0), ("heavy", 1.0)]);
        let basic = config.composition()[&UnitType::new("basic")];
        let heavy = config.composition()[&UnitType::new("heavy")];
        assert!((basic - 0.75).abs() < 1e-6);
        assert!((heavy - 0.25).abs() < 1e-6);
    }

    #[test]
    fn non_positive_fractions_are_dropped() {
        let config =
            sample_config(1, 10).with_composition([("basic", 1.0), ("ghost", -1.0), ("void", 0.0)]);
        assert_eq!(config.composition().len(), 1);
    }

    #[test]
    fn counts_sum_to_unit_count() {
        let config = sample_config(3, 17)
            .with_composition([("basic", 1.0), ("ranged", 1.0), ("heavy", 1.0)]);
        let counts = config.composition_counts();
        let sum: u32 = counts.iter().map(|(_, count)| count).sum();
        assert_eq!(sum, 17);
        assert_eq!(counts[0], (UnitType::new("basic"), 6));
    }

    #[test]
    fn multiplier_scales_unit_count() {
        let config = sample_config(1, 10).with_difficulty_multiplier(1.5);
        assert_eq!(config.unit_count(), 15);
        let clamped = sample_config(1, 10).with_difficulty_multiplier(100.0);
        assert_eq!(clamped.difficulty_multiplier(), MAX_DIFFICULTY_MULTIPLIER);
    }

    #[test]
    fn oversized_waves_are_capped() {
        let config = WaveConfig::new(1, FactionId::new("horde"), u32::MAX)
            .with_composition([("basic", 0.5), ("heavy", 0.5)])
            .with_spawn_locations(vec![Vec2::ZERO]);
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.unit_count(), MAX_UNIT_COUNT);

        let counts = config.composition_counts();
        assert_eq!(
            counts,
            vec![
                (UnitType::new("basic"), MAX_UNIT_COUNT / 2),
                (UnitType::new("heavy"), MAX_UNIT_COUNT / 2),
            ]
        );
        assert_eq!(config.total_units(), MAX_UNIT_COUNT);

        let boosted = sample_config(1, MAX_UNIT_COUNT).with_difficulty_multiplier(10.0);
        assert_eq!(boosted.unit_count(), MAX_UNIT_COUNT);
    }

    #[test]
    fn boss_waves_add_a_boss_unit() {
        let config = sample_config(20, 10).with_boss_unit_type(UnitType::new("warlord"));
        assert!(config.is_boss_wave());
        assert_eq!(config.total_units(), 11);
        assert_eq!(
            config.composition_counts().last(),
            Some(&(UnitType::new("warlord"), 1))
        );

        let regular = sample_config(19, 10).with_boss_unit_type(UnitType::new("warlord"));
        assert!(!regular.is_boss_wave());
        assert_eq!(regular.total_units(), 10);
    }

    #[test]
    fn validation_reports_each_fault() {
        assert_eq!(
            sample_config(0, 10).validate(),
            Err(ConfigError::InvalidWaveNumber(0))
        );
        assert_eq!(
            WaveConfig::new(2, FactionId::new(""), 10)
                .with_composition([("basic", 1.0)])
                .with_spawn_locations(vec![Vec2::ZERO])
                .validate(),
            Err(ConfigError::EmptyFaction(2))
        );
        assert_eq!(sample_config(3, 0).validate(), Err(ConfigError::NoUnits(3)));
        assert_eq!(
            sample_config(4, 5)
                .with_composition(Vec::<(UnitType, f32)>::new())
                .validate(),
            Err(ConfigError::EmptyComposition(4))
        );
        assert_eq!(
            sample_config(5, 5).with_spawn_locations(Vec::new()).validate(),
            Err(ConfigError::NoSpawnLocations(5))
        );
        assert_eq!(sample_config(6, 5).validate(), Ok(()));
    }

    #[test]
    fn missing_modifier_defaults_to_one() {
        let config = sample_config(1, 5).with_modifier("health", 1.2);
        assert_eq!(config.modifier("health"), 1.2);
        assert_eq!(config.modifier("speed"), 1.0);
    }

    proptest! {
        #[test]
        fn normalised_composition_sums_to_one(
            fractions in proptest::collection::vec(0.001f32..1_000.0, 1..8)
        ) {
            let entries: Vec<(UnitType, f32)> = fractions
                .iter()
                .enumerate()
                .map(|(index, fraction)| (UnitType::new(format!("unit-{index}")), *fraction))
                .collect();
            let config = sample_config(1, 10).with_composition(entries);
            let sum: f32 = config.composition().values().sum();
            prop_assert!((sum - 1.0).abs() <= 0.001);
        }

        #[test]
        fn counts_always_match_unit_count(
            base in 1u32..500,
            weights in proptest::collection::vec(0.01f32..10.0, 1..6)
        ) {
            let entries: Vec<(UnitType, f32)> = weights
                .iter()
                .enumerate()
                .map(|(index, weight)| (UnitType::new(format!("unit-{index}")), *weight))
                .collect();
            let config = sample_config(1, base).with_composition(entries);
            let sum: u32 = config.composition_counts().iter().map(|(_, count)| count).sum();
            prop_assert_eq!(sum, config.unit_count());
        }
    }
}
