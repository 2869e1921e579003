#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic lookahead queue of pre-generated wave configurations.
//!
//! Every wave is generated from a seed derived by hashing the faction seed
//! with the wave number, so a wave's configuration depends only on that pair
//! and the difficulty calculator. Refill order, skips, and save/load never
//! change what a given wave looks like.

use std::{collections::VecDeque, sync::Arc};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use wave_forge_core::{
    FactionId, SpawnTiming, UnitType, WaveConfig, MODIFIER_DAMAGE, MODIFIER_HEALTH,
    MODIFIER_SPEED,
};
use wave_forge_system_difficulty::{DifficultyCalculator, WaveParameters};

/// Number of configurations kept ahead of the current wave by default.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 5;
/// Unit types a boss wave draws its boss from.
pub const BOSS_UNIT_TYPES: [&str; 3] = ["brute", "warlord", "behemoth"];

const RNG_STREAM_GENERATION: &str = "wave-generation";
const MODIFIER_JITTER: f32 = 0.05;
const BOSS_BURST_SIZE: u32 = 5;
const BOSS_BURST_DELAY: f32 = 4.0;
const REGULAR_BURST_SIZE: u32 = 5;

/// Serializable state of a [`WaveQueue`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveQueueState {
    /// Most recently dequeued wave, `0` before the first.
    pub current_wave: u32,
    /// Wave number the next generated configuration receives.
    pub next_wave: u32,
    /// Root seed every wave seed is derived from.
    pub faction_seed: u64,
    /// Number of configurations kept ahead.
    pub max_queue_size: usize,
    /// Faction spawned units belong to.
    pub faction: FactionId,
    /// Ordered spawn positions handed to generated waves.
    pub spawn_locations: Vec<Vec2>,
    /// Pre-generated configurations, front first.
    pub queue: Vec<Arc<WaveConfig>>,
    /// Whether the queue was seeded.
    pub initialized: bool,
}

/// Lookahead buffer of pre-generated wave configurations.
#[derive(Clone, Debug)]
pub struct WaveQueue {
    faction_seed: u64,
    faction: FactionId,
    spawn_locations: Vec<Vec2>,
    max_queue_size: usize,
    current_wave: u32,
    next_wave: u32,
    queue: VecDeque<Arc<WaveConfig>>,
    initialized: bool,
}

impl WaveQueue {
    /// Creates an empty, unseeded queue for the provided faction.
    #[must_use]
    pub fn new(faction: FactionId, spawn_locations: Vec<Vec2>) -> Self {
        Self {
            faction_seed: 0,
            faction,
            spawn_locations,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            current_wave: 0,
            next_wave: 1,
            queue: VecDeque::with_capacity(DEFAULT_MAX_QUEUE_SIZE),
            initialized: false,
        }
    }

    /// Replaces the lookahead depth, which is at least one.
    #[must_use]
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size.max(1);
        self
    }

    /// Restores a queue from a saved state without regenerating anything.
    #[must_use]
    pub fn from_state(state: WaveQueueState) -> Self {
        Self {
            faction_seed: state.faction_seed,
            faction: state.faction,
            spawn_locations: state.spawn_locations,
            max_queue_size: state.max_queue_size.max(1),
            current_wave: state.current_wave,
            next_wave: state.next_wave.max(1),
            queue: state.queue.into_iter().collect(),
            initialized: state.initialized,
        }
    }

    /// Captures the queue for persistence.
    #[must_use]
    pub fn state(&self) -> WaveQueueState {
        WaveQueueState {
            current_wave: self.current_wave,
            next_wave: self.next_wave,
            faction_seed: self.faction_seed,
            max_queue_size: self.max_queue_size,
            faction: self.faction.clone(),
            spawn_locations: self.spawn_locations.clone(),
            queue: self.queue.iter().cloned().collect(),
            initialized: self.initialized,
        }
    }

    /// Seeds the queue and pre-fills it starting from wave 1.
    pub fn initialize(&mut self, faction_seed: u64, calculator: Option<&DifficultyCalculator>) {
        self.faction_seed = faction_seed;
        self.current_wave = 0;
        self.next_wave = 1;
        self.queue.clear();
        self.initialized = true;
        self.fill(calculator);
        info!(faction_seed, queued = self.queue.len(), "wave queue initialized");
    }

    /// Whether [`Self::initialize`] was called.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Removes the front configuration and refills the lookahead.
    pub fn dequeue(&mut self, calculator: Option<&DifficultyCalculator>) -> Option<Arc<WaveConfig>> {
        if self.queue.is_empty() {
            self.fill(calculator);
        }
        let config = self.queue.pop_front()?;
        self.current_wave = config.wave_number();
        self.fill(calculator);
        Some(config)
    }

    /// Front configuration without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&Arc<WaveConfig>> {
        self.queue.front()
    }

    /// Configuration at `index` positions behind the front.
    #[must_use]
    pub fn peek_at(&self, index: usize) -> Option<&Arc<WaveConfig>> {
        self.queue.get(index)
    }

    /// Queued configurations, front first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<WaveConfig>> {
        self.queue.iter()
    }

    /// Discards the lookahead and regenerates it starting at `wave_number`.
    pub fn skip_to_wave(&mut self, wave_number: u32, calculator: Option<&DifficultyCalculator>) {
        let wave_number = wave_number.max(1);
        self.queue.clear();
        self.current_wave = wave_number - 1;
        self.next_wave = wave_number;
        self.fill(calculator);
        info!(wave_number, "wave queue skipped ahead");
    }

    /// Regenerates every queued configuration, keeping the same wave numbers.
    pub fn refresh(&mut self, calculator: Option<&DifficultyCalculator>) {
        let first = self
            .queue
            .front()
            .map_or(self.next_wave, |config| config.wave_number());
        self.queue.clear();
        self.next_wave = first;
        self.fill(calculator);
    }

    /// Replaces the faction and drops the stale lookahead.
    pub fn set_faction(&mut self, faction: FactionId) {
        self.faction = faction;
        self.discard_lookahead();
    }

    /// Replaces the spawn positions and drops the stale lookahead.
    pub fn set_spawn_locations(&mut self, spawn_locations: Vec<Vec2>) {
        self.spawn_locations = spawn_locations;
        self.discard_lookahead();
    }

    /// Generates the configuration of `wave_number` without touching the queue.
    #[must_use]
    pub fn generate(
        &self,
        wave_number: u32,
        calculator: Option<&DifficultyCalculator>,
    ) -> WaveConfig {
        generate_wave(
            self.faction_seed,
            wave_number,
            &self.faction,
            &self.spawn_locations,
            calculator,
        )
    }

    /// Most recently dequeued wave, `0` before the first.
    #[must_use]
    pub const fn current_wave(&self) -> u32 {
        self.current_wave
    }

    /// Root seed every wave seed is derived from.
    #[must_use]
    pub const fn faction_seed(&self) -> u64 {
        self.faction_seed
    }

    /// Faction spawned units belong to.
    #[must_use]
    pub fn faction(&self) -> &FactionId {
        &self.faction
    }

    /// Ordered spawn positions handed to generated waves.
    #[must_use]
    pub fn spawn_locations(&self) -> &[Vec2] {
        &self.spawn_locations
    }

    /// Number of configurations kept ahead.
    #[must_use]
    pub const fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// Number of configurations currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn discard_lookahead(&mut self) {
        self.queue.clear();
        self.next_wave = self.current_wave.saturating_add(1);
    }

    fn fill(&mut self, calculator: Option<&DifficultyCalculator>) {
        while self.queue.len() < self.max_queue_size {
            let config = self.generate(self.next_wave, calculator);
            debug!(
                wave_number = config.wave_number(),
                units = config.total_units(),
                seed = config.seed(),
                "generated wave"
            );
            self.queue.push_back(Arc::new(config));
            self.next_wave = self.next_wave.saturating_add(1);
        }
    }
}

/// Deterministically generates one wave configuration.
///
/// Falls back to [`DifficultyCalculator::default`] when no calculator is provided.
#[must_use]
pub fn generate_wave(
    faction_seed: u64,
    wave_number: u32,
    faction: &FactionId,
    spawn_locations: &[Vec2],
    calculator: Option<&DifficultyCalculator>,
) -> WaveConfig {
    let fallback;
    let calculator = match calculator {
        Some(calculator) => calculator,
        None => {
            fallback = DifficultyCalculator::default();
            &fallback
        }
    };

    let seed = derive_wave_seed(faction_seed, wave_number);
    let mut rng = ChaCha8Rng::seed_from_u64(derive_labeled_seed(seed, RNG_STREAM_GENERATION));
    let parameters = calculator.calculate(wave_number, None);

    let timing = select_timing(&parameters, &mut rng);
    let health = parameters.health_multiplier * sample_jitter(&mut rng);
    let damage = parameters.damage_multiplier * sample_jitter(&mut rng);
    let speed = (parameters.speed_multiplier * sample_jitter(&mut rng))
        .min(calculator.tuning().max_speed_multiplier);

    let mut locations = spawn_locations.to_vec();
    if !locations.is_empty() {
        let offset = rng.gen_range(0..locations.len());
        locations.rotate_left(offset);
    }

    let mut config = WaveConfig::new(wave_number, faction.clone(), parameters.base_unit_count)
        .with_difficulty_multiplier(parameters.difficulty_multiplier)
        .with_composition(parameters.composition)
        .with_spawn_locations(locations)
        .with_timing(timing)
        .with_seed(seed)
        .with_modifier(MODIFIER_HEALTH, health)
        .with_modifier(MODIFIER_DAMAGE, damage)
        .with_modifier(MODIFIER_SPEED, speed);

    if parameters.is_boss_wave {
        let boss = BOSS_UNIT_TYPES[rng.gen_range(0..BOSS_UNIT_TYPES.len())];
        config = config.with_boss_unit_type(UnitType::new(boss));
    }
    config
}

/// Derives the seed of `wave_number` from the faction seed.
#[must_use]
pub fn derive_wave_seed(faction_seed: u64, wave_number: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(faction_seed.to_le_bytes());
    hasher.update(wave_number.to_le_bytes());
    finalize_seed(hasher)
}

fn derive_labeled_seed(base: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base.to_le_bytes());
    hasher.update(label.as_bytes());
    finalize_seed(hasher)
}

fn finalize_seed(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn select_timing(parameters: &WaveParameters, rng: &mut ChaCha8Rng) -> SpawnTiming {
    if parameters.is_boss_wave {
        return SpawnTiming::burst(BOSS_BURST_SIZE, BOSS_BURST_DELAY);
    }

    let units = parameters.unit_count.max(1) as f32;
    match rng.gen_range(0..10u32) {
        0..=5 => SpawnTiming::gradual(parameters.spawn_duration),
        6..=7 => SpawnTiming::sequential((parameters.spawn_duration / units).clamp(0.2, 2.0)),
        _ => {
            let bursts = (units / REGULAR_BURST_SIZE as f32).ceil().max(1.0);
            let delay = (parameters.spawn_duration / bursts).clamp(1.0, 8.0);
            SpawnTiming::burst(REGULAR_BURST_SIZE, delay)
        }
    }
}

fn sample_jitter(rng: &mut ChaCha8Rng) -> f32 {
    rng.gen_range((1.0 - MODIFIER_JITTER)..=(1.0 + MODIFIER_JITTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> WaveQueue {
        WaveQueue::new(
            FactionId::new("horde"),
            vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0)],
        )
    }

    #[test]
    fn wave_seeds_differ_per_wave_and_faction_seed() {
        assert_ne!(derive_wave_seed(42, 1), derive_wave_seed(42, 2));
        assert_ne!(derive_wave_seed(42, 1), derive_wave_seed(43, 1));
        assert_eq!(derive_wave_seed(42, 1), derive_wave_seed(42, 1));
    }

    #[test]
    fn initialize_prefills_lookahead() {
        let mut queue = queue();
        queue.initialize(42, None);
        assert_eq!(queue.len(), DEFAULT_MAX_QUEUE_SIZE);
        let numbers: Vec<u32> = queue.iter().map(|config| config.wave_number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn dequeue_advances_and_refills() {
        let mut queue = queue().with_max_queue_size(3);
        queue.initialize(7, None);
        let first = queue.dequeue(None).expect("first wave");
        assert_eq!(first.wave_number(), 1);
        assert_eq!(queue.current_wave(), 1);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek().map(|config| config.wave_number()), Some(2));
        assert_eq!(queue.peek_at(2).map(|config| config.wave_number()), Some(4));
        assert!(queue.peek_at(3).is_none());
    }

    #[test]
    fn generated_seed_matches_derivation() {
        let queue = queue();
        let config = queue.generate(3, None);
        assert_eq!(config.seed(), derive_wave_seed(queue.faction_seed(), 3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn boss_waves_receive_boss_unit_and_burst_timing() {
        let mut queue = queue();
        queue.initialize(99, None);
        let boss = queue.generate(10, None);
        assert!(boss.is_boss_wave());
        let boss_type = boss.boss_unit_type().expect("boss unit type");
        assert!(BOSS_UNIT_TYPES.contains(&boss_type.as_str()));
        assert_eq!(boss.timing().mode(), wave_forge_core::TimingMode::Burst);
    }

    #[test]
    fn changing_faction_discards_lookahead() {
        let mut queue = queue();
        queue.initialize(5, None);
        let _ = queue.dequeue(None);
        queue.set_faction(FactionId::new("swarm"));
        assert!(queue.is_empty());
        let next = queue.dequeue(None).expect("regenerated wave");
        assert_eq!(next.wave_number(), 2);
        assert_eq!(next.faction().as_str(), "swarm");
    }

    #[test]
    fn jittered_speed_never_exceeds_cap() {
        let queue = queue();
        for wave in 1..=60 {
            let config = queue.generate(wave, None);
            assert!(config.modifier(MODIFIER_SPEED) <= 1.5 + f32::EPSILON);
        }
    }
}
