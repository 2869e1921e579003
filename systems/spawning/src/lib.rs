#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Runtime tracker for the wave that is currently playing out.
//!
//! [`WaveProgress`] expands a [`WaveConfig`] into a time-sorted queue of
//! [`SpawnEvent`] values, releases them as simulated time advances, and keeps
//! the unit accounting that decides when the wave is over.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    sync::Arc,
};

use glam::Vec2;
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wave_forge_core::{
    FactionId, FactionPerformance, SpawnEvent, UnitId, UnitType, WaveConfig, WaveHistory,
};

/// Mutable state of the active wave.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveProgress {
    wave_number: u32,
    config: Arc<WaveConfig>,
    elapsed_time: f32,
    units_spawned: u32,
    units_killed: u32,
    total_units: u32,
    wave_complete: bool,
    active_unit_ids: BTreeSet<UnitId>,
    faction_performance: BTreeMap<FactionId, FactionPerformance>,
    spawn_queue: VecDeque<SpawnEvent>,
}

impl WaveProgress {
    /// Expands the configuration into a fresh spawn schedule.
    #[must_use]
    pub fn start_wave(config: Arc<WaveConfig>) -> Self {
        let spawn_queue = build_schedule(&config);
        let total_units = u32::try_from(spawn_queue.len()).unwrap_or(u32::MAX);
        debug!(
            wave_number = config.wave_number(),
            total_units, "expanded wave schedule"
        );

        let mut progress = Self {
            wave_number: config.wave_number(),
            config,
            elapsed_time: 0.0,
            units_spawned: 0,
            units_killed: 0,
            total_units,
            wave_complete: false,
            active_unit_ids: BTreeSet::new(),
            faction_performance: BTreeMap::new(),
            spawn_queue,
        };
        progress.check_completion();
        progress
    }

    /// Advances the wave clock and returns every spawn that became due.
    ///
    /// Events come back in schedule order. A large `delta` releases everything
    /// it covers in a single call.
    pub fn update(&mut self, delta: f32) -> Vec<SpawnEvent> {
        if delta.is_finite() && delta > 0.0 {
            self.elapsed_time += delta;
        }

        let mut due = Vec::new();
        while self
            .spawn_queue
            .front()
            .is_some_and(|event| event.spawn_time <= self.elapsed_time)
        {
            if let Some(event) = self.spawn_queue.pop_front() {
                due.push(event);
            }
        }
        self.units_spawned = self.total_units - self.queued_units();
        self.check_completion();
        due
    }

    /// Registers a unit created for one of the released spawn events.
    ///
    /// Returns `false` when the unit is already known or no released spawn is
    /// awaiting registration.
    pub fn unit_spawned(&mut self, unit: UnitId) -> bool {
        if self.active_unit_ids.contains(&unit) || self.unregistered_units() == 0 {
            debug!(unit = unit.get(), "ignored unit registration");
            return false;
        }
        self.active_unit_ids.insert(unit)
    }

    /// Records the death of a registered unit and credits the killer.
    ///
    /// Unknown identifiers are ignored. Returns whether the wave became
    /// complete as a result.
    pub fn unit_killed(&mut self, unit: UnitId, killer: &FactionId) -> bool {
        if !self.active_unit_ids.remove(&unit) {
            return false;
        }
        self.units_killed += 1;
        self.faction_performance
            .entry(killer.clone())
            .or_default()
            .kills += 1;
        let was_complete = self.wave_complete;
        self.check_completion();
        !was_complete && self.wave_complete
    }

    /// Credits damage to a faction. Non-positive or non-finite amounts are ignored.
    pub fn damage_dealt(&mut self, faction: &FactionId, amount: f32) {
        if !amount.is_finite() || amount <= 0.0 {
            return;
        }
        self.faction_performance
            .entry(faction.clone())
            .or_default()
            .damage_dealt += amount;
    }

    /// Snapshots the wave into an immutable history record.
    #[must_use]
    pub fn to_history(&self, timestamp: f64) -> WaveHistory {
        WaveHistory {
            wave_number: self.wave_number,
            timestamp,
            duration: self.elapsed_time,
            units_spawned: self.units_spawned,
            units_killed: self.units_killed,
            units_survived: self.units_remaining(),
            faction_performance: self.faction_performance.clone(),
            configuration: Arc::clone(&self.config),
            was_successful: self.wave_complete && self.units_remaining() == 0,
            seed: self.config.seed(),
        }
    }

    /// Wave this progress tracks.
    #[must_use]
    pub const fn wave_number(&self) -> u32 {
        self.wave_number
    }

    /// Configuration the schedule was built from.
    #[must_use]
    pub fn config(&self) -> &Arc<WaveConfig> {
        &self.config
    }

    /// Seconds simulated since the wave started.
    #[must_use]
    pub const fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    /// Spawn events released so far.
    #[must_use]
    pub const fn units_spawned(&self) -> u32 {
        self.units_spawned
    }

    /// Released units not yet killed.
    #[must_use]
    pub const fn units_remaining(&self) -> u32 {
        self.units_spawned - self.units_killed
    }

    /// Registered units that were killed.
    #[must_use]
    pub const fn units_killed(&self) -> u32 {
        self.units_killed
    }

    /// Number of units the wave schedules.
    #[must_use]
    pub const fn total_units(&self) -> u32 {
        self.total_units
    }

    /// Whether every unit was released and killed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.wave_complete
    }

    /// Identifiers of registered units still alive.
    #[must_use]
    pub fn active_unit_ids(&self) -> &BTreeSet<UnitId> {
        &self.active_unit_ids
    }

    /// Kills and damage per faction.
    #[must_use]
    pub fn faction_performance(&self) -> &BTreeMap<FactionId, FactionPerformance> {
        &self.faction_performance
    }

    /// Spawn events not yet released, soonest first.
    #[must_use]
    pub fn pending_spawns(&self) -> &VecDeque<SpawnEvent> {
        &self.spawn_queue
    }

    /// Whether every scheduled spawn has been released.
    #[must_use]
    pub fn all_spawns_released(&self) -> bool {
        self.spawn_queue.is_empty()
    }

    fn queued_units(&self) -> u32 {
        u32::try_from(self.spawn_queue.len()).unwrap_or(u32::MAX)
    }

    fn unregistered_units(&self) -> u32 {
        let registered = u32::try_from(self.active_unit_ids.len()).unwrap_or(u32::MAX);
        self.units_remaining().saturating_sub(registered)
    }

    fn check_completion(&mut self) {
        if !self.wave_complete && self.spawn_queue.is_empty() && self.units_remaining() == 0 {
            self.wave_complete = true;
            debug!(wave_number = self.wave_number, "wave progress complete");
        }
    }
}

fn build_schedule(config: &WaveConfig) -> VecDeque<SpawnEvent> {
    let mut counts = config.composition_counts();
    // The boss entry is always last and is kept out of the shuffle.
    let boss = match (config.is_boss_wave(), config.boss_unit_type()) {
        (true, Some(_)) => counts.pop().map(|(unit_type, _)| unit_type),
        _ => None,
    };

    let mut unit_types: Vec<UnitType> = Vec::new();
    for (unit_type, count) in counts {
        unit_types.extend(std::iter::repeat(unit_type).take(count as usize));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed());
    unit_types.shuffle(&mut rng);
    if let Some(boss) = boss {
        unit_types.push(boss);
    }

    let total = u32::try_from(unit_types.len()).unwrap_or(u32::MAX);
    let locations = config.spawn_locations();
    let timing = config.timing();
    let mut events: Vec<SpawnEvent> = unit_types
        .into_iter()
        .zip(0u32..)
        .map(|(unit_type, index)| SpawnEvent {
            unit_type,
            spawn_time: timing.spawn_time_for(index, total),
            spawn_location: location_for(locations, index),
            index,
        })
        .collect();
    events.sort_by(|a, b| a.spawn_time.total_cmp(&b.spawn_time));
    events.into()
}

fn location_for(locations: &[Vec2], index: u32) -> Vec2 {
    if locations.is_empty() {
        return Vec2::ZERO;
    }
    locations[index as usize % locations.len()]
}
