#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Lock-guarded store for the active wave and the finished-wave history.
//!
//! The tick owner mutates the store while other threads may read statistics
//! and history. Every public method takes the single lock for its whole body
//! and never calls back into another locking method.

mod statistics;

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wave_forge_core::{FactionId, SpawnEvent, UnitId, WaveConfig, WaveHistory};
use wave_forge_system_spawning::WaveProgress;

pub use statistics::WaveStatistics;

/// Number of history records retained by default.
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 50;

/// Serializable contents of a [`WaveStateManager`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateManagerState {
    /// Most recently started wave.
    pub current_wave: u32,
    /// Highest wave ever started.
    pub highest_wave: u32,
    /// Waves completed over the session.
    pub total_completed: u32,
    /// Number of history records retained.
    pub max_history_size: usize,
    /// Finished waves, most recent first.
    pub history: Vec<WaveHistory>,
    /// Wave currently playing out, if any.
    pub current_progress: Option<WaveProgress>,
}

impl Default for StateManagerState {
    fn default() -> Self {
        Self {
            current_wave: 0,
            highest_wave: 0,
            total_completed: 0,
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            history: Vec::new(),
            current_progress: None,
        }
    }
}

/// Cheap view of the active wave used by per-tick checks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressStatus {
    /// Wave being tracked.
    pub wave_number: u32,
    /// Seconds since the wave started.
    pub elapsed_time: f32,
    /// Whether every scheduled spawn was released.
    pub all_spawns_released: bool,
    /// Whether the wave is complete.
    pub is_complete: bool,
}

#[derive(Debug)]
struct Inner {
    current_wave: u32,
    highest_wave: u32,
    total_completed: u32,
    max_history_size: usize,
    history: VecDeque<WaveHistory>,
    current: Option<WaveProgress>,
}

impl Inner {
    fn from_state(state: StateManagerState) -> Self {
        let max_history_size = state.max_history_size.max(1);
        let mut history: VecDeque<WaveHistory> = state.history.into();
        history.truncate(max_history_size);
        Self {
            current_wave: state.current_wave,
            highest_wave: state.highest_wave,
            total_completed: state.total_completed,
            max_history_size,
            history,
            current: state.current_progress,
        }
    }
}

/// Thread-safe owner of the current [`WaveProgress`] and the history ring.
#[derive(Debug)]
pub struct WaveStateManager {
    inner: Mutex<Inner>,
}

impl Default for WaveStateManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_SIZE)
    }
}

impl WaveStateManager {
    /// Creates an empty manager retaining at most `max_history_size` records.
    #[must_use]
    pub fn new(max_history_size: usize) -> Self {
        Self::from_state(StateManagerState {
            max_history_size,
            ..StateManagerState::default()
        })
    }

    /// Rebuilds a manager from a snapshot.
    #[must_use]
    pub fn from_state(state: StateManagerState) -> Self {
        Self {
            inner: Mutex::new(Inner::from_state(state)),
        }
    }

    /// Replaces the active wave with a fresh progress built from `config`.
    pub fn start_wave(&self, config: Arc<WaveConfig>) -> WaveProgress {
        let mut inner = self.inner.lock();
        let progress = WaveProgress::start_wave(config);
        inner.current_wave = progress.wave_number();
        inner.highest_wave = inner.highest_wave.max(progress.wave_number());
        inner.current = Some(progress.clone());
        progress
    }

    /// Advances the active wave, returning the spawns that became due.
    pub fn advance(&self, delta: f32) -> Option<Vec<SpawnEvent>> {
        let mut inner = self.inner.lock();
        inner.current.as_mut().map(|progress| progress.update(delta))
    }

    /// Registers a unit with the active wave.
    pub fn unit_spawned(&self, unit: UnitId) -> bool {
        let mut inner = self.inner.lock();
        inner
            .current
            .as_mut()
            .is_some_and(|progress| progress.unit_spawned(unit))
    }

    /// Records a kill, returning whether the active wave just completed.
    pub fn unit_killed(&self, unit: UnitId, killer: &FactionId) -> bool {
        let mut inner = self.inner.lock();
        inner
            .current
            .as_mut()
            .is_some_and(|progress| progress.unit_killed(unit, killer))
    }

    /// Credits damage within the active wave.
    pub fn damage_dealt(&self, faction: &FactionId, amount: f32) {
        let mut inner = self.inner.lock();
        if let Some(progress) = inner.current.as_mut() {
            progress.damage_dealt(faction, amount);
        }
    }

    /// Converts the active wave into a history record.
    ///
    /// Returns `None` without an active wave.
    pub fn complete_wave(&self, timestamp: f64) -> Option<WaveHistory> {
        let mut inner = self.inner.lock();
        let Some(progress) = inner.current.take() else {
            debug!("complete_wave called without an active wave");
            return None;
        };

        let record = progress.to_history(timestamp);
        if record.was_successful {
            inner.total_completed += 1;
        }
        inner.history.push_front(record.clone());
        let max = inner.max_history_size;
        inner.history.truncate(max);
        info!(
            wave_number = record.wave_number,
            killed = record.units_killed,
            duration = record.duration,
            "wave recorded"
        );
        Some(record)
    }

    /// Drops the active wave without recording it.
    pub fn discard_current(&self) -> Option<WaveProgress> {
        self.inner.lock().current.take()
    }

    /// Copy of the active wave.
    #[must_use]
    pub fn current_progress(&self) -> Option<WaveProgress> {
        self.inner.lock().current.clone()
    }

    /// Summary of the active wave without copying its schedule.
    #[must_use]
    pub fn progress_status(&self) -> Option<ProgressStatus> {
        self.inner
            .lock()
            .current
            .as_ref()
            .map(|progress| ProgressStatus {
                wave_number: progress.wave_number(),
                elapsed_time: progress.elapsed_time(),
                all_spawns_released: progress.all_spawns_released(),
                is_complete: progress.is_complete(),
            })
    }

    /// Copy of the history, most recent first.
    #[must_use]
    pub fn history(&self) -> Vec<WaveHistory> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Aggregates across the retained history.
    #[must_use]
    pub fn statistics(&self) -> WaveStatistics {
        let inner = self.inner.lock();
        statistics::summarize(
            inner.history.iter(),
            inner.highest_wave,
            inner.total_completed,
        )
    }

    /// Most recently started wave.
    #[must_use]
    pub fn current_wave(&self) -> u32 {
        self.inner.lock().current_wave
    }

    /// Forgets the active wave, the history and the counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let max_history_size = inner.max_history_size;
        *inner = Inner::from_state(StateManagerState {
            max_history_size,
            ..StateManagerState::default()
        });
    }

    /// Captures the full contents for persistence.
    #[must_use]
    pub fn snapshot(&self) -> StateManagerState {
        let inner = self.inner.lock();
        StateManagerState {
            current_wave: inner.current_wave,
            highest_wave: inner.highest_wave,
            total_completed: inner.total_completed,
            max_history_size: inner.max_history_size,
            history: inner.history.iter().cloned().collect(),
            current_progress: inner.current.clone(),
        }
    }

    /// Replaces the contents with a snapshot.
    pub fn restore(&self, state: StateManagerState) {
        *self.inner.lock() = Inner::from_state(state);
    }
}
