#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Wave lifecycle state machine.
//!
//! The orchestrator counts down to each wave, starts it, releases its spawn
//! requests under a per-tick budget, detects completion, and advances to the
//! next wave. Mutations arrive either through the inherent methods or as
//! [`Command`] values handed to [`apply`]; outcomes are broadcast as [`Event`]
//! values appended to a caller-provided buffer.

mod config;
mod performance;
mod persistence;

use std::{collections::VecDeque, sync::Arc, time::Instant};

use glam::Vec2;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use wave_forge_core::{
    Command, ConfigError, Event, FactionId, OrchestratorState, ScalingMode, SpawnEvent, UnitId,
    WaveConfig,
};
use wave_forge_system_analytics::WaveStateManager;
use wave_forge_system_difficulty::DifficultyCalculator;
use wave_forge_system_wave_generation::WaveQueue;

pub use config::{
    DifficultyConfig, OrchestratorConfig, DEFAULT_COUNTDOWN_DURATION, DEFAULT_FACTION_SEED,
    DEFAULT_FRAME_BUDGET_MS, DEFAULT_MAX_SPAWNS_PER_FRAME,
};
pub use performance::FRAME_SAMPLE_WINDOW;
pub use persistence::OrchestratorSnapshot;

use config::{sanitize_budget_ms, sanitize_seconds};
use performance::FrameTimer;

/// Failure reason used when a wave outlives `max_wave_duration`.
pub const STALLED_WAVE_REASON: &str = "wave exceeded maximum duration";

/// Errors reported by the orchestrator's fallible operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Configuration may only change while the orchestrator is stopped.
    #[error("configuration can only change while the orchestrator is stopped")]
    NotStopped,
    /// The requested configuration cannot produce a valid wave.
    #[error("invalid wave configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    /// A snapshot could not be serialized or parsed.
    #[error("failed to persist orchestrator state: {0}")]
    Persistence(#[from] serde_json::Error),
}

/// Top-level wave state machine.
#[derive(Debug)]
pub struct WaveOrchestrator {
    config: OrchestratorConfig,
    state: OrchestratorState,
    paused_from: Option<OrchestratorState>,
    countdown_remaining: f32,
    last_countdown_second: Option<u32>,
    queue: WaveQueue,
    difficulty: DifficultyCalculator,
    state_manager: Arc<WaveStateManager>,
    current_config: Option<Arc<WaveConfig>>,
    pending_spawns: VecDeque<SpawnEvent>,
    session_clock: f64,
    error_message: Option<String>,
    frame_timer: FrameTimer,
}

impl Default for WaveOrchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl WaveOrchestrator {
    /// Creates a stopped orchestrator from the provided tunables.
    #[must_use]
    pub fn new(mut config: OrchestratorConfig) -> Self {
        config.countdown_duration = sanitize_seconds(config.countdown_duration);
        config.frame_budget_ms = sanitize_budget_ms(config.frame_budget_ms);
        let difficulty = config.difficulty.build_calculator(&config.enemy_faction);
        config.difficulty.multiplier = difficulty.multiplier();
        let queue = WaveQueue::new(config.enemy_faction.clone(), config.spawn_locations.clone())
            .with_max_queue_size(config.max_queue_size);
        let state_manager = Arc::new(WaveStateManager::new(config.max_history_size));
        let frame_timer = FrameTimer::new(config.frame_budget_ms);

        Self {
            config,
            state: OrchestratorState::Stopped,
            paused_from: None,
            countdown_remaining: 0.0,
            last_countdown_second: None,
            queue,
            difficulty,
            state_manager,
            current_config: None,
            pending_spawns: VecDeque::new(),
            session_clock: 0.0,
            error_message: None,
            frame_timer,
        }
    }

    /// Rebuilds an orchestrator that continues exactly where the snapshot left off.
    #[must_use]
    pub fn from_snapshot(snapshot: OrchestratorSnapshot) -> Self {
        let frame_timer = FrameTimer::new(snapshot.config.frame_budget_ms);
        Self {
            state: snapshot.state,
            paused_from: snapshot.paused_from,
            countdown_remaining: snapshot.countdown_remaining,
            last_countdown_second: snapshot.last_countdown_second,
            queue: WaveQueue::from_state(snapshot.wave_queue),
            difficulty: DifficultyCalculator::from_state(snapshot.difficulty),
            state_manager: Arc::new(WaveStateManager::from_state(snapshot.state_manager)),
            current_config: snapshot.current_config,
            pending_spawns: snapshot.pending_spawns.into(),
            session_clock: snapshot.session_clock,
            error_message: snapshot.error_message,
            config: snapshot.config,
            frame_timer,
        }
    }

    /// Captures the orchestrator for persistence.
    #[must_use]
    pub fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            state: self.state,
            paused_from: self.paused_from,
            countdown_remaining: self.countdown_remaining,
            last_countdown_second: self.last_countdown_second,
            config: self.config.clone(),
            wave_queue: self.queue.state(),
            difficulty: self.difficulty.state(),
            state_manager: self.state_manager.snapshot(),
            current_config: self.current_config.clone(),
            pending_spawns: self.pending_spawns.iter().cloned().collect(),
            session_clock: self.session_clock,
            error_message: self.error_message.clone(),
        }
    }

    /// Serializes the orchestrator into JSON.
    pub fn to_json(&self) -> Result<String, OrchestratorError> {
        self.snapshot().to_json()
    }

    /// Restores an orchestrator from JSON produced by [`Self::to_json`].
    pub fn from_json(json: &str) -> Result<Self, OrchestratorError> {
        Ok(Self::from_snapshot(OrchestratorSnapshot::from_json(json)?))
    }

    /// Replaces the spawn positions of future waves.
    pub fn set_spawn_locations(&mut self, locations: Vec<Vec2>) -> Result<(), OrchestratorError> {
        self.ensure_stopped()?;
        if locations.is_empty() {
            return Err(ConfigError::NoSpawnLocations(self.next_wave_number()).into());
        }
        self.config.spawn_locations = locations.clone();
        self.queue.set_spawn_locations(locations);
        self.regenerate_lookahead();
        Ok(())
    }

    /// Replaces the faction spawned units belong to.
    pub fn set_enemy_faction(&mut self, faction: FactionId) -> Result<(), OrchestratorError> {
        self.ensure_stopped()?;
        if faction.is_empty() {
            return Err(ConfigError::EmptyFaction(self.next_wave_number()).into());
        }
        self.config.enemy_faction = faction.clone();
        self.difficulty.set_enemy_faction(faction.clone());
        self.queue.set_faction(faction);
        self.regenerate_lookahead();
        Ok(())
    }

    /// Replaces the countdown preceding each wave.
    pub fn set_countdown_duration(&mut self, seconds: f32) -> Result<(), OrchestratorError> {
        self.ensure_stopped()?;
        self.config.countdown_duration = sanitize_seconds(seconds);
        Ok(())
    }

    /// Selects the unit-count curve of future waves.
    pub fn set_difficulty_mode(&mut self, mode: ScalingMode) -> Result<(), OrchestratorError> {
        self.ensure_stopped()?;
        self.difficulty.set_scaling_mode(mode);
        self.config.difficulty.mode = mode;
        self.regenerate_lookahead();
        Ok(())
    }

    /// Replaces the global difficulty multiplier of future waves.
    pub fn set_difficulty_multiplier(&mut self, multiplier: f32) -> Result<(), OrchestratorError> {
        self.ensure_stopped()?;
        self.difficulty.set_multiplier(multiplier);
        self.config.difficulty.multiplier = self.difficulty.multiplier();
        self.regenerate_lookahead();
        Ok(())
    }

    /// Begins the countdown of the next queued wave.
    pub fn start(&mut self, out: &mut Vec<Event>) {
        if self.state != OrchestratorState::Stopped {
            debug!(state = %self.state, "start ignored");
            return;
        }
        if !self.queue.is_initialized() {
            self.queue
                .initialize(self.config.faction_seed, Some(&self.difficulty));
        }
        self.begin_countdown(out);
    }

    /// Halts the orchestrator, discarding the in-flight wave.
    ///
    /// The interrupted wave is queued again so the next start retries it.
    pub fn stop(&mut self, out: &mut Vec<Event>) {
        if matches!(
            self.state,
            OrchestratorState::Stopped | OrchestratorState::Error
        ) {
            debug!(state = %self.state, "stop ignored");
            return;
        }
        let interrupted = self.abandon_current_wave();
        self.paused_from = None;
        info!(wave_number = ?interrupted, "orchestrator stopped");
        self.transition(OrchestratorState::Stopped, out);
    }

    /// Freezes the countdown and spawn clock.
    pub fn pause(&mut self, out: &mut Vec<Event>) {
        match self.state {
            OrchestratorState::Stopped
            | OrchestratorState::Countdown
            | OrchestratorState::Spawning
            | OrchestratorState::Active => {
                self.paused_from = Some(self.state);
                self.transition(OrchestratorState::Paused, out);
            }
            OrchestratorState::Paused | OrchestratorState::Error => {
                debug!(state = %self.state, "pause ignored");
            }
        }
    }

    /// Returns to the state that was active before pausing.
    pub fn resume(&mut self, out: &mut Vec<Event>) {
        if self.state != OrchestratorState::Paused {
            debug!(state = %self.state, "resume ignored");
            return;
        }
        let previous = self.paused_from.take().unwrap_or_default();
        self.transition(previous, out);
    }

    /// Ends the countdown immediately when skipping is enabled.
    pub fn skip_countdown(&mut self, out: &mut Vec<Event>) {
        if self.state != OrchestratorState::Countdown || !self.config.skip_enabled {
            debug!(
                state = %self.state,
                skip_enabled = self.config.skip_enabled,
                "skip countdown ignored"
            );
            return;
        }
        self.countdown_remaining = 0.0;
        self.begin_wave(out);
    }

    /// Leaves the error state.
    pub fn clear_error(&mut self, out: &mut Vec<Event>) {
        if self.state != OrchestratorState::Error {
            debug!(state = %self.state, "clear error ignored");
            return;
        }
        self.error_message = None;
        self.transition(OrchestratorState::Stopped, out);
    }

    /// Fails the current wave and stops.
    ///
    /// The failed wave is queued again so the next start retries it.
    pub fn fail_wave(&mut self, reason: impl Into<String>, out: &mut Vec<Event>) {
        let reason = reason.into();
        let Some(wave_number) = self.abandon_current_wave() else {
            debug!(%reason, "fail wave ignored without a current wave");
            return;
        };
        self.paused_from = None;
        warn!(wave_number, %reason, "wave failed");
        out.push(Event::WaveFailed {
            wave_number,
            reason,
        });
        self.transition(OrchestratorState::Stopped, out);
    }

    /// Registers a unit the unit system created for a spawn request.
    pub fn on_unit_spawned(&mut self, unit: UnitId) -> bool {
        self.state_manager.unit_spawned(unit)
    }

    /// Records the death of a unit, completing the wave when it was the last.
    pub fn on_unit_killed(&mut self, unit: UnitId, killer: &FactionId, out: &mut Vec<Event>) {
        let completed = self.state_manager.unit_killed(unit, killer);
        if completed && self.state.is_wave_running() {
            self.settle_wave(out);
        }
    }

    /// Credits damage dealt during the current wave.
    pub fn on_damage_dealt(&mut self, faction: &FactionId, amount: f32) {
        self.state_manager.damage_dealt(faction, amount);
    }

    /// Advances the orchestrator by `delta` seconds of simulated time.
    pub fn process(&mut self, delta: f32, out: &mut Vec<Event>) {
        let started = Instant::now();
        let delta = sanitize_seconds(delta);

        match self.state {
            OrchestratorState::Stopped | OrchestratorState::Paused | OrchestratorState::Error => {}
            OrchestratorState::Countdown => {
                self.session_clock += f64::from(delta);
                self.tick_countdown(delta, out);
            }
            OrchestratorState::Spawning | OrchestratorState::Active => {
                self.session_clock += f64::from(delta);
                self.tick_wave(delta, out);
            }
        }

        let frame_time_ms = started.elapsed().as_secs_f32() * 1_000.0;
        self.record_frame_time(frame_time_ms, out);
    }

    /// Adds a tick duration to the rolling window, warning when over budget.
    fn record_frame_time(&mut self, frame_time_ms: f32, out: &mut Vec<Event>) {
        if !self.frame_timer.record(frame_time_ms) {
            return;
        }
        let budget_ms = self.frame_timer.budget_ms();
        warn!(frame_time_ms, budget_ms, "tick exceeded frame budget");
        out.push(Event::PerformanceWarning {
            message: format!("tick took {frame_time_ms:.3} ms, budget is {budget_ms:.3} ms"),
            frame_time_ms,
        });
    }

    fn ensure_stopped(&self) -> Result<(), OrchestratorError> {
        if self.state == OrchestratorState::Stopped {
            Ok(())
        } else {
            Err(OrchestratorError::NotStopped)
        }
    }

    fn next_wave_number(&self) -> u32 {
        self.queue.current_wave().saturating_add(1)
    }

    fn regenerate_lookahead(&mut self) {
        if self.queue.is_initialized() {
            self.queue.refresh(Some(&self.difficulty));
        }
    }

    fn transition(&mut self, to: OrchestratorState, out: &mut Vec<Event>) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!(%from, %to, "orchestrator state changed");
        out.push(Event::StateChanged { from, to });
    }

    fn begin_countdown(&mut self, out: &mut Vec<Event>) {
        let Some(config) = self.queue.dequeue(Some(&self.difficulty)) else {
            self.enter_error("no wave configuration available".to_owned(), out);
            return;
        };
        let wave_number = config.wave_number();
        self.current_config = Some(Arc::clone(&config));
        if let Err(error) = config.validate() {
            self.enter_error(format!("wave {wave_number} cannot start: {error}"), out);
            return;
        }

        let countdown = self.config.countdown_duration;
        self.countdown_remaining = countdown;
        self.last_countdown_second = Some(whole_seconds(countdown));
        self.transition(OrchestratorState::Countdown, out);
        info!(wave_number, countdown, "wave countdown started");
        out.push(Event::WaveStarting {
            wave_number,
            countdown,
        });
    }

    fn tick_countdown(&mut self, delta: f32, out: &mut Vec<Event>) {
        self.countdown_remaining = (self.countdown_remaining - delta).max(0.0);
        let second = whole_seconds(self.countdown_remaining);
        if self.last_countdown_second != Some(second) {
            self.last_countdown_second = Some(second);
            out.push(Event::CountdownTick {
                remaining: self.countdown_remaining,
            });
        }
        if self.countdown_remaining <= 0.0 {
            self.begin_wave(out);
        }
    }

    fn begin_wave(&mut self, out: &mut Vec<Event>) {
        let Some(config) = self.current_config.clone() else {
            self.enter_error("countdown finished without a wave configuration".to_owned(), out);
            return;
        };
        self.countdown_remaining = 0.0;
        self.last_countdown_second = None;
        self.pending_spawns.clear();

        let progress = self.state_manager.start_wave(Arc::clone(&config));
        let wave_number = config.wave_number();
        self.transition(OrchestratorState::Spawning, out);
        info!(
            wave_number,
            units = progress.total_units(),
            boss = config.is_boss_wave(),
            "wave started"
        );
        out.push(Event::WaveStarted {
            wave_number,
            config,
        });
    }

    fn tick_wave(&mut self, delta: f32, out: &mut Vec<Event>) {
        let Some(due) = self.state_manager.advance(delta) else {
            self.enter_error(format!("{} state reached without an active wave", self.state), out);
            return;
        };
        self.pending_spawns.extend(due);
        self.flush_spawns(out);
        self.settle_wave(out);
    }

    fn flush_spawns(&mut self, out: &mut Vec<Event>) {
        let Some(config) = self.current_config.as_ref() else {
            return;
        };
        let batch = self
            .config
            .max_spawns_per_frame
            .max(1)
            .min(self.pending_spawns.len());
        for spawn in self.pending_spawns.drain(..batch) {
            out.push(Event::SpawnRequested {
                wave_number: config.wave_number(),
                unit_type: spawn.unit_type,
                position: spawn.spawn_location,
                faction: config.faction().clone(),
                modifiers: config.modifiers().clone(),
            });
        }
        if !self.pending_spawns.is_empty() {
            debug!(
                deferred = self.pending_spawns.len(),
                "spawn requests deferred to next tick"
            );
        }
    }

    fn settle_wave(&mut self, out: &mut Vec<Event>) {
        let Some(status) = self.state_manager.progress_status() else {
            return;
        };
        if self.state == OrchestratorState::Spawning && status.all_spawns_released {
            self.transition(OrchestratorState::Active, out);
        }
        if status.is_complete && self.pending_spawns.is_empty() {
            self.complete_wave(out);
            return;
        }
        if let Some(limit) = self.config.max_wave_duration {
            if status.elapsed_time > limit {
                self.fail_wave(STALLED_WAVE_REASON, out);
            }
        }
    }

    fn complete_wave(&mut self, out: &mut Vec<Event>) {
        let Some(history) = self.state_manager.complete_wave(self.session_clock) else {
            self.enter_error("wave completed without an active wave".to_owned(), out);
            return;
        };
        let wave_number = history.wave_number;
        out.push(Event::AllUnitsEliminated { wave_number });

        let success_rate = self.difficulty.record_wave(&history.faction_performance);
        if self.difficulty.scaling_mode() == ScalingMode::Adaptive {
            self.queue.refresh(Some(&self.difficulty));
        }
        info!(
            wave_number,
            duration = history.duration,
            success_rate = ?success_rate,
            "wave completed"
        );
        out.push(Event::WaveCompleted {
            wave_number,
            history,
        });

        self.current_config = None;
        if self.config.auto_advance {
            self.begin_countdown(out);
        } else {
            self.transition(OrchestratorState::Stopped, out);
        }
    }

    fn abandon_current_wave(&mut self) -> Option<u32> {
        let _ = self.state_manager.discard_current();
        self.pending_spawns.clear();
        self.countdown_remaining = 0.0;
        self.last_countdown_second = None;
        let config = self.current_config.take()?;
        let wave_number = config.wave_number();
        self.queue.skip_to_wave(wave_number, Some(&self.difficulty));
        Some(wave_number)
    }

    fn enter_error(&mut self, message: String, out: &mut Vec<Event>) {
        error!(%message, "orchestrator entered error state");
        let _ = self.abandon_current_wave();
        self.paused_from = None;
        self.error_message = Some(message.clone());
        out.push(Event::OrchestratorError { message });
        self.transition(OrchestratorState::Error, out);
    }
}

fn whole_seconds(seconds: f32) -> u32 {
    seconds.ceil() as u32
}

/// Applies the provided command to the orchestrator.
///
/// Rejected configuration commands are logged and otherwise ignored.
pub fn apply(orchestrator: &mut WaveOrchestrator, command: Command, out: &mut Vec<Event>) {
    let outcome = match command {
        Command::ConfigureSpawnLocations { locations } => {
            orchestrator.set_spawn_locations(locations)
        }
        Command::ConfigureEnemyFaction { faction } => orchestrator.set_enemy_faction(faction),
        Command::ConfigureCountdown { duration } => orchestrator.set_countdown_duration(duration),
        Command::ConfigureDifficultyMode { mode } => orchestrator.set_difficulty_mode(mode),
        Command::ConfigureDifficultyMultiplier { multiplier } => {
            orchestrator.set_difficulty_multiplier(multiplier)
        }
        Command::Start => {
            orchestrator.start(out);
            Ok(())
        }
        Command::Stop => {
            orchestrator.stop(out);
            Ok(())
        }
        Command::Pause => {
            orchestrator.pause(out);
            Ok(())
        }
        Command::Resume => {
            orchestrator.resume(out);
            Ok(())
        }
        Command::SkipCountdown => {
            orchestrator.skip_countdown(out);
            Ok(())
        }
        Command::ClearError => {
            orchestrator.clear_error(out);
            Ok(())
        }
        Command::FailWave { reason } => {
            orchestrator.fail_wave(reason, out);
            Ok(())
        }
        Command::ReportUnitSpawned { unit } => {
            let _ = orchestrator.on_unit_spawned(unit);
            Ok(())
        }
        Command::ReportUnitKilled { unit, killer } => {
            orchestrator.on_unit_killed(unit, &killer, out);
            Ok(())
        }
        Command::ReportDamage { faction, amount } => {
            orchestrator.on_damage_dealt(&faction, amount);
            Ok(())
        }
        Command::Tick { dt } => {
            orchestrator.process(dt.as_secs_f32(), out);
            Ok(())
        }
    };

    if let Err(error) = outcome {
        warn!(%error, "configuration command rejected");
    }
}

/// Query functions that provide read-only access to the orchestrator.
pub mod query {
    use std::sync::Arc;

    use super::{OrchestratorConfig, WaveOrchestrator};
    use wave_forge_core::{OrchestratorState, WaveConfig, WaveHistory};
    use wave_forge_system_analytics::{WaveStateManager, WaveStatistics};
    use wave_forge_system_spawning::WaveProgress;

    /// Current state machine position.
    #[must_use]
    pub fn state(orchestrator: &WaveOrchestrator) -> OrchestratorState {
        orchestrator.state
    }

    /// Wave counting down or running, otherwise the last one dequeued.
    #[must_use]
    pub fn current_wave_number(orchestrator: &WaveOrchestrator) -> u32 {
        orchestrator
            .current_config
            .as_ref()
            .map_or(orchestrator.queue.current_wave(), |config| {
                config.wave_number()
            })
    }

    /// Seconds left in the countdown.
    #[must_use]
    pub fn countdown_remaining(orchestrator: &WaveOrchestrator) -> f32 {
        orchestrator.countdown_remaining
    }

    /// Configuration of the wave counting down or running.
    #[must_use]
    pub fn current_config(orchestrator: &WaveOrchestrator) -> Option<&Arc<WaveConfig>> {
        orchestrator.current_config.as_ref()
    }

    /// Copy of the running wave's progress.
    #[must_use]
    pub fn current_progress(orchestrator: &WaveOrchestrator) -> Option<WaveProgress> {
        orchestrator.state_manager.current_progress()
    }

    /// Pre-generated configurations waiting in the queue, soonest first.
    #[must_use]
    pub fn upcoming_waves(orchestrator: &WaveOrchestrator) -> Vec<Arc<WaveConfig>> {
        orchestrator.queue.iter().cloned().collect()
    }

    /// Aggregates across the retained history.
    #[must_use]
    pub fn statistics(orchestrator: &WaveOrchestrator) -> WaveStatistics {
        orchestrator.state_manager.statistics()
    }

    /// Finished waves, most recent first.
    #[must_use]
    pub fn history(orchestrator: &WaveOrchestrator) -> Vec<WaveHistory> {
        orchestrator.state_manager.history()
    }

    /// Mean wall time of the recent ticks in milliseconds.
    #[must_use]
    pub fn frame_time_average_ms(orchestrator: &WaveOrchestrator) -> Option<f32> {
        orchestrator.frame_timer.average_ms()
    }

    /// Description of the current fault.
    #[must_use]
    pub fn error_message(orchestrator: &WaveOrchestrator) -> Option<&str> {
        orchestrator.error_message.as_deref()
    }

    /// Due spawns held back by the per-tick budget.
    #[must_use]
    pub fn pending_spawn_count(orchestrator: &WaveOrchestrator) -> usize {
        orchestrator.pending_spawns.len()
    }

    /// Shared handle to the wave store for readers on other threads.
    #[must_use]
    pub fn state_manager(orchestrator: &WaveOrchestrator) -> Arc<WaveStateManager> {
        Arc::clone(&orchestrator.state_manager)
    }

    /// Tunables currently in effect.
    #[must_use]
    pub fn config(orchestrator: &WaveOrchestrator) -> &OrchestratorConfig {
        &orchestrator.config
    }

    /// Simulated seconds spent counting down or running waves.
    #[must_use]
    pub fn session_clock(orchestrator: &WaveOrchestrator) -> f64 {
        orchestrator.session_clock
    }
}
