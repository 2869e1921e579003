//! Stand-in unit system that materialises spawn requests and kills units
//! after a fixed lifetime.

use std::time::Duration;

use tracing::{info, warn};
use wave_forge_core::{Command, Event, FactionId, OrchestratorState, UnitId, MODIFIER_HEALTH};
use wave_forge_orchestrator::{self as orchestrator, query, WaveOrchestrator};

const PLAYER_FACTION: &str = "player";
const BASE_UNIT_HEALTH: f32 = 100.0;

/// Totals gathered while driving the orchestrator.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct RunReport {
    pub(crate) ticks: u32,
    pub(crate) spawn_requests: u32,
    pub(crate) rejected_spawns: u32,
    pub(crate) waves_completed: u32,
    pub(crate) waves_failed: u32,
    pub(crate) performance_warnings: u32,
}

#[derive(Clone, Copy, Debug)]
struct LiveUnit {
    id: UnitId,
    age: u32,
    health: f32,
}

/// Registers every requested unit and kills it `lifetime` ticks later,
/// crediting the player faction with the kill and the unit's health as damage.
#[derive(Debug)]
pub(crate) struct Simulation {
    lifetime: u32,
    next_id: u64,
    player: FactionId,
    alive: Vec<LiveUnit>,
}

impl Simulation {
    pub(crate) fn new(lifetime: u32) -> Self {
        Self {
            lifetime: lifetime.max(1),
            next_id: 0,
            player: FactionId::new(PLAYER_FACTION),
            alive: Vec::new(),
        }
    }

    /// Takes over units a restored orchestrator is still waiting on.
    pub(crate) fn adopt(&mut self, orchestrator: &mut WaveOrchestrator) {
        let Some(progress) = query::current_progress(orchestrator) else {
            return;
        };
        for &id in progress.active_unit_ids() {
            self.next_id = self.next_id.max(id.get());
            self.alive.push(LiveUnit {
                id,
                age: 0,
                health: BASE_UNIT_HEALTH,
            });
        }

        // Deferred spawns count as released but still arrive as requests.
        let registered = progress.active_unit_ids().len() as u32 + progress.units_killed();
        let outstanding = progress.units_spawned().saturating_sub(registered);
        let deferred = query::pending_spawn_count(orchestrator) as u32;
        for _ in 0..outstanding.saturating_sub(deferred) {
            let id = self.allocate_id();
            if !orchestrator.on_unit_spawned(id) {
                warn!(unit = id.get(), "orchestrator rejected adopted unit");
                break;
            }
            self.alive.push(LiveUnit {
                id,
                age: 0,
                health: BASE_UNIT_HEALTH,
            });
        }
        info!(units = self.alive.len(), "adopted units from restored session");
    }

    pub(crate) fn run(
        &mut self,
        orchestrator: &mut WaveOrchestrator,
        ticks: u32,
        tick: Duration,
    ) -> RunReport {
        let mut report = RunReport::default();
        let mut events = Vec::new();

        if query::state(orchestrator) == OrchestratorState::Stopped {
            orchestrator::apply(orchestrator, Command::Start, &mut events);
        }

        for _ in 0..ticks {
            orchestrator::apply(orchestrator, Command::Tick { dt: tick }, &mut events);
            self.age_units(orchestrator, &mut events);
            for event in events.drain(..) {
                self.observe(orchestrator, event, &mut report);
            }
            report.ticks += 1;

            if query::state(orchestrator) == OrchestratorState::Error {
                warn!("orchestrator halted in error state");
                break;
            }
        }
        report
    }

    fn observe(
        &mut self,
        orchestrator: &mut WaveOrchestrator,
        event: Event,
        report: &mut RunReport,
    ) {
        match event {
            Event::SpawnRequested { modifiers, .. } => {
                report.spawn_requests += 1;
                let id = self.allocate_id();
                if !orchestrator.on_unit_spawned(id) {
                    report.rejected_spawns += 1;
                    warn!(unit = id.get(), "orchestrator rejected spawned unit");
                    return;
                }
                let scale = modifiers.get(MODIFIER_HEALTH).copied().unwrap_or(1.0);
                self.alive.push(LiveUnit {
                    id,
                    age: 0,
                    health: BASE_UNIT_HEALTH * scale,
                });
            }
            Event::WaveStarted { wave_number, config } => {
                info!(wave_number, units = config.total_units(), "wave underway");
            }
            Event::WaveCompleted { wave_number, history } => {
                report.waves_completed += 1;
                info!(
                    wave_number,
                    duration = history.duration,
                    killed = history.units_killed,
                    kill_ratio = history.kill_ratio(),
                    "wave cleared"
                );
            }
            Event::WaveFailed { wave_number, reason } => {
                report.waves_failed += 1;
                warn!(wave_number, %reason, "wave failed");
            }
            Event::PerformanceWarning { .. } => report.performance_warnings += 1,
            _ => {}
        }
    }

    fn age_units(&mut self, orchestrator: &mut WaveOrchestrator, events: &mut Vec<Event>) {
        let mut survivors = Vec::with_capacity(self.alive.len());
        for mut unit in std::mem::take(&mut self.alive) {
            unit.age += 1;
            if unit.age < self.lifetime {
                survivors.push(unit);
                continue;
            }
            orchestrator::apply(
                orchestrator,
                Command::ReportDamage {
                    faction: self.player.clone(),
                    amount: unit.health,
                },
                events,
            );
            orchestrator::apply(
                orchestrator,
                Command::ReportUnitKilled {
                    unit: unit.id,
                    killer: self.player.clone(),
                },
                events,
            );
        }
        self.alive = survivors;
    }

    fn allocate_id(&mut self) -> UnitId {
        self.next_id += 1;
        UnitId::new(self.next_id)
    }
}
