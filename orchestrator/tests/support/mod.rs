#![allow(dead_code)]

use glam::Vec2;
use wave_forge_core::{Event, FactionId, ScalingMode, UnitId};
use wave_forge_orchestrator::{DifficultyConfig, OrchestratorConfig, WaveOrchestrator};

/// Configuration with a flat unit count and no frame-budget noise.
pub fn flat_config(units: f32) -> OrchestratorConfig {
    OrchestratorConfig {
        faction_seed: 42,
        countdown_duration: 3.0,
        frame_budget_ms: f32::MAX,
        spawn_locations: vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)],
        difficulty: DifficultyConfig {
            mode: ScalingMode::Linear,
            base_unit_count: units,
            linear_step: 0.0,
            ..DifficultyConfig::default()
        },
        ..OrchestratorConfig::default()
    }
}

pub fn spawn_requests(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, Event::SpawnRequested { .. }))
        .count()
}

/// Minimal unit system that registers every requested unit and kills it
/// after a fixed number of ticks.
#[derive(Clone, Debug)]
pub struct UnitSystem {
    next_id: u64,
    lifetime: u32,
    alive: Vec<(UnitId, u32)>,
}

impl UnitSystem {
    pub fn new(lifetime: u32) -> Self {
        Self {
            next_id: 0,
            lifetime: lifetime.max(1),
            alive: Vec::new(),
        }
    }

    pub fn step(&mut self, orchestrator: &mut WaveOrchestrator, delta: f32) -> Vec<Event> {
        let mut events = Vec::new();
        orchestrator.process(delta, &mut events);
        self.register(orchestrator, spawn_requests(&events));

        let player = FactionId::new("player");
        let mut survivors = Vec::new();
        for (unit, age) in std::mem::take(&mut self.alive) {
            if age + 1 >= self.lifetime {
                orchestrator.on_damage_dealt(&player, 25.0);
                orchestrator.on_unit_killed(unit, &player, &mut events);
            } else {
                survivors.push((unit, age + 1));
            }
        }
        self.alive = survivors;
        events
    }

    pub fn register(&mut self, orchestrator: &mut WaveOrchestrator, count: usize) {
        for _ in 0..count {
            self.next_id += 1;
            let unit = UnitId::new(self.next_id);
            if orchestrator.on_unit_spawned(unit) {
                self.alive.push((unit, 0));
            }
        }
    }

    pub fn kill_all(&mut self, orchestrator: &mut WaveOrchestrator, out: &mut Vec<Event>) {
        let player = FactionId::new("player");
        for (unit, _) in std::mem::take(&mut self.alive) {
            orchestrator.on_damage_dealt(&player, 25.0);
            orchestrator.on_unit_killed(unit, &player, out);
        }
    }
}
