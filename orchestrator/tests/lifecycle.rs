mod support;

use std::{sync::Arc, thread, time::Duration};

use glam::Vec2;
use wave_forge_core::{Command, ConfigError, Event, FactionId, OrchestratorState};
use wave_forge_orchestrator::{
    self as orchestrator, query, OrchestratorConfig, OrchestratorError, WaveOrchestrator,
    STALLED_WAVE_REASON,
};
use wave_forge_system_spawning::WaveProgress;

use support::{flat_config, spawn_requests, UnitSystem};

fn started(config: OrchestratorConfig) -> WaveOrchestrator {
    let mut orchestrator = WaveOrchestrator::new(config);
    let mut events = Vec::new();
    orchestrator.start(&mut events);
    orchestrator.skip_countdown(&mut events);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Spawning);
    orchestrator
}

#[test]
fn countdown_ticks_on_whole_seconds_then_starts_the_wave() {
    let mut orchestrator = WaveOrchestrator::new(flat_config(6.0));
    let mut events = Vec::new();
    orchestrator.start(&mut events);
    assert_eq!(
        events,
        vec![
            Event::StateChanged {
                from: OrchestratorState::Stopped,
                to: OrchestratorState::Countdown,
            },
            Event::WaveStarting {
                wave_number: 1,
                countdown: 3.0,
            },
        ]
    );

    events.clear();
    orchestrator.process(0.5, &mut events);
    assert!(events.is_empty(), "still within the third second");

    orchestrator.process(0.6, &mut events);
    assert!(matches!(events.as_slice(), [Event::CountdownTick { .. }]));

    events.clear();
    orchestrator.process(2.0, &mut events);
    assert!(matches!(
        events.as_slice(),
        [
            Event::CountdownTick { remaining },
            Event::StateChanged {
                from: OrchestratorState::Countdown,
                to: OrchestratorState::Spawning,
            },
            Event::WaveStarted { wave_number: 1, .. },
        ] if *remaining == 0.0
    ));
    assert!(query::current_progress(&orchestrator).is_some());
}

#[test]
fn spawn_requests_are_limited_per_tick_and_keep_order() {
    let mut orchestrator = started(flat_config(25.0));
    let config = Arc::clone(query::current_config(&orchestrator).expect("current wave"));
    let expected: Vec<(String, Vec2)> = WaveProgress::start_wave(config)
        .pending_spawns()
        .iter()
        .map(|spawn| (spawn.unit_type.as_str().to_owned(), spawn.spawn_location))
        .collect();
    assert_eq!(expected.len(), 25);

    let mut batches = Vec::new();
    for delta in [1_000.0, 0.0, 0.0, 0.0] {
        let mut events = Vec::new();
        orchestrator.process(delta, &mut events);
        batches.push(events);
    }

    let sizes: Vec<usize> = batches.iter().map(|events| spawn_requests(events)).collect();
    assert_eq!(sizes, vec![10, 10, 5, 0]);

    let emitted: Vec<(String, Vec2)> = batches
        .iter()
        .flatten()
        .filter_map(|event| match event {
            Event::SpawnRequested {
                unit_type,
                position,
                ..
            } => Some((unit_type.as_str().to_owned(), *position)),
            _ => None,
        })
        .collect();
    assert_eq!(emitted, expected);
    assert_eq!(query::pending_spawn_count(&orchestrator), 0);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Active);
}

#[test]
fn spawn_requests_carry_wave_faction_and_modifiers() {
    let mut orchestrator = started(flat_config(4.0));
    let config = Arc::clone(query::current_config(&orchestrator).expect("current wave"));
    let mut events = Vec::new();
    orchestrator.process(1_000.0, &mut events);

    for event in &events {
        if let Event::SpawnRequested {
            wave_number,
            faction,
            modifiers,
            ..
        } = event
        {
            assert_eq!(*wave_number, 1);
            assert_eq!(faction, config.faction());
            assert_eq!(modifiers, config.modifiers());
        }
    }
}

#[test]
fn completed_wave_advances_to_the_next_countdown() {
    let mut orchestrator = started(flat_config(6.0));
    let mut units = UnitSystem::new(1);
    let mut events = Vec::new();
    orchestrator.process(1_000.0, &mut events);
    units.register(&mut orchestrator, spawn_requests(&events));

    events.clear();
    units.kill_all(&mut orchestrator, &mut events);

    let position = |predicate: fn(&Event) -> bool| events.iter().position(|event| predicate(event));
    let eliminated =
        position(|event| matches!(event, Event::AllUnitsEliminated { wave_number: 1 }));
    let completed =
        position(|event| matches!(event, Event::WaveCompleted { wave_number: 1, .. }));
    let next = position(|event| matches!(event, Event::WaveStarting { wave_number: 2, .. }));
    assert!(eliminated.is_some());
    assert!(eliminated < completed && completed < next);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Countdown);

    let history = query::history(&orchestrator);
    assert_eq!(history.len(), 1);
    assert!(history[0].was_successful);
    assert_eq!(history[0].units_killed, 6);
    assert_eq!(history[0].timestamp, 1_000.0);
    assert_eq!(query::statistics(&orchestrator).total_completed, 1);
}

#[test]
fn completed_wave_stops_without_auto_advance() {
    let mut orchestrator = started(OrchestratorConfig {
        auto_advance: false,
        ..flat_config(3.0)
    });
    let mut units = UnitSystem::new(1);
    let mut events = Vec::new();
    orchestrator.process(1_000.0, &mut events);
    units.register(&mut orchestrator, spawn_requests(&events));
    units.kill_all(&mut orchestrator, &mut events);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Stopped);

    events.clear();
    orchestrator.start(&mut events);
    assert!(events.contains(&Event::WaveStarting {
        wave_number: 2,
        countdown: 3.0,
    }));
}

#[test]
fn pause_freezes_countdown_and_deferred_spawns() {
    let mut orchestrator = WaveOrchestrator::new(flat_config(25.0));
    let mut events = Vec::new();
    orchestrator.start(&mut events);
    orchestrator.process(1.0, &mut events);

    orchestrator.pause(&mut events);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Paused);
    orchestrator.process(5.0, &mut events);
    assert_eq!(query::countdown_remaining(&orchestrator), 2.0);

    orchestrator.resume(&mut events);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Countdown);
    orchestrator.skip_countdown(&mut events);
    events.clear();
    orchestrator.process(1_000.0, &mut events);
    assert_eq!(spawn_requests(&events), 10);

    orchestrator.pause(&mut events);
    events.clear();
    orchestrator.process(1.0, &mut events);
    assert!(events.is_empty());
    assert_eq!(query::pending_spawn_count(&orchestrator), 15);

    orchestrator.resume(&mut events);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Active);
    events.clear();
    orchestrator.process(0.0, &mut events);
    assert_eq!(spawn_requests(&events), 10);
}

#[test]
fn pause_from_stopped_resumes_to_stopped() {
    let mut orchestrator = WaveOrchestrator::new(flat_config(3.0));
    let mut events = Vec::new();
    orchestrator.pause(&mut events);
    orchestrator.resume(&mut events);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Stopped);
    assert_eq!(events.len(), 2);
}

#[test]
fn failed_wave_stops_and_is_retried() {
    let mut orchestrator = started(flat_config(5.0));
    let mut events = Vec::new();
    orchestrator.process(1_000.0, &mut events);

    events.clear();
    orchestrator.fail_wave("base destroyed", &mut events);
    assert_eq!(
        events,
        vec![
            Event::WaveFailed {
                wave_number: 1,
                reason: "base destroyed".to_owned(),
            },
            Event::StateChanged {
                from: OrchestratorState::Active,
                to: OrchestratorState::Stopped,
            },
        ]
    );
    assert!(query::current_progress(&orchestrator).is_none());
    assert!(query::history(&orchestrator).is_empty());

    events.clear();
    orchestrator.start(&mut events);
    assert!(events.contains(&Event::WaveStarting {
        wave_number: 1,
        countdown: 3.0,
    }));
}

#[test]
fn stop_discards_progress_and_retries_the_interrupted_wave() {
    let mut orchestrator = started(flat_config(25.0));
    let mut events = Vec::new();
    orchestrator.process(1_000.0, &mut events);
    assert_eq!(query::pending_spawn_count(&orchestrator), 15);

    orchestrator.stop(&mut events);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Stopped);
    assert_eq!(query::pending_spawn_count(&orchestrator), 0);
    assert!(query::current_progress(&orchestrator).is_none());
    assert_eq!(query::upcoming_waves(&orchestrator)[0].wave_number(), 1);
}

#[test]
fn invalid_configuration_enters_error_until_cleared() {
    let mut orchestrator = WaveOrchestrator::new(OrchestratorConfig {
        spawn_locations: Vec::new(),
        ..flat_config(3.0)
    });
    let mut events = Vec::new();
    orchestrator.start(&mut events);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Error);
    assert!(matches!(
        events.as_slice(),
        [
            Event::OrchestratorError { .. },
            Event::StateChanged {
                from: OrchestratorState::Stopped,
                to: OrchestratorState::Error,
            },
        ]
    ));
    assert!(query::error_message(&orchestrator).is_some());

    events.clear();
    orchestrator.process(10.0, &mut events);
    orchestrator.start(&mut events);
    orchestrator.pause(&mut events);
    assert!(events.is_empty(), "error state ignores everything but clear_error");

    orchestrator.clear_error(&mut events);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Stopped);
    assert!(query::error_message(&orchestrator).is_none());

    orchestrator
        .set_spawn_locations(vec![Vec2::new(3.0, 4.0)])
        .expect("locations accepted while stopped");
    events.clear();
    orchestrator.start(&mut events);
    assert_eq!(query::state(&orchestrator), OrchestratorState::Countdown);
    assert!(events.contains(&Event::WaveStarting {
        wave_number: 1,
        countdown: 3.0,
    }));
}

#[test]
fn running_state_without_progress_enters_error() {
    let orchestrator = started(flat_config(4.0));
    let mut snapshot = orchestrator.snapshot();
    snapshot.state = OrchestratorState::Active;
    snapshot.state_manager.current_progress = None;

    let mut desynced = WaveOrchestrator::from_snapshot(snapshot);
    let mut events = Vec::new();
    desynced.process(0.1, &mut events);
    match events.as_slice() {
        [Event::OrchestratorError { message }, Event::StateChanged {
            from: OrchestratorState::Active,
            to: OrchestratorState::Error,
        }] => assert!(message.contains("without an active wave"), "{message}"),
        other => panic!("unexpected events {other:?}"),
    }
    assert_eq!(query::state(&desynced), OrchestratorState::Error);
    assert!(query::current_config(&desynced).is_none());

    events.clear();
    desynced.clear_error(&mut events);
    desynced.start(&mut events);
    assert!(events.contains(&Event::WaveStarting {
        wave_number: 1,
        countdown: 3.0,
    }));
}

#[test]
fn configuration_only_changes_while_stopped() {
    let mut orchestrator = WaveOrchestrator::new(flat_config(3.0));
    assert!(matches!(
        orchestrator.set_spawn_locations(Vec::new()),
        Err(OrchestratorError::InvalidConfig(ConfigError::NoSpawnLocations(1)))
    ));
    assert!(matches!(
        orchestrator.set_enemy_faction(FactionId::new("  ")),
        Err(OrchestratorError::InvalidConfig(ConfigError::EmptyFaction(1)))
    ));

    let mut events = Vec::new();
    orchestrator.start(&mut events);
    assert!(matches!(
        orchestrator.set_countdown_duration(1.0),
        Err(OrchestratorError::NotStopped)
    ));
    assert!(matches!(
        orchestrator.set_difficulty_multiplier(3.0),
        Err(OrchestratorError::NotStopped)
    ));

    orchestrator::apply(
        &mut orchestrator,
        Command::ConfigureCountdown { duration: 1.0 },
        &mut events,
    );
    assert_eq!(query::config(&orchestrator).countdown_duration, 3.0);
}

#[test]
fn multiplier_change_regenerates_the_lookahead() {
    let mut orchestrator = WaveOrchestrator::new(flat_config(10.0));
    let mut events = Vec::new();
    orchestrator.start(&mut events);
    orchestrator.stop(&mut events);
    let before = query::upcoming_waves(&orchestrator)[0].unit_count();

    orchestrator
        .set_difficulty_multiplier(2.0)
        .expect("multiplier accepted while stopped");
    let after = query::upcoming_waves(&orchestrator)[0].unit_count();
    assert_eq!(after, before * 2);
}

#[test]
fn stalled_wave_fails_after_maximum_duration() {
    let mut orchestrator = started(OrchestratorConfig {
        max_wave_duration: Some(40.0),
        ..flat_config(4.0)
    });
    let mut events = Vec::new();
    orchestrator.process(30.0, &mut events);
    assert!(query::state(&orchestrator).is_wave_running());

    events.clear();
    orchestrator.process(15.0, &mut events);
    assert!(events.contains(&Event::WaveFailed {
        wave_number: 1,
        reason: STALLED_WAVE_REASON.to_owned(),
    }));
    assert_eq!(query::state(&orchestrator), OrchestratorState::Stopped);
}

#[test]
fn commands_drive_a_full_wave() {
    let mut orchestrator = WaveOrchestrator::new(flat_config(2.0));
    let mut events = Vec::new();
    for command in [
        Command::Start,
        Command::SkipCountdown,
        Command::Tick {
            dt: Duration::from_secs(120),
        },
    ] {
        orchestrator::apply(&mut orchestrator, command, &mut events);
    }
    assert_eq!(spawn_requests(&events), 2);

    for id in 1..=2 {
        let unit = wave_forge_core::UnitId::new(id);
        orchestrator::apply(&mut orchestrator, Command::ReportUnitSpawned { unit }, &mut events);
        orchestrator::apply(
            &mut orchestrator,
            Command::ReportDamage {
                faction: FactionId::new("player"),
                amount: 40.0,
            },
            &mut events,
        );
        orchestrator::apply(
            &mut orchestrator,
            Command::ReportUnitKilled {
                unit,
                killer: FactionId::new("player"),
            },
            &mut events,
        );
    }

    assert!(events
        .iter()
        .any(|event| matches!(event, Event::WaveCompleted { wave_number: 1, .. })));
    assert_eq!(query::current_wave_number(&orchestrator), 2);
}

#[test]
fn statistics_are_readable_from_another_thread() {
    let mut orchestrator = WaveOrchestrator::new(flat_config(3.0));
    let mut units = UnitSystem::new(2);
    let mut events = Vec::new();
    orchestrator.start(&mut events);
    for _ in 0..200 {
        let _ = units.step(&mut orchestrator, 0.5);
    }

    let store = query::state_manager(&orchestrator);
    let statistics = thread::spawn(move || store.statistics())
        .join()
        .expect("reader thread");
    assert_eq!(statistics, query::statistics(&orchestrator));
    assert!(statistics.total_completed > 0);
}
