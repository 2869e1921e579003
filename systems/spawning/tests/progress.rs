use std::sync::Arc;

use glam::Vec2;
use wave_forge_core::{FactionId, SpawnTiming, UnitId, UnitType, WaveConfig};
use wave_forge_system_spawning::WaveProgress;

fn wave(units: u32, timing: SpawnTiming) -> Arc<WaveConfig> {
    Arc::new(
        WaveConfig::new(1, FactionId::new("horde"), units)
            .with_composition([("basic", 0.6), ("ranged", 0.2), ("heavy", 0.2)])
            .with_spawn_locations(vec![Vec2::ZERO])
            .with_timing(timing)
            .with_seed(0xfeed),
    )
}

fn assert_accounting(progress: &WaveProgress) {
    let queued = progress.pending_spawns().len() as u32;
    assert_eq!(progress.units_spawned(), progress.total_units() - queued);
    assert_eq!(
        progress.units_remaining(),
        progress.units_spawned() - progress.units_killed()
    );
}

#[test]
fn large_delta_releases_every_due_event_in_order() {
    let mut progress = WaveProgress::start_wave(wave(
        5,
        SpawnTiming::sequential(2.0).with_initial_delay(0.5),
    ));

    let due = progress.update(100.0);
    assert_eq!(due.len(), 5);
    assert!(due
        .windows(2)
        .all(|pair| pair[0].spawn_time <= pair[1].spawn_time));
    assert!(progress.update(100.0).is_empty(), "events are never repeated");
    assert_accounting(&progress);
}

#[test]
fn accounting_holds_through_the_whole_wave() {
    let mut progress = WaveProgress::start_wave(wave(
        12,
        SpawnTiming::burst(4, 1.0).with_initial_delay(0.0),
    ));
    let killer = FactionId::new("player");
    let mut next_id = 0;
    let mut alive = Vec::new();

    for _ in 0..20 {
        for _ in progress.update(0.5) {
            next_id += 1;
            assert!(progress.unit_spawned(UnitId::new(next_id)));
            alive.push(UnitId::new(next_id));
        }
        assert_accounting(&progress);
        if let Some(unit) = alive.pop() {
            let _ = progress.unit_killed(unit, &killer);
        }
        assert_accounting(&progress);
    }
}

#[test]
fn completion_happens_once_and_only_when_everything_is_dead() {
    let mut progress = WaveProgress::start_wave(wave(
        3,
        SpawnTiming::sequential(1.0).with_initial_delay(0.0),
    ));
    let killer = FactionId::new("player");

    let first = progress.update(0.0);
    assert_eq!(first.len(), 1);
    assert!(progress.unit_spawned(UnitId::new(1)));
    assert!(!progress.unit_killed(UnitId::new(1), &killer));
    assert!(!progress.is_complete(), "units are still queued");

    let rest = progress.update(5.0);
    assert_eq!(rest.len(), 2);
    assert!(progress.unit_spawned(UnitId::new(2)));
    assert!(progress.unit_spawned(UnitId::new(3)));
    assert!(!progress.unit_killed(UnitId::new(2), &killer));
    assert!(progress.unit_killed(UnitId::new(3), &killer));
    assert!(progress.is_complete());

    assert!(!progress.unit_killed(UnitId::new(3), &killer));
    let _ = progress.update(1.0);
    assert!(progress.is_complete());

    let history = progress.to_history(42.0);
    assert!(history.was_successful);
    assert_eq!(history.units_killed, 3);
    assert_eq!(history.units_survived, 0);
    assert_eq!(history.faction_performance[&killer].kills, 3);
    assert_eq!(history.seed, 0xfeed);
}

#[test]
fn schedule_is_reproducible_from_the_seed() {
    let timing = SpawnTiming::gradual(12.0);
    let first = WaveProgress::start_wave(wave(20, timing));
    let second = WaveProgress::start_wave(wave(20, timing));
    assert_eq!(first.pending_spawns(), second.pending_spawns());
}

#[test]
fn boss_spawns_last() {
    let config = Arc::new(
        WaveConfig::new(10, FactionId::new("horde"), 8)
            .with_composition([("basic", 1.0)])
            .with_spawn_locations(vec![Vec2::ZERO])
            .with_timing(SpawnTiming::sequential(1.0))
            .with_boss_unit_type(UnitType::new("warlord"))
            .with_seed(3),
    );
    let progress = WaveProgress::start_wave(config);
    assert_eq!(progress.total_units(), 9);
    let last = progress.pending_spawns().back().expect("boss event");
    assert_eq!(last.unit_type.as_str(), "warlord");
}
