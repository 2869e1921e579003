use serde::{Deserialize, Serialize};
use wave_forge_core::WaveHistory;

/// Aggregates across the retained wave history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveStatistics {
    /// Number of history records retained.
    pub waves_recorded: u32,
    /// Units released across the retained waves.
    pub total_units_spawned: u64,
    /// Units killed across the retained waves.
    pub total_units_killed: u64,
    /// Seconds spent across the retained waves.
    pub total_duration: f32,
    /// Mean wave duration, `0.0` without history.
    pub average_duration: f32,
    /// Fraction of retained waves that were successful.
    pub success_rate: f32,
    /// Highest wave number ever started.
    pub highest_wave: u32,
    /// Waves completed over the whole session, including evicted ones.
    pub total_completed: u32,
}

/// Folds the history records into aggregate statistics.
pub(crate) fn summarize<'a>(
    history: impl Iterator<Item = &'a WaveHistory>,
    highest_wave: u32,
    total_completed: u32,
) -> WaveStatistics {
    let mut statistics = WaveStatistics {
        highest_wave,
        total_completed,
        ..WaveStatistics::default()
    };
    let mut successes = 0u32;

    for record in history {
        statistics.waves_recorded += 1;
        statistics.total_units_spawned += u64::from(record.units_spawned);
        statistics.total_units_killed += u64::from(record.units_killed);
        statistics.total_duration += record.duration;
        if record.was_successful {
            successes += 1;
        }
    }

    if statistics.waves_recorded > 0 {
        let recorded = statistics.waves_recorded as f32;
        statistics.average_duration = statistics.total_duration / recorded;
        statistics.success_rate = successes as f32 / recorded;
    }
    statistics
}
