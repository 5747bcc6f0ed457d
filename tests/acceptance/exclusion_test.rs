//! Gate serialization acceptance tests.
//!
//! The gate covers only the active phase of opted-in channels, so the
//! holds of a gated deployment never overlap and their durations add
//! up: total wall time is bounded below by the summed active phases.
//! An ungated control run with identical demand overlaps freely and
//! finishes in nominal period time.

use super::common::{deployment, pulse_channel, run_bounded};
use pulsegen_hal::SimBank;
use std::time::{Duration, Instant};

/// Summed clamped-cycle count across all metered channels.
fn total_clamped(summary: &pulsegen_runtime::RuntimeSummary) -> u64 {
    summary
        .tasks
        .iter()
        .filter_map(|t| t.metrics.map(|m| m.clamped_count))
        .sum()
}

#[test]
fn test_gate_serializes_active_phases() {
    // Two gated channels demand 2 x 50ms of hold per 60ms period,
    // which cannot be met concurrently. Serialized holds for 5 cycles
    // each add up to 500ms of wall time at minimum.
    let bank = SimBank::new();
    let config = deployment(vec![
        pulse_channel(0, 60, 50, true),
        pulse_channel(1, 60, 50, true),
    ]);

    let started = Instant::now();
    let summary = run_bounded(config, &bank, 5);
    let elapsed = started.elapsed();

    println!("gated run took {elapsed:?}");
    assert!(
        elapsed >= Duration::from_millis(480),
        "gated run finished too fast for serialized holds: {elapsed:?}"
    );
    for report in &summary.tasks {
        assert_eq!(report.cycles, 5);
    }
    // Waiting for the gate pushed someone past their period.
    assert!(
        total_clamped(&summary) > 0,
        "expected clamped cycles from gate contention"
    );
}

#[test]
fn test_ungated_active_phases_overlap() {
    // Control run: the same demand without the gate overlaps freely
    // and completes in nominal period time.
    let bank = SimBank::new();
    let config = deployment(vec![
        pulse_channel(0, 60, 50, false),
        pulse_channel(1, 60, 50, false),
    ]);

    let started = Instant::now();
    let summary = run_bounded(config, &bank, 5);
    let elapsed = started.elapsed();

    println!("ungated run took {elapsed:?}");
    assert!(
        elapsed < Duration::from_millis(450),
        "ungated run should finish near 5 x 60ms: {elapsed:?}"
    );
    for report in &summary.tasks {
        assert_eq!(report.cycles, 5);
    }
}

#[test]
fn test_single_gated_channel_never_waits() {
    // With no contention the gate is free on every cycle; cadence
    // matches the ungated case.
    let bank = SimBank::new();
    let config = deployment(vec![pulse_channel(0, 40, 10, true)]);

    let started = Instant::now();
    let summary = run_bounded(config, &bank, 5);
    let elapsed = started.elapsed();

    assert_eq!(summary.tasks[0].cycles, 5);
    assert!(
        elapsed < Duration::from_millis(350),
        "uncontended gate must not stretch cycles: {elapsed:?}"
    );
    assert_eq!(total_clamped(&summary), 0);
}
