//! Failure isolation acceptance tests.
//!
//! Startup faults are per-channel: an unready or rejected line takes
//! down exactly its own task while siblings run their full schedule
//! and the reporter drains whatever was produced.

use super::common::{deployment, pulse_channel, run_bounded};
use pulsegen_common::{ChannelId, PulseError, TaskState};
use pulsegen_hal::SimBank;

#[test]
fn test_unready_line_fails_only_its_channel() {
    let bank = SimBank::new();
    bank.set_ready("led1", false);

    let config = deployment(vec![
        pulse_channel(0, 20, 5, true),
        pulse_channel(1, 20, 5, true),
        pulse_channel(2, 20, 5, true),
    ]);
    let summary = run_bounded(config, &bank, 5);

    assert_eq!(summary.failed_channels(), vec![ChannelId(1)]);
    for report in &summary.tasks {
        if report.channel == ChannelId(1) {
            assert_eq!(report.state, TaskState::Failed);
            assert_eq!(report.cycles, 0);
            assert_eq!(
                report.error,
                Some(PulseError::DeviceNotReady {
                    line: "led1".to_string()
                })
            );
        } else {
            assert_eq!(report.state, TaskState::Stopped);
            assert_eq!(report.cycles, 5);
            assert_eq!(report.error, None);
        }
    }

    // The failed channel never produced an event.
    let reporter = &summary.reporter;
    assert_eq!(reporter.events, 10);
    assert!(!reporter.per_channel.contains_key(&ChannelId(1)));
    assert_eq!(reporter.per_channel[&ChannelId(0)], 5);
    assert_eq!(reporter.per_channel[&ChannelId(2)], 5);
}

#[test]
fn test_rejected_configure_fails_only_its_channel() {
    let bank = SimBank::new();
    bank.reject_configure("trig0", true);

    let config = deployment(vec![
        pulse_channel(0, 20, 5, false),
        pulse_channel(1, 20, 5, false),
    ]);
    let summary = run_bounded(config, &bank, 3);

    assert_eq!(summary.failed_channels(), vec![ChannelId(0)]);
    let failed = summary
        .tasks
        .iter()
        .find(|t| t.channel == ChannelId(0))
        .unwrap();
    assert!(matches!(
        failed.error,
        Some(PulseError::LineConfig { ref line, .. }) if line == "trig0"
    ));

    let sibling = summary
        .tasks
        .iter()
        .find(|t| t.channel == ChannelId(1))
        .unwrap();
    assert_eq!(sibling.state, TaskState::Stopped);
    assert_eq!(sibling.cycles, 3);
    assert_eq!(summary.reporter.per_channel[&ChannelId(1)], 3);
}

#[test]
fn test_all_channels_failed_drains_cleanly() {
    // Even a fully failed deployment shuts down in order: the
    // reporter sees the channel close and exits with zero events.
    let bank = SimBank::new();
    bank.set_ready("led0", false);
    bank.set_ready("led1", false);

    let config = deployment(vec![
        pulse_channel(0, 20, 5, false),
        pulse_channel(1, 20, 5, false),
    ]);
    let summary = run_bounded(config, &bank, 5);

    assert_eq!(summary.failed_channels().len(), 2);
    assert_eq!(summary.total_cycles(), 0);
    assert_eq!(summary.reporter.events, 0);
    assert!(summary.reporter.per_channel.is_empty());
}
