use std::sync::Arc;
use std::time::Duration;

use missiond::config::WatchdogConfig;
use missiond::mission::MissionState;
use missiond::platform::{AlertKind, MissionWatchdog};

use crate::mission_harness::{CapturedAlerts, MissionHarness};

fn quick_config() -> WatchdogConfig {
    WatchdogConfig {
        poll_interval_secs: 1,
        stale_threshold_secs: 1,
        ..WatchdogConfig::default()
    }
}

#[tokio::test]
async fn stalled_mission_is_failed_then_requeued() {
    let harness = MissionHarness::new().await;
    let id = harness.create("stuck", 3).await;
    harness.drive(&id, &[MissionState::Running]).await;
    let alerts = Arc::new(CapturedAlerts::default());
    let watchdog = MissionWatchdog::new(harness.dyn_store(), quick_config())
        .with_alerts(alerts.clone());

    let first = watchdog.scan().await.unwrap();
    assert_eq!(first.running_checked, 1);
    assert!(first.stalled.is_empty());

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    let second = watchdog.scan().await.unwrap();

    assert_eq!(second.stalled, vec![id.clone()]);
    assert_eq!(second.recovered, vec![id.clone()]);
    assert_eq!(harness.state(&id).await, MissionState::Idle);
    let mission = harness.store.get_mission(&id).await.unwrap().unwrap();
    assert_eq!(mission.retry_count, 1);

    let reasons = harness.event_reasons(&id).await;
    assert!(reasons[1].starts_with("watchdog: stalled for "), "{reasons:?}");
    assert_eq!(reasons[2], "watchdog: auto-recovery attempt 1/3");
    assert_eq!(
        alerts.kinds(),
        vec![AlertKind::WatchdogStalled, AlertKind::WatchdogRecovered]
    );
}

#[tokio::test]
async fn progressing_mission_survives_many_scans() {
    let harness = MissionHarness::new().await;
    let id = harness.create("busy", 3).await;
    harness.drive(&id, &[MissionState::Running]).await;
    let watchdog = MissionWatchdog::new(harness.dyn_store(), quick_config());

    for _ in 0..3 {
        watchdog.scan().await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        harness
            .drive(&id, &[MissionState::Paused, MissionState::Running])
            .await;
    }
    let report = watchdog.scan().await.unwrap();

    assert!(report.stalled.is_empty());
    assert_eq!(harness.state(&id).await, MissionState::Running);
}

#[tokio::test]
async fn recovery_stops_when_retries_run_out() {
    let harness = MissionHarness::new().await;
    let id = harness.create("fragile", 1).await;
    let alerts = Arc::new(CapturedAlerts::default());
    let watchdog = MissionWatchdog::new(harness.dyn_store(), quick_config())
        .with_alerts(alerts.clone());

    harness
        .drive(&id, &[MissionState::Running, MissionState::Failed])
        .await;
    let report = watchdog.scan().await.unwrap();
    assert_eq!(report.recovered, vec![id.clone()]);
    assert_eq!(harness.state(&id).await, MissionState::Idle);

    harness
        .drive(&id, &[MissionState::Running, MissionState::Failed])
        .await;
    let report = watchdog.scan().await.unwrap();
    assert!(report.recovered.is_empty());
    assert_eq!(harness.state(&id).await, MissionState::Failed);

    let recorded = alerts.all();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].2, "retry 1/1");
}

#[tokio::test]
async fn background_loop_flags_stall_without_manual_scans() {
    let harness = MissionHarness::new().await;
    let id = harness.create("forgotten", 0).await;
    harness.drive(&id, &[MissionState::Running]).await;
    let watchdog = Arc::new(MissionWatchdog::new(harness.dyn_store(), quick_config()));

    assert!(watchdog.start());
    let mut state = MissionState::Running;
    for _ in 0..60 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        state = harness.state(&id).await;
        if state == MissionState::Failed {
            break;
        }
    }
    assert!(watchdog.stop().await);

    assert_eq!(state, MissionState::Failed);
}
