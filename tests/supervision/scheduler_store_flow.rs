use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use missiond::mission::{MissionState, MissionStore, SqliteMissionStore};
use missiond::platform::{BackoffPolicy, JobPhase, MissionScheduler};

use crate::mission_harness::MissionHarness;

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        base: Duration::from_millis(10),
        max: Duration::from_millis(50),
        jitter_fraction: 0.25,
        floor: Duration::from_millis(1),
    }
}

async fn wait_until_unscheduled(scheduler: &MissionScheduler, mission_id: &str) {
    for _ in 0..200 {
        if !scheduler.is_scheduled(mission_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("mission {mission_id} is still scheduled");
}

/// Runs one pass of a mission against the store, the way a mission runner
/// would: requeue after a failure, start, then finish or fail.
async fn run_pass(
    store: &SqliteMissionStore,
    mission_id: &str,
    succeed: bool,
) -> anyhow::Result<String> {
    let mission = store
        .get_mission(mission_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("mission {mission_id} vanished"))?;
    if mission.state == MissionState::Failed {
        store
            .transition_mission(mission_id, MissionState::Idle, "runner: retrying")
            .await?;
    }
    store
        .transition_mission(mission_id, MissionState::Running, "runner: started")
        .await?;

    if succeed {
        store
            .transition_mission(mission_id, MissionState::Completed, "runner: done")
            .await?;
        Ok("done".to_string())
    } else {
        store
            .transition_mission(mission_id, MissionState::Failed, "runner: flaky step")
            .await?;
        Ok("Error: flaky step".to_string())
    }
}

#[tokio::test]
async fn scheduled_mission_retries_and_completes_in_store() {
    let harness = MissionHarness::new().await;
    let id = harness.create("flaky", 1).await;
    let mission = harness.store.get_mission(&id).await.unwrap().unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let executor = {
        let store = Arc::clone(&harness.store);
        let calls = Arc::clone(&calls);
        move |mission_id: String| {
            let store = Arc::clone(&store);
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move { run_pass(&store, &mission_id, attempt > 0).await }
        }
    };
    let scheduler = MissionScheduler::with_backoff(executor, fast_backoff());

    assert!(scheduler.schedule_mission(&mission));
    wait_until_unscheduled(&scheduler, &id).await;

    let status = scheduler.job_status(&id).unwrap();
    assert_eq!(status.phase, JobPhase::Succeeded);
    assert_eq!(status.invocations, 2);
    assert_eq!(status.attempt, 0);
    assert_eq!(harness.state(&id).await, MissionState::Completed);
    assert_eq!(
        harness.event_reasons(&id).await,
        vec![
            "runner: started",
            "runner: flaky step",
            "runner: retrying",
            "runner: started",
            "runner: done",
        ]
    );
}

#[tokio::test]
async fn exhausted_mission_is_left_failed() {
    let harness = MissionHarness::new().await;
    let id = harness.create("doomed", 2).await;
    let mission = harness.store.get_mission(&id).await.unwrap().unwrap();

    let executor = {
        let store = Arc::clone(&harness.store);
        move |mission_id: String| {
            let store = Arc::clone(&store);
            async move { run_pass(&store, &mission_id, false).await }
        }
    };
    let scheduler = MissionScheduler::with_backoff(executor, fast_backoff());

    scheduler.schedule_mission(&mission);
    wait_until_unscheduled(&scheduler, &id).await;

    let status = scheduler.job_status(&id).unwrap();
    assert_eq!(status.phase, JobPhase::GaveUp);
    assert_eq!(status.invocations, 3);
    assert_eq!(harness.state(&id).await, MissionState::Failed);
}

#[tokio::test]
async fn store_errors_surface_as_failed_outcomes() {
    let harness = MissionHarness::new().await;
    let id = harness.create("finished", 0).await;
    harness
        .drive(&id, &[MissionState::Running, MissionState::Completed])
        .await;

    let executor = {
        let store = Arc::clone(&harness.store);
        move |mission_id: String| {
            let store = Arc::clone(&store);
            async move { run_pass(&store, &mission_id, true).await }
        }
    };
    let scheduler = MissionScheduler::with_backoff(executor, fast_backoff());

    scheduler.schedule(&id, None, 0, 1);
    wait_until_unscheduled(&scheduler, &id).await;

    let status = scheduler.job_status(&id).unwrap();
    assert_eq!(status.phase, JobPhase::GaveUp);
    let outcome = status.last_outcome.unwrap();
    assert!(outcome.starts_with("Error: unexpected exception:"), "{outcome}");
    assert!(outcome.contains("not allowed"), "{outcome}");
    assert_eq!(harness.state(&id).await, MissionState::Completed);
}
