use std::sync::Arc;
use std::time::Duration;

use missiond::platform::{
    AlertKind, BudgetConfig, BudgetEnforcer, JobPhase, KillSwitch, MissionScheduler,
};

use crate::mission_harness::CapturedAlerts;

#[tokio::test]
async fn budget_breach_pulls_the_kill_switch() {
    let alerts = Arc::new(CapturedAlerts::default());
    let budget = BudgetEnforcer::with_alerts(alerts.clone());
    let kill_switch = Arc::new(KillSwitch::with_alerts(alerts.clone()));

    budget.start("m1", BudgetConfig {
        max_actions: Some(3),
        max_cost_usd: Some(10.0),
        ..BudgetConfig::default()
    });
    kill_switch.arm("m1");
    let supervisor = {
        let kill_switch = Arc::clone(&kill_switch);
        tokio::spawn(async move { kill_switch.wait_for_kill("m1").await })
    };

    let mut steps = 0;
    while !kill_switch.is_killed("m1") && steps < 100 {
        budget.record_action("m1", 0.5);
        steps += 1;
        if let Err(breach) = budget.check("m1").await {
            kill_switch.trigger(&breach.mission_id, &breach.reason).await;
        }
    }

    assert_eq!(steps, 3);
    let reason = tokio::time::timeout(Duration::from_secs(1), supervisor)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(reason.contains("action budget exceeded"), "{reason}");

    let summary = budget.summary("m1").unwrap();
    assert!(summary.breached);
    assert_eq!(summary.actions, 3);
    assert_eq!(
        alerts.kinds(),
        vec![AlertKind::BudgetBreach, AlertKind::KillSwitchTriggered]
    );

    budget.stop("m1");
    kill_switch.disarm("m1");
    assert!(!kill_switch.is_killed("m1"));
    assert!(kill_switch.active_missions().is_empty());
}

#[tokio::test]
async fn scheduled_executor_observes_kill_switch() {
    let kill_switch = Arc::new(KillSwitch::new());
    kill_switch.arm("m1");

    let executor = {
        let kill_switch = Arc::clone(&kill_switch);
        move |mission_id: String| {
            let kill_switch = Arc::clone(&kill_switch);
            async move {
                for _ in 0..200 {
                    if let Some(reason) = kill_switch.kill_reason(&mission_id) {
                        return Ok(format!("Error: killed: {reason}"));
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Ok::<_, anyhow::Error>("done".to_string())
            }
        }
    };
    let scheduler = MissionScheduler::new(executor);
    scheduler.schedule("m1", Some(Duration::from_secs(60)), 0, 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    kill_switch.trigger("m1", "operator stop").await;
    for _ in 0..100 {
        if !scheduler.is_scheduled("m1") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let status = scheduler.job_status("m1").unwrap();
    assert_eq!(status.phase, JobPhase::GaveUp);
    assert_eq!(status.invocations, 1);
    assert_eq!(
        status.last_outcome.as_deref(),
        Some("Error: killed: operator stop")
    );
}
