#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use missiond::mission::{MissionState, MissionStore, NewMission, SqliteMissionStore};
use missiond::platform::{AlertKind, AlertSink};

pub struct MissionHarness {
    pub store: Arc<SqliteMissionStore>,
    _tmp: TempDir,
}

impl MissionHarness {
    pub async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let store = SqliteMissionStore::open_in_workspace(&tmp.path().join("workspace"))
            .await
            .unwrap();
        Self {
            store: Arc::new(store),
            _tmp: tmp,
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn MissionStore> {
        self.store.clone()
    }

    pub async fn create(&self, title: &str, retry_limit: u32) -> String {
        let new = NewMission {
            retry_limit,
            ..NewMission::new(title, format!("{title} goal"))
        };
        self.store.create_mission(new).await.unwrap()
    }

    /// Walks a fresh mission along `path`, one transition per state.
    pub async fn drive(&self, mission_id: &str, path: &[MissionState]) {
        for state in path {
            self.store
                .transition_mission(mission_id, *state, "test setup")
                .await
                .unwrap();
        }
    }

    pub async fn state(&self, mission_id: &str) -> MissionState {
        self.store
            .get_mission(mission_id)
            .await
            .unwrap()
            .unwrap()
            .state
    }

    pub async fn event_reasons(&self, mission_id: &str) -> Vec<String> {
        self.store
            .list_mission_events(mission_id)
            .await
            .unwrap()
            .into_iter()
            .map(|event| event.reason)
            .collect()
    }
}

#[derive(Default)]
pub struct CapturedAlerts {
    alerts: Mutex<Vec<(String, AlertKind, String)>>,
}

impl CapturedAlerts {
    pub fn kinds(&self) -> Vec<AlertKind> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, kind, _)| *kind)
            .collect()
    }

    pub fn all(&self) -> Vec<(String, AlertKind, String)> {
        self.alerts.lock().unwrap().clone()
    }
}

impl AlertSink for CapturedAlerts {
    fn alert<'a>(
        &'a self,
        mission_id: &'a str,
        kind: AlertKind,
        detail: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.alerts
                .lock()
                .unwrap()
                .push((mission_id.to_string(), kind, detail.to_string()));
            Ok(())
        })
    }
}
