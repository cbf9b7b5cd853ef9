use super::alerts::{AlertKind, AlertSink};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

/// Captures every alert it receives.
#[derive(Default)]
pub(crate) struct RecordingSink {
    alerts: Mutex<Vec<(String, AlertKind, String)>>,
}

impl RecordingSink {
    pub(crate) fn take(&self) -> Vec<(String, AlertKind, String)> {
        std::mem::take(&mut *self.alerts.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl AlertSink for RecordingSink {
    fn alert<'a>(
        &'a self,
        mission_id: &'a str,
        kind: AlertKind,
        detail: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.alerts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((mission_id.to_string(), kind, detail.to_string()));
            Ok(())
        })
    }
}
