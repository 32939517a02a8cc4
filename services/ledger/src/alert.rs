//! Operator alerting
//!
//! Ledger failures and per-market matcher crashes are reported here. Delivery
//! (mail, chat, paging) sits behind [`AlertSink`].

use serde::Serialize;
use std::sync::Mutex;
use tracing::error;

/// One operator notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub subject: String,
    pub message: String,
}

impl Alert {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Operator notification channel
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: Alert);
}

/// Writes alerts to the log at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlerts;

impl AlertSink for TracingAlerts {
    fn notify(&self, alert: Alert) {
        error!(subject = %alert.subject, message = %alert.message, "Operator alert");
    }
}

/// Keeps every alert in memory
#[derive(Debug, Default)]
pub struct RecordingAlerts {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the alerts received so far
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for RecordingAlerts {
    fn notify(&self, alert: Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(alert);
    }
}
