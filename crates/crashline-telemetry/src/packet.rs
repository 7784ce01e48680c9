//! Diagnostic packet generation
//!
//! Turns a captured panic plus the assembled tags into the packet handed
//! to a transport. Building a packet performs no I/O and cannot fail.

use std::any::Any;
use std::backtrace::Backtrace;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::redact::Redactor;
use crate::tags::Tags;

/// What is known about a panic at the point it is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPanic {
    pub message: String,
    /// `file:line:col` of the panic, when the panic hook saw it
    pub location: Option<String>,
    pub backtrace: Option<String>,
}

impl CapturedPanic {
    /// Capture from a caught payload. The payload carries no location, so
    /// the stack trace is taken here, at the recovery point.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        Self {
            message: panic_message(payload),
            location: None,
            backtrace: Some(Backtrace::force_capture().to_string()),
        }
    }

    /// Returns a copy with PII scrubbed from message, location and trace.
    pub fn scrubbed(&self, redactor: &Redactor) -> Self {
        Self {
            message: redactor.scrub(&self.message),
            location: self.location.as_deref().map(|l| redactor.scrub(l)),
            backtrace: self.backtrace.as_deref().map(|b| redactor.scrub(b)),
        }
    }
}

/// Extracts the message of a panic payload (`&str` or `String`).
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// A crash report as transmitted to the crash-tracking endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticPacket {
    pub event_id: String,
    pub timestamp: String,
    pub level: String,
    pub platform: String,
    pub logger: String,
    pub server_name: String,
    pub message: String,
    pub culprit: String,
    pub stacktrace: String,
    pub tags: Tags,
}

impl DiagnosticPacket {
    /// Assemble a packet. `server_name` is expected to be already redacted.
    pub fn build(panic: &CapturedPanic, tags: Tags, server_name: String) -> Self {
        Self {
            event_id: Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            level: "fatal".to_string(),
            platform: "rust".to_string(),
            logger: "crashline".to_string(),
            server_name,
            message: panic.message.clone(),
            culprit: panic.location.clone().unwrap_or_default(),
            stacktrace: panic.backtrace.clone().unwrap_or_default(),
            tags,
        }
    }
}
