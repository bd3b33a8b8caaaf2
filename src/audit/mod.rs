//! Audit events emitted for every mutating or compatibility-check operation.
//!
//! The engine never persists audit events itself. It hands each event to an
//! injected [`AuditSink`]; transport is the sink's business.
//!
//! - [`TracingAuditSink`] - structured `tracing` events on target `tmplver::audit`
//! - [`MemoryAuditSink`] - keeps events in memory, mainly for tests and embedding

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::Classification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    VersionCreated,
    VersionDeprecated,
    MigrationCreated,
    MigrationExecuted,
    ConflictDetected,
    CompatibilityChecked,
    VersionResolved,
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VersionCreated => "VERSION_CREATED",
            Self::VersionDeprecated => "VERSION_DEPRECATED",
            Self::MigrationCreated => "MIGRATION_CREATED",
            Self::MigrationExecuted => "MIGRATION_EXECUTED",
            Self::ConflictDetected => "CONFLICT_DETECTED",
            Self::CompatibilityChecked => "COMPATIBILITY_CHECKED",
            Self::VersionResolved => "VERSION_RESOLVED",
        };
        f.write_str(name)
    }
}

/// A single structured audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub template_id: String,
    pub event_type: AuditEventType,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub details: serde_json::Value,
    pub classification: Classification,
}

impl AuditEvent {
    /// Create an event stamped with a fresh id and the current time.
    pub fn new(
        event_type: AuditEventType,
        template_id: impl Into<String>,
        version: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            template_id: template_id.into(),
            event_type,
            version: version.into(),
            timestamp: Utc::now(),
            actor_id: actor_id.into(),
            details: serde_json::Value::Null,
            classification: Classification::default(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }
}

/// Receiver of audit events.
///
/// Implementations must not block for long; `emit` is called while the
/// operation that produced the event is still completing.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Sink that writes every event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            target: "tmplver::audit",
            event_id = %event.event_id,
            event_type = %event.event_type,
            template_id = %event.template_id,
            version = %event.version,
            actor_id = %event.actor_id,
            classification = %event.classification,
            details = %event.details,
            "audit event"
        );
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events emitted so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Events of one type, oldest first.
    #[must_use]
    pub fn events_of(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|e| e.event_type == event_type).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
