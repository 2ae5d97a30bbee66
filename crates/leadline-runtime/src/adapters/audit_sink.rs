//! # Audit Sink
//!
//! Outbound port for the columnar store that keeps the platform audit log
//! (`audit_log` table) and analytics events (`events` table), plus an
//! in-memory adapter.
//!
//! Timestamps are written as `YYYY-MM-DD HH:MM:SS` in UTC, without
//! fractional seconds, which is the column format the store expects.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use shared_bus::HandlerError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use tracing::debug;

/// Table receiving audit records.
pub const AUDIT_LOG_TABLE: &str = "audit_log";

/// Table receiving analytics events.
pub const EVENTS_TABLE: &str = "events";

const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way the sink stores it.
#[must_use]
pub fn format_created_at(at: DateTime<Utc>) -> String {
    at.format(CREATED_AT_FORMAT).to_string()
}

/// Errors returned by a sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The store could not be reached.
    #[error("{table} unavailable: {reason}")]
    Unavailable { table: &'static str, reason: String },

    /// The store refused the record.
    #[error("{table} rejected record: {reason}")]
    Rejected { table: &'static str, reason: String },
}

impl From<SinkError> for HandlerError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Unavailable { .. } => HandlerError::SinkUnavailable(err.to_string()),
            SinkError::Rejected { .. } => HandlerError::Rejected(err.to_string()),
        }
    }
}

/// A row for the `audit_log` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub action: String,
    pub workspace_id: String,
    pub details: Value,
    pub created_at: String,
}

impl AuditRecord {
    /// Audit row stamped with the current time.
    pub fn now(action: impl Into<String>, workspace_id: impl Into<String>, details: Value) -> Self {
        Self {
            action: action.into(),
            workspace_id: workspace_id.into(),
            details,
            created_at: format_created_at(Utc::now()),
        }
    }
}

/// A row for the `events` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsRecord {
    pub event_type: String,
    pub payload: Value,
    pub created_at: String,
}

impl AnalyticsRecord {
    /// Analytics row stamped with the current time.
    pub fn now(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            created_at: format_created_at(Utc::now()),
        }
    }
}

/// Anything a sink can store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SinkRecord {
    Audit(AuditRecord),
    Analytics(AnalyticsRecord),
}

impl SinkRecord {
    /// Destination table.
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Self::Audit(_) => AUDIT_LOG_TABLE,
            Self::Analytics(_) => EVENTS_TABLE,
        }
    }
}

impl From<AuditRecord> for SinkRecord {
    fn from(record: AuditRecord) -> Self {
        Self::Audit(record)
    }
}

impl From<AnalyticsRecord> for SinkRecord {
    fn from(record: AnalyticsRecord) -> Self {
        Self::Analytics(record)
    }
}

/// Port for the audit/analytics store.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record to its table.
    async fn append(&self, record: SinkRecord) -> Result<(), SinkError>;
}

/// In-memory sink with switchable outages.
///
/// `set_available(false)` fails every write until re-enabled;
/// `fail_next(n)` fails exactly the next `n` writes.
#[derive(Debug)]
pub struct InMemoryAuditSink {
    records: RwLock<Vec<SinkRecord>>,
    available: AtomicBool,
    fail_budget: AtomicUsize,
    attempts: AtomicUsize,
}

impl InMemoryAuditSink {
    /// Create an empty, available sink.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
            fail_budget: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Switch the simulated store on or off.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fail the next `n` writes, then recover.
    pub fn fail_next(&self, n: usize) {
        self.fail_budget.store(n, Ordering::SeqCst);
    }

    /// Whether writes currently succeed (ignoring `fail_next`).
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Every stored record in write order.
    #[must_use]
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.read().clone()
    }

    /// Stored `audit_log` rows.
    #[must_use]
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.records
            .read()
            .iter()
            .filter_map(|r| match r {
                SinkRecord::Audit(audit) => Some(audit.clone()),
                SinkRecord::Analytics(_) => None,
            })
            .collect()
    }

    /// Stored `events` rows.
    #[must_use]
    pub fn analytics_records(&self) -> Vec<AnalyticsRecord> {
        self.records
            .read()
            .iter()
            .filter_map(|r| match r {
                SinkRecord::Analytics(event) => Some(event.clone()),
                SinkRecord::Audit(_) => None,
            })
            .collect()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes attempted, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.fail_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, record: SinkRecord) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let table = record.table();

        if !self.is_available() {
            return Err(SinkError::Unavailable {
                table,
                reason: "store offline".to_string(),
            });
        }
        if self.take_failure() {
            return Err(SinkError::Unavailable {
                table,
                reason: "injected failure".to_string(),
            });
        }

        self.records.write().push(record);
        debug!(table, "Record appended");
        Ok(())
    }
}
