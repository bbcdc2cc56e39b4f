use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use super::error::StoreError;
use super::model::{Actor, ScheduledRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

/// Append-only fact about one lifecycle mutation.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub record_id: Uuid,
    pub patient_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        actor: &Actor,
        before: Option<&ScheduledRecord>,
        after: Option<&ScheduledRecord>,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        let subject = after.or(before)?;
        Some(AuditEntry {
            tenant_id: subject.tenant_id,
            actor_id: actor.user_id,
            action,
            record_id: subject.id,
            patient_id: subject.patient_id,
            timestamp,
            before: before.and_then(snapshot),
            after: after.and_then(snapshot),
        })
    }
}

fn snapshot(record: &ScheduledRecord) -> Option<JsonValue> {
    serde_json::to_value(record).ok()
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgAuditSink {
    db: PgPool,
}

impl PgAuditSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO activity_log (
              tenant_id, actor_id, action_type, entity, entity_id,
              patient_id, before_snapshot, after_snapshot, created_at
            )
            VALUES ($1,$2,$3,'patient_record',$4,$5,$6,$7,$8)
            "#,
        )
        .bind(entry.tenant_id)
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(entry.record_id)
        .bind(entry.patient_id)
        .bind(&entry.before)
        .bind(&entry.after)
        .bind(entry.timestamp)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}
