use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::error::StoreError;
use super::model::{Money, OwnerScope, RecordKind, Role, ScheduledRecord};

#[derive(Debug, Clone)]
pub struct NewRecord {
    pub scope: OwnerScope,
    pub patient_id: Uuid,
    pub kind: RecordKind,
    pub start_at: NaiveDateTime,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub cost: Option<Money>,
    pub created_by: Uuid,
}

/// Authoritative record set. Implementations must refuse two live records
/// of one owner with overlapping slots (`StoreError::SlotTaken`).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Live records with `from <= start_at < to`, ordered by `start_at`.
    async fn list_active(
        &self,
        scope: OwnerScope,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<ScheduledRecord>, StoreError>;

    async fn find_active(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<ScheduledRecord>, StoreError>;

    async fn insert(&self, new: NewRecord) -> Result<ScheduledRecord, StoreError>;

    /// Writes the mutable fields of `record`. `None` if it is gone.
    async fn update(&self, record: &ScheduledRecord) -> Result<Option<ScheduledRecord>, StoreError>;

    /// `false` if there was no live record to delete.
    async fn soft_delete(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn patient_name(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<String>, StoreError>;

    /// Active user of `tenant_id` with the doctor role.
    async fn is_doctor_in_tenant(&self, tenant_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn is_assigned(
        &self,
        tenant_id: Uuid,
        secretary_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<bool, StoreError>;
}

/* ============================================================
   Postgres
   ============================================================ */

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    record_id: Uuid,
    tenant_id: Uuid,
    owner_id: Uuid,
    patient_id: Uuid,
    patient_name: Option<String>,
    kind: RecordKind,
    start_at: NaiveDateTime,
    duration_minutes: i32,
    title: String,
    description: Option<String>,
    price_cents: Option<i64>,
    cost_cents: Option<i64>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<RecordRow> for ScheduledRecord {
    fn from(r: RecordRow) -> Self {
        ScheduledRecord {
            id: r.record_id,
            tenant_id: r.tenant_id,
            owner_id: r.owner_id,
            patient_id: r.patient_id,
            patient_name: r.patient_name,
            kind: r.kind,
            start_at: r.start_at,
            duration_minutes: r.duration_minutes,
            title: r.title,
            description: r.description,
            price: r.price_cents.map(Money::from_cents),
            cost: r.cost_cents.map(Money::from_cents),
            created_by: r.created_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
            deleted_at: r.deleted_at,
        }
    }
}

#[derive(Clone)]
pub struct PgRecordStore {
    db: PgPool,
}

impl PgRecordStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list_active(
        &self,
        scope: OwnerScope,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<ScheduledRecord>, StoreError> {
        let rows: Vec<RecordRow> = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT
              r.record_id, r.tenant_id, r.owner_id, r.patient_id,
              p.name AS patient_name,
              r.kind, r.start_at, r.duration_minutes, r.title, r.description,
              r.price_cents, r.cost_cents, r.created_by,
              r.created_at, r.updated_at, r.deleted_at
            FROM patient_record r
            LEFT JOIN patient p ON p.patient_id = r.patient_id
            WHERE r.tenant_id = $1
              AND r.owner_id  = $2
              AND r.deleted_at IS NULL
              AND r.start_at >= $3
              AND r.start_at <  $4
            ORDER BY r.start_at ASC
            "#,
        )
        .bind(scope.tenant_id)
        .bind(scope.owner_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(ScheduledRecord::from).collect())
    }

    async fn find_active(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<ScheduledRecord>, StoreError> {
        let row: Option<RecordRow> = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT
              r.record_id, r.tenant_id, r.owner_id, r.patient_id,
              p.name AS patient_name,
              r.kind, r.start_at, r.duration_minutes, r.title, r.description,
              r.price_cents, r.cost_cents, r.created_by,
              r.created_at, r.updated_at, r.deleted_at
            FROM patient_record r
            LEFT JOIN patient p ON p.patient_id = r.patient_id
            WHERE r.record_id = $1
              AND r.tenant_id = $2
              AND r.deleted_at IS NULL
            "#,
        )
        .bind(record_id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(ScheduledRecord::from))
    }

    async fn insert(&self, new: NewRecord) -> Result<ScheduledRecord, StoreError> {
        let row: RecordRow = sqlx::query_as::<_, RecordRow>(
            r#"
            WITH inserted AS (
              INSERT INTO patient_record (
                tenant_id, owner_id, patient_id, kind, start_at,
                title, description, price_cents, cost_cents, created_by
              )
              VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
              RETURNING *
            )
            SELECT
              i.record_id, i.tenant_id, i.owner_id, i.patient_id,
              p.name AS patient_name,
              i.kind, i.start_at, i.duration_minutes, i.title, i.description,
              i.price_cents, i.cost_cents, i.created_by,
              i.created_at, i.updated_at, i.deleted_at
            FROM inserted i
            LEFT JOIN patient p ON p.patient_id = i.patient_id
            "#,
        )
        .bind(new.scope.tenant_id)
        .bind(new.scope.owner_id)
        .bind(new.patient_id)
        .bind(new.kind)
        .bind(new.start_at)
        .bind(new.title)
        .bind(new.description)
        .bind(new.price.map(Money::cents))
        .bind(new.cost.map(Money::cents))
        .bind(new.created_by)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    async fn update(&self, record: &ScheduledRecord) -> Result<Option<ScheduledRecord>, StoreError> {
        let row: Option<RecordRow> = sqlx::query_as::<_, RecordRow>(
            r#"
            WITH updated AS (
              UPDATE patient_record
              SET
                kind        = $3,
                start_at    = $4,
                title       = $5,
                description = $6,
                price_cents = $7,
                cost_cents  = $8,
                updated_at  = now()
              WHERE record_id = $1
                AND tenant_id = $2
                AND deleted_at IS NULL
              RETURNING *
            )
            SELECT
              u.record_id, u.tenant_id, u.owner_id, u.patient_id,
              p.name AS patient_name,
              u.kind, u.start_at, u.duration_minutes, u.title, u.description,
              u.price_cents, u.cost_cents, u.created_by,
              u.created_at, u.updated_at, u.deleted_at
            FROM updated u
            LEFT JOIN patient p ON p.patient_id = u.patient_id
            "#,
        )
        .bind(record.id)
        .bind(record.tenant_id)
        .bind(record.kind)
        .bind(record.start_at)
        .bind(&record.title)
        .bind(record.description.as_deref())
        .bind(record.price.map(Money::cents))
        .bind(record.cost.map(Money::cents))
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(ScheduledRecord::from))
    }

    async fn soft_delete(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE patient_record
            SET deleted_at = $3, updated_at = $3
            WHERE record_id = $1
              AND tenant_id = $2
              AND deleted_at IS NULL
            "#,
        )
        .bind(record_id)
        .bind(tenant_id)
        .bind(at)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn patient_name(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<String>, StoreError> {
        let name: Option<String> = sqlx::query_scalar(
            r#"
            SELECT name
            FROM patient
            WHERE patient_id = $1
              AND tenant_id  = $2
            "#,
        )
        .bind(patient_id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(name)
    }

    async fn is_doctor_in_tenant(&self, tenant_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
              SELECT 1
              FROM app_user
              WHERE user_id   = $1
                AND tenant_id = $2
                AND role      = $3
                AND is_active = true
            )
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(Role::Doctor)
        .fetch_one(&self.db)
        .await?;

        Ok(found)
    }

    async fn is_assigned(
        &self,
        tenant_id: Uuid,
        secretary_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<bool, StoreError> {
        let assigned: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
              SELECT 1
              FROM secretary_doctor_assignment
              WHERE tenant_id    = $1
                AND secretary_id = $2
                AND doctor_id    = $3
            )
            "#,
        )
        .bind(tenant_id)
        .bind(secretary_id)
        .bind(doctor_id)
        .fetch_one(&self.db)
        .await?;

        Ok(assigned)
    }
}
