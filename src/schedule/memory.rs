//! In-process collaborators for tests. Same contracts as the Postgres ones,
//! including the per-owner exclusion rule.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use super::audit::{AuditEntry, AuditSink};
use super::error::StoreError;
use super::model::{OwnerScope, SLOT_MINUTES, ScheduledRecord};
use super::store::{NewRecord, RecordStore};

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<Vec<ScheduledRecord>>,
    patients: Mutex<HashMap<(Uuid, Uuid), String>>,
    assignments: Mutex<HashSet<(Uuid, Uuid, Uuid)>>,
    doctors: Mutex<HashSet<(Uuid, Uuid)>>,
    offline: Mutex<bool>,
}

impl InMemoryRecordStore {
    pub fn add_patient(&self, tenant_id: Uuid, patient_id: Uuid, name: &str) {
        self.patients
            .lock()
            .unwrap()
            .insert((tenant_id, patient_id), name.to_string());
    }

    pub fn add_doctor(&self, tenant_id: Uuid, user_id: Uuid) {
        self.doctors.lock().unwrap().insert((tenant_id, user_id));
    }

    pub fn assign(&self, tenant_id: Uuid, secretary_id: Uuid, doctor_id: Uuid) {
        self.assignments
            .lock()
            .unwrap()
            .insert((tenant_id, secretary_id, doctor_id));
    }

    /// Every call fails with a backend error while set.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    /// Includes soft-deleted rows.
    pub fn raw(&self, record_id: Uuid) -> Option<ScheduledRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == record_id)
            .cloned()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if *self.offline.lock().unwrap() {
            return Err(StoreError::Backend(sqlx::Error::PoolClosed));
        }
        Ok(())
    }

    fn slot_taken(records: &[ScheduledRecord], candidate: &ScheduledRecord) -> bool {
        records.iter().any(|r| {
            r.id != candidate.id
                && !r.is_deleted()
                && r.scope() == candidate.scope()
                && r.interval().overlaps(&candidate.interval())
        })
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_active(
        &self,
        scope: OwnerScope,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<ScheduledRecord>, StoreError> {
        self.check_online()?;
        let mut out: Vec<ScheduledRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                !r.is_deleted() && r.scope() == scope && r.start_at >= from && r.start_at < to
            })
            .cloned()
            .collect();
        out.sort_by_key(|r| r.start_at);
        Ok(out)
    }

    async fn find_active(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<ScheduledRecord>, StoreError> {
        self.check_online()?;
        Ok(self
            .raw(record_id)
            .filter(|r| r.tenant_id == tenant_id && !r.is_deleted()))
    }

    async fn insert(&self, new: NewRecord) -> Result<ScheduledRecord, StoreError> {
        self.check_online()?;
        let now = Utc::now();
        let patient_name = self
            .patients
            .lock()
            .unwrap()
            .get(&(new.scope.tenant_id, new.patient_id))
            .cloned();
        let record = ScheduledRecord {
            id: Uuid::new_v4(),
            tenant_id: new.scope.tenant_id,
            owner_id: new.scope.owner_id,
            patient_id: new.patient_id,
            patient_name,
            kind: new.kind,
            start_at: new.start_at,
            duration_minutes: SLOT_MINUTES as i32,
            title: new.title,
            description: new.description,
            price: new.price,
            cost: new.cost,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let mut records = self.records.lock().unwrap();
        if Self::slot_taken(&records, &record) {
            return Err(StoreError::SlotTaken);
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, record: &ScheduledRecord) -> Result<Option<ScheduledRecord>, StoreError> {
        self.check_online()?;
        let mut records = self.records.lock().unwrap();
        if Self::slot_taken(&records, record) {
            return Err(StoreError::SlotTaken);
        }
        let Some(stored) = records
            .iter_mut()
            .find(|r| r.id == record.id && r.tenant_id == record.tenant_id && !r.is_deleted())
        else {
            return Ok(None);
        };
        stored.kind = record.kind;
        stored.start_at = record.start_at;
        stored.title = record.title.clone();
        stored.description = record.description.clone();
        stored.price = record.price;
        stored.cost = record.cost;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn soft_delete(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check_online()?;
        let mut records = self.records.lock().unwrap();
        match records
            .iter_mut()
            .find(|r| r.id == record_id && r.tenant_id == tenant_id && !r.is_deleted())
        {
            Some(r) => {
                r.deleted_at = Some(at);
                r.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn patient_name(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<String>, StoreError> {
        self.check_online()?;
        Ok(self
            .patients
            .lock()
            .unwrap()
            .get(&(tenant_id, patient_id))
            .cloned())
    }

    async fn is_doctor_in_tenant(&self, tenant_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.check_online()?;
        Ok(self.doctors.lock().unwrap().contains(&(tenant_id, user_id)))
    }

    async fn is_assigned(
        &self,
        tenant_id: Uuid,
        secretary_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<bool, StoreError> {
        self.check_online()?;
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .contains(&(tenant_id, secretary_id, doctor_id)))
    }
}

#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    failing: bool,
}

impl InMemoryAuditSink {
    pub fn failing() -> Self {
        InMemoryAuditSink {
            entries: Mutex::default(),
            failing: true,
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        if self.failing {
            return Err(StoreError::Backend(sqlx::Error::Protocol("audit table unavailable".into())));
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
