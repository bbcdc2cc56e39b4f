use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use uuid::Uuid;

use super::audit::{AuditAction, AuditEntry, AuditSink};
use super::clock::Clock;
use super::error::{ScheduleError, StoreError};
use super::guard::{self, Interval, Placement};
use super::model::{Actor, DateRange, OwnerScope, Role, SLOT_MINUTES, ScheduledRecord};
use super::store::{NewRecord, RecordStore};
use super::validation::{self, RecordInput, RecordPatch};

/// The only writer of the record set. Every mutation is
/// validate -> conflict check -> persist -> audit.
pub struct RecordLifecycleService {
    store: Arc<dyn RecordStore>,
    audit: Arc<dyn AuditSink>,
    clock: Clock,
    io_timeout: Duration,
}

impl RecordLifecycleService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        audit: Arc<dyn AuditSink>,
        clock: Clock,
        io_timeout: Duration,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
            io_timeout,
        }
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.io_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.io_timeout))?
    }

    /// Caller is the owner, an admin of the tenant, or a secretary assigned to the owner.
    async fn may_act_for(&self, actor: &Actor, scope: OwnerScope) -> Result<bool, ScheduleError> {
        if actor.tenant_id != scope.tenant_id {
            return Ok(false);
        }
        if actor.user_id == scope.owner_id {
            return Ok(true);
        }
        match actor.role {
            Role::Admin => Ok(true),
            Role::Secretary => Ok(self
                .call(self.store.is_assigned(scope.tenant_id, actor.user_id, scope.owner_id))
                .await?),
            Role::Doctor => Ok(false),
        }
    }

    /// Out-of-scope records are reported exactly like missing ones.
    async fn load_scoped(
        &self,
        actor: &Actor,
        record_id: Uuid,
    ) -> Result<ScheduledRecord, ScheduleError> {
        let record = self
            .call(self.store.find_active(actor.tenant_id, record_id))
            .await?
            .ok_or(ScheduleError::NotFound)?;

        if !self.may_act_for(actor, record.scope()).await? {
            return Err(ScheduleError::NotFound);
        }
        Ok(record)
    }

    /// Live intervals that could touch `candidate`, minus `exclude`.
    /// Every record spans one slot, so only starts in
    /// (candidate.start - slot, candidate.end) matter.
    async fn neighbours(
        &self,
        scope: OwnerScope,
        candidate: Interval,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Interval>, ScheduleError> {
        let from = candidate.start - ChronoDuration::minutes(SLOT_MINUTES);
        let records = self
            .call(self.store.list_active(scope, from, candidate.end))
            .await?;
        Ok(records
            .iter()
            .filter(|r| Some(r.id) != exclude)
            .map(ScheduledRecord::interval)
            .collect())
    }

    fn reject(scope: OwnerScope, placement: Placement) -> Result<(), ScheduleError> {
        match placement {
            Placement::Allowed => Ok(()),
            Placement::Rejected(reason) => {
                tracing::warn!(
                    tenant_id = %scope.tenant_id,
                    owner_id = %scope.owner_id,
                    ?reason,
                    "slot rejected"
                );
                Err(ScheduleError::Conflict(reason))
            }
        }
    }

    /// Best-effort: a failed append is logged, never surfaced.
    async fn record_audit(&self, entry: Option<AuditEntry>) {
        let Some(entry) = entry else { return };
        if let Err(e) = self.call(self.audit.append(&entry)).await {
            tracing::error!(
                record_id = %entry.record_id,
                action = entry.action.as_str(),
                error = %e,
                "audit append failed"
            );
        }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        input: RecordInput,
    ) -> Result<ScheduledRecord, ScheduleError> {
        let valid = validation::validate_create(input, actor)?;
        let scope = OwnerScope {
            tenant_id: valid.tenant_id,
            owner_id: valid.owner_id,
        };

        if valid.tenant_id != actor.tenant_id {
            return Err(ScheduleError::Authorization(
                "You cannot create records for another clinic".into(),
            ));
        }
        if !self.may_act_for(actor, scope).await? {
            return Err(ScheduleError::Authorization(
                "You cannot create records for this doctor".into(),
            ));
        }

        if !self
            .call(self.store.is_doctor_in_tenant(scope.tenant_id, scope.owner_id))
            .await?
        {
            return Err(ScheduleError::validation("owner is not a doctor in this clinic"));
        }

        self.call(self.store.patient_name(scope.tenant_id, valid.patient_id))
            .await?
            .ok_or_else(|| ScheduleError::validation("patient not found in this clinic"))?;

        let candidate = Interval::slot(valid.start_at);
        let existing = self.neighbours(scope, candidate, None).await?;
        Self::reject(
            scope,
            guard::can_place(candidate, &existing, self.clock.local_now()),
        )?;

        let record = self
            .call(self.store.insert(NewRecord {
                scope,
                patient_id: valid.patient_id,
                kind: valid.kind,
                start_at: valid.start_at,
                title: valid.title,
                description: valid.description,
                price: valid.price,
                cost: valid.cost,
                created_by: actor.user_id,
            }))
            .await?;

        tracing::info!(record_id = %record.id, owner_id = %record.owner_id, "record created");
        self.record_audit(AuditEntry::new(
            AuditAction::Create,
            actor,
            None,
            Some(&record),
            self.clock.now_utc(),
        ))
        .await;

        Ok(record)
    }

    /// A record that keeps its start time is only checked for overlap, so
    /// past records stay editable; a moved record must pass the full guard.
    pub async fn update(
        &self,
        actor: &Actor,
        record_id: Uuid,
        patch: RecordPatch,
    ) -> Result<ScheduledRecord, ScheduleError> {
        let patch = validation::validate_patch(patch)?;
        let current = self.load_scoped(actor, record_id).await?;

        let mut next = current.clone();
        patch.apply(&mut next)?;

        let scope = current.scope();
        let candidate = next.interval();
        let existing = self.neighbours(scope, candidate, Some(record_id)).await?;
        let placement = if next.start_at != current.start_at {
            guard::can_place(candidate, &existing, self.clock.local_now())
        } else {
            guard::check_overlap(candidate, &existing)
        };
        Self::reject(scope, placement)?;

        let updated = self
            .call(self.store.update(&next))
            .await?
            .ok_or(ScheduleError::NotFound)?;

        tracing::info!(record_id = %updated.id, "record updated");
        self.record_audit(AuditEntry::new(
            AuditAction::Update,
            actor,
            Some(&current),
            Some(&updated),
            self.clock.now_utc(),
        ))
        .await;

        Ok(updated)
    }

    pub async fn soft_delete(&self, actor: &Actor, record_id: Uuid) -> Result<(), ScheduleError> {
        let current = self.load_scoped(actor, record_id).await?;

        let at = self.clock.now_utc();
        let deleted = self
            .call(self.store.soft_delete(current.tenant_id, record_id, at))
            .await?;
        if !deleted {
            return Err(ScheduleError::NotFound);
        }

        tracing::info!(%record_id, "record soft-deleted");
        self.record_audit(AuditEntry::new(
            AuditAction::Delete,
            actor,
            Some(&current),
            None,
            at,
        ))
        .await;

        Ok(())
    }

    /// One live record the caller may act on.
    pub async fn find(
        &self,
        actor: &Actor,
        record_id: Uuid,
    ) -> Result<ScheduledRecord, ScheduleError> {
        self.load_scoped(actor, record_id).await
    }

    /// Live records of one owner in `range`, ordered by start.
    pub async fn list(
        &self,
        actor: &Actor,
        scope: OwnerScope,
        range: DateRange,
    ) -> Result<Vec<ScheduledRecord>, ScheduleError> {
        if !self.may_act_for(actor, scope).await? {
            return Err(ScheduleError::Authorization(
                "You do not have permission to view this schedule".into(),
            ));
        }
        Ok(self
            .call(self.store.list_active(scope, range.from(), range.to()))
            .await?)
    }
}
