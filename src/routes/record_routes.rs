// src/routes/record_routes.rs

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiMessage, ApiOk, AppState},
    schedule::{
        calendar::{CalendarEvent, SlotCalendar},
        error::ScheduleError,
        guard::{Interval, Placement, RejectReason},
        model::{Actor, DateRange, OwnerScope, ScheduledRecord},
        validation::{self, RecordInput, RecordPatch},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/records", post(create_record).get(list_records))
        .route("/records/calendar", get(get_calendar))
        .route("/records/slot-check", post(check_slot))
        .route("/records/{record_id}", put(update_record).delete(delete_record))
        .route("/records/{record_id}/move", post(move_record))
}

/* ============================================================
   Query params
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    // YYYY-MM-DD in clinic local time
    pub start: String,
    pub days: Option<u32>,
    pub owner_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
}

impl ScheduleQuery {
    fn scope(&self, auth: &AuthContext) -> OwnerScope {
        OwnerScope {
            tenant_id: self.tenant_id.unwrap_or(auth.tenant_id),
            owner_id: self.owner_id.unwrap_or(auth.user_id),
        }
    }

    fn range(&self) -> Result<DateRange, ApiError> {
        let days = self.days.unwrap_or(7);
        if !(1..=DateRange::MAX_DAYS).contains(&days) {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                format!("days must be between 1 and {}", DateRange::MAX_DAYS),
            ));
        }
        let start = NaiveDate::parse_from_str(self.start.trim(), "%Y-%m-%d").map_err(|_| {
            ApiError::BadRequest("VALIDATION_ERROR", "start must be YYYY-MM-DD".into())
        })?;
        Ok(DateRange { start, days })
    }
}

/* ============================================================
   POST /records
   ============================================================ */

pub async fn create_record(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<RecordInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiOk<ScheduledRecord>>), ApiError> {
    let Json(input) = payload?;
    let record = state.records.create(&auth.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(ApiOk::new(record))))
}

/* ============================================================
   PUT /records/{id}
   ============================================================ */

pub async fn update_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(record_id): Path<Uuid>,
    payload: Result<Json<RecordPatch>, JsonRejection>,
) -> Result<Json<ApiOk<ScheduledRecord>>, ApiError> {
    let Json(patch) = payload?;
    let record = state.records.update(&auth.actor(), record_id, patch).await?;
    Ok(Json(ApiOk::new(record)))
}

/// Three days around `at`: a slot can straddle midnight.
fn around(at: NaiveDateTime) -> DateRange {
    DateRange {
        start: at.date() - Duration::days(1),
        days: 3,
    }
}

/// Calendar over the target's neighbourhood with `record` focused, whatever
/// day the record itself sits on.
async fn focused_calendar(
    state: &AppState,
    actor: &Actor,
    record: ScheduledRecord,
    target: NaiveDateTime,
) -> Result<SlotCalendar, ApiError> {
    let record_id = record.id;
    let mut records = state.records.list(actor, record.scope(), around(target)).await?;
    if !records.iter().any(|r| r.id == record_id) {
        records.push(record);
    }

    let mut calendar = SlotCalendar::default();
    calendar.load(records);
    calendar
        .activate_record(record_id)
        .ok_or_else(ApiError::not_found)?;
    Ok(calendar)
}

/* ============================================================
   POST /records/{id}/move
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecordRequest {
    pub start_at: Option<String>,
}

/// Drag-and-drop move. The calendar pre-check rejects without writing; the
/// service still re-checks on update.
pub async fn move_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(record_id): Path<Uuid>,
    payload: Result<Json<MoveRecordRequest>, JsonRejection>,
) -> Result<Json<ApiOk<ScheduledRecord>>, ApiError> {
    let Json(req) = payload?;
    let raw_start = req
        .start_at
        .ok_or_else(|| ApiError::BadRequest("VALIDATION_ERROR", "startAt is required".into()))?;
    let new_start = validation::parse_start_at(&raw_start)?;

    let actor = auth.actor();
    let current = state.records.find(&actor, record_id).await?;

    // Unchanged start: only the overlap re-check in `update` applies, as for a PUT.
    let target = if new_start == current.start_at {
        new_start
    } else {
        let mut calendar = focused_calendar(&state, &actor, current, new_start).await?;
        let now = state.records.clock().local_now();
        if let Placement::Rejected(reason) = calendar
            .move_focused_record_to(new_start, now)
            .map_err(|e| ApiError::Internal(e.to_string()))?
        {
            return Err(ScheduleError::Conflict(reason).into());
        }
        calendar
            .confirm_save()
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .proposed_start
    };

    let patch = RecordPatch {
        start_at: Some(target.format("%Y-%m-%dT%H:%M").to_string()),
        ..Default::default()
    };
    let record = state.records.update(&actor, record_id, patch).await?;
    Ok(Json(ApiOk::new(record)))
}

/* ============================================================
   DELETE /records/{id}  (soft)
   ============================================================ */

pub async fn delete_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(record_id): Path<Uuid>,
) -> Result<Json<ApiMessage>, ApiError> {
    state.records.soft_delete(&auth.actor(), record_id).await?;
    Ok(Json(ApiMessage {
        success: true,
        message: "record deactivated".into(),
    }))
}

/* ============================================================
   GET /records
   ============================================================ */

pub async fn list_records(
    State(state): State<AppState>,
    auth: AuthContext,
    query: Result<Query<ScheduleQuery>, QueryRejection>,
) -> Result<Json<ApiOk<Vec<ScheduledRecord>>>, ApiError> {
    let Query(q) = query?;
    let range = q.range()?;
    let records = state.records.list(&auth.actor(), q.scope(&auth), range).await?;
    Ok(Json(ApiOk::new(records)))
}

/* ============================================================
   GET /records/calendar
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct CalendarDto {
    pub badges: BTreeMap<NaiveDate, usize>,
    pub events: Vec<CalendarEvent>,
}

pub async fn get_calendar(
    State(state): State<AppState>,
    auth: AuthContext,
    query: Result<Query<ScheduleQuery>, QueryRejection>,
) -> Result<Json<ApiOk<CalendarDto>>, ApiError> {
    let Query(q) = query?;
    let range = q.range()?;
    let records = state.records.list(&auth.actor(), q.scope(&auth), range).await?;

    let mut calendar = SlotCalendar::default();
    calendar.load(records);

    Ok(Json(ApiOk::new(CalendarDto {
        badges: calendar.day_badge_counts(),
        events: calendar.events(state.records.clock().local_now()),
    })))
}

/* ============================================================
   POST /records/slot-check  (advisory)
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCheckRequest {
    pub owner_id: Option<String>,
    pub start_at: Option<String>,
    pub exclude_record_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SlotCheckDto {
    pub allowed: bool,
    pub reason: Option<RejectReason>,
    pub message: Option<String>,
}

impl From<Placement> for SlotCheckDto {
    fn from(p: Placement) -> Self {
        match p {
            Placement::Allowed => SlotCheckDto {
                allowed: true,
                reason: None,
                message: None,
            },
            Placement::Rejected(reason) => SlotCheckDto {
                allowed: false,
                reason: Some(reason),
                message: Some(reason.to_string()),
            },
        }
    }
}

pub async fn check_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<SlotCheckRequest>, JsonRejection>,
) -> Result<Json<ApiOk<SlotCheckDto>>, ApiError> {
    let Json(req) = payload?;

    let start_at = req
        .start_at
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("VALIDATION_ERROR", "startAt is required".into()))
        .and_then(|raw| validation::parse_start_at(raw).map_err(ApiError::from))?;
    let exclude = req
        .exclude_record_id
        .as_deref()
        .map(|raw| validation::parse_uuid(raw, "excludeRecordId"))
        .transpose()?;

    let actor = auth.actor();
    let now = state.records.clock().local_now();

    let placement = match exclude {
        // The edited record decides the owner.
        Some(record_id) => {
            let record = state.records.find(&actor, record_id).await?;
            let mut calendar = focused_calendar(&state, &actor, record, start_at).await?;
            calendar
                .move_focused_record_to(start_at, now)
                .map_err(|e| ApiError::Internal(e.to_string()))?
        }
        None => {
            let owner_id = match req.owner_id.as_deref() {
                Some(raw) => validation::parse_uuid(raw, "ownerId")?,
                None => auth.user_id,
            };
            let scope = OwnerScope {
                tenant_id: auth.tenant_id,
                owner_id,
            };
            let records = state.records.list(&actor, scope, around(start_at)).await?;

            let mut calendar = SlotCalendar::default();
            calendar.load(records);
            calendar.select_slot(Interval::slot(start_at), now)
        }
    };

    Ok(Json(ApiOk::new(placement.into())))
}
