//! Schema step between loosely typed request bodies and the service.
//!
//! Nothing past this module sees an unchecked field.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use super::error::ScheduleError;
use super::model::{Actor, Money, RecordKind, SLOT_MINUTES, ScheduledRecord};

const TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInput {
    pub owner_id: Option<String>,
    pub tenant_id: Option<String>,
    pub patient_id: Option<String>,
    pub kind: Option<String>,
    pub start_at: Option<String>,
    pub duration_minutes: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub cost: Option<f64>,
}

fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Only called when the field is present: null => Some(None), value => Some(Some(v)).
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

/// Absent fields are kept; explicit `null` clears the optional ones.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    pub kind: Option<String>,
    pub start_at: Option<String>,
    pub duration_minutes: Option<i64>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub price: Option<Option<f64>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub cost: Option<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub patient_id: Uuid,
    pub kind: RecordKind,
    pub start_at: NaiveDateTime,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub cost: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedPatch {
    pub kind: Option<RecordKind>,
    pub start_at: Option<NaiveDateTime>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub price: Option<Option<Money>>,
    pub cost: Option<Option<Money>>,
}

impl ValidatedPatch {
    /// Merge onto `record` and check the cross-field rules of the result.
    pub fn apply(self, record: &mut ScheduledRecord) -> Result<(), ScheduleError> {
        if let Some(kind) = self.kind {
            record.kind = kind;
        }
        if let Some(start_at) = self.start_at {
            record.start_at = start_at;
        }
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(price) = self.price {
            record.price = price;
        }
        if let Some(cost) = self.cost {
            record.cost = cost;
        }
        check_treatment_price(record.kind, record.price)
    }
}

pub fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, ScheduleError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ScheduleError::validation(format!("{field} must be a valid id")))
}

fn parse_kind(raw: &str) -> Result<RecordKind, ScheduleError> {
    RecordKind::parse(raw)
        .ok_or_else(|| ScheduleError::validation("kind must be TREATMENT, PAYMENT or NOTE"))
}

/// `YYYY-MM-DDTHH:MM[:SS]`, minute precision.
pub fn parse_start_at(raw: &str) -> Result<NaiveDateTime, ScheduleError> {
    let raw = raw.trim();
    let start_at = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| ScheduleError::validation("startAt must be YYYY-MM-DDTHH:MM"))?;

    if start_at.second() != 0 || start_at.nanosecond() != 0 {
        return Err(ScheduleError::validation("startAt must have minute precision"));
    }
    Ok(start_at)
}

fn check_duration(duration: Option<i64>) -> Result<(), ScheduleError> {
    match duration {
        Some(d) if d != SLOT_MINUTES => Err(ScheduleError::validation(format!(
            "durationMinutes must be {SLOT_MINUTES}"
        ))),
        _ => Ok(()),
    }
}

fn clean_title(raw: &str) -> Result<String, ScheduleError> {
    let title = raw.trim();
    let len = title.chars().count();
    if len < TITLE_MIN {
        return Err(ScheduleError::validation(format!(
            "title must be at least {TITLE_MIN} characters"
        )));
    }
    if len > TITLE_MAX {
        return Err(ScheduleError::validation(format!(
            "title is too long (max {TITLE_MAX})"
        )));
    }
    Ok(title.to_string())
}

fn clean_description(raw: Option<String>) -> Result<Option<String>, ScheduleError> {
    let Some(raw) = raw else { return Ok(None) };
    let description = raw.trim();
    if description.is_empty() {
        return Ok(None);
    }
    if description.chars().count() > DESCRIPTION_MAX {
        return Err(ScheduleError::validation(format!(
            "description is too long (max {DESCRIPTION_MAX})"
        )));
    }
    Ok(Some(description.to_string()))
}

fn parse_money(amount: Option<f64>, field: &str) -> Result<Option<Money>, ScheduleError> {
    amount
        .map(|a| {
            Money::from_amount(a)
                .ok_or_else(|| ScheduleError::validation(format!("{field} must be a non-negative amount")))
        })
        .transpose()
}

pub fn check_treatment_price(kind: RecordKind, price: Option<Money>) -> Result<(), ScheduleError> {
    if kind == RecordKind::Treatment && price.is_none_or(Money::is_zero) {
        return Err(ScheduleError::validation("price required for TREATMENT"));
    }
    Ok(())
}

/// Owner and tenant default to the caller when omitted.
pub fn validate_create(input: RecordInput, actor: &Actor) -> Result<ValidatedRecord, ScheduleError> {
    let tenant_id = match input.tenant_id.as_deref() {
        Some(raw) => parse_uuid(raw, "tenantId")?,
        None => actor.tenant_id,
    };
    let owner_id = match input.owner_id.as_deref() {
        Some(raw) => parse_uuid(raw, "ownerId")?,
        None => actor.user_id,
    };
    let patient_id = input
        .patient_id
        .as_deref()
        .ok_or_else(|| ScheduleError::validation("patientId is required"))
        .and_then(|raw| parse_uuid(raw, "patientId"))?;
    let kind = input
        .kind
        .as_deref()
        .ok_or_else(|| ScheduleError::validation("kind is required"))
        .and_then(parse_kind)?;
    let start_at = input
        .start_at
        .as_deref()
        .ok_or_else(|| ScheduleError::validation("startAt is required"))
        .and_then(parse_start_at)?;
    check_duration(input.duration_minutes)?;
    let title = input
        .title
        .as_deref()
        .ok_or_else(|| ScheduleError::validation("title is required"))
        .and_then(clean_title)?;
    let description = clean_description(input.description)?;
    let price = parse_money(input.price, "price")?;
    let cost = parse_money(input.cost, "cost")?;

    check_treatment_price(kind, price)?;

    Ok(ValidatedRecord {
        tenant_id,
        owner_id,
        patient_id,
        kind,
        start_at,
        title,
        description,
        price,
        cost,
    })
}

pub fn validate_patch(patch: RecordPatch) -> Result<ValidatedPatch, ScheduleError> {
    check_duration(patch.duration_minutes)?;
    Ok(ValidatedPatch {
        kind: patch.kind.as_deref().map(parse_kind).transpose()?,
        start_at: patch.start_at.as_deref().map(parse_start_at).transpose()?,
        title: patch.title.as_deref().map(clean_title).transpose()?,
        description: patch.description.map(clean_description).transpose()?,
        price: patch.price.map(|p| parse_money(p, "price")).transpose()?,
        cost: patch.cost.map(|c| parse_money(c, "cost")).transpose()?,
    })
}
