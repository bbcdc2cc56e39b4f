use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use super::guard::Interval;

/// Every record occupies exactly one slot.
pub const SLOT_MINUTES: i64 = 30;

/// Record kinds (patient_record.kind):
/// 0 treatment, 1 payment, 2 note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum RecordKind {
    Treatment = 0,
    Payment = 1,
    Note = 2,
}

impl RecordKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "TREATMENT" => Some(RecordKind::Treatment),
            "PAYMENT" => Some(RecordKind::Payment),
            "NOTE" => Some(RecordKind::Note),
            _ => None,
        }
    }
}

/// Roles (app_user.role):
/// 1 admin, 2 doctor, 3 secretary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum Role {
    Admin = 1,
    Doctor = 2,
    Secretary = 3,
}

/// Amount in cents. Serialized as a decimal number (`500.0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Money(i64);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// `None` for negative, non-finite or out of range amounts.
    pub fn from_amount(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        let cents = (amount * 100.0).round();
        if cents > i64::MAX as f64 {
            return None;
        }
        Some(Money(cents as i64))
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

/// The caller as resolved by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
}

/// Overlap rules are enforced per (tenant, owner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerScope {
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: Option<String>,
    pub kind: RecordKind,
    /// Clinic local time, minute precision.
    pub start_at: NaiveDateTime,
    pub duration_minutes: i32,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub cost: Option<Money>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ScheduledRecord {
    pub fn interval(&self) -> Interval {
        Interval::new(
            self.start_at,
            self.start_at + Duration::minutes(i64::from(self.duration_minutes)),
        )
    }

    pub fn scope(&self) -> OwnerScope {
        OwnerScope {
            tenant_id: self.tenant_id,
            owner_id: self.owner_id,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Whole days starting at local midnight of `start`: [start, start + days).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub days: u32,
}

impl DateRange {
    pub const MAX_DAYS: u32 = 42;

    pub fn from(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    pub fn to(&self) -> NaiveDateTime {
        self.from() + Duration::days(i64::from(self.days))
    }
}
