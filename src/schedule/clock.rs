use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// Wall clock in clinic local time. Record start times carry no offset,
/// so "now" must be shifted the same way before comparing.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    offset: FixedOffset,
    frozen: Option<DateTime<Utc>>,
}

impl Clock {
    pub fn system(offset: FixedOffset) -> Self {
        Clock {
            offset,
            frozen: None,
        }
    }

    #[cfg(test)]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Clock {
            offset: FixedOffset::east_opt(0).expect("zero offset"),
            frozen: Some(at),
        }
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        self.frozen.unwrap_or_else(Utc::now)
    }

    pub fn local_now(&self) -> NaiveDateTime {
        self.now_utc().with_timezone(&self.offset).naive_local()
    }
}
