use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

/// Source of "now" for the engine. Tests pin it and move it by hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    /// Wall-clock time.
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }

    /// Calendar date of `now()` at the given UTC offset. Streaks count these
    /// dates, so the same instant can fall on different days per offset.
    #[must_use]
    pub fn today(&self, offset: FixedOffset) -> NaiveDate {
        self.now().with_timezone(&offset).date_naive()
    }

    /// Move a fixed clock forward; the system clock cannot be moved.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(at) = self {
            *at += delta;
        }
    }
}

/// 2023-11-14T22:13:20Z, a stable instant for tests and doc examples.
///
/// # Panics
///
/// Never in practice; the timestamp is a constant well inside chrono's range.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("constant timestamp is in range")
}

#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
