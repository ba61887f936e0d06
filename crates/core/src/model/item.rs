use chrono::{DateTime, Utc};

use crate::model::ids::ItemId;

/// Highest level on the interval ladder.
pub const MAX_LEVEL: u8 = 5;
/// Lower bound of the ease factor.
pub const MIN_EASE: f64 = 1.3;
/// Upper bound of the ease factor, also the starting value.
pub const MAX_EASE: f64 = 2.5;
pub const DEFAULT_EASE: f64 = MAX_EASE;

/// Spaced-repetition record of a single tracked item.
///
/// Invariants held by every constructor and mutation:
/// - `level <= MAX_LEVEL`
/// - `MIN_EASE <= ease_factor <= MAX_EASE`
/// - `next_review_at >= last_reviewed_at` whenever the item has been reviewed
#[derive(Debug, Clone, PartialEq)]
pub struct LearningItem {
    id: ItemId,
    level: u8,
    ease_factor: f64,
    next_review_at: DateTime<Utc>,
    last_reviewed_at: Option<DateTime<Utc>>,
    correct_count: u32,
    incorrect_count: u32,
}

impl LearningItem {
    /// Fresh item on first exposure: level 0, full ease, due immediately.
    #[must_use]
    pub fn new(id: ItemId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            level: 0,
            ease_factor: DEFAULT_EASE,
            next_review_at: now,
            last_reviewed_at: None,
            correct_count: 0,
            incorrect_count: 0,
        }
    }

    /// Rehydrate an item from persisted storage.
    ///
    /// Values outside their bounds (from migrations or hand edits) are clamped
    /// to the nearest valid bound instead of being rejected.
    #[must_use]
    pub fn from_persisted(
        id: ItemId,
        level: i64,
        ease_factor: f64,
        next_review_at: DateTime<Utc>,
        last_reviewed_at: Option<DateTime<Utc>>,
        correct_count: u32,
        incorrect_count: u32,
    ) -> Self {
        let clamped_level = clamp_level(level);
        if i64::from(clamped_level) != level {
            tracing::warn!(item = %id, level, "persisted level out of range, clamped to {clamped_level}");
        }

        let clamped_ease = clamp_ease(ease_factor);
        if clamped_ease.to_bits() != ease_factor.to_bits() {
            tracing::warn!(item = %id, ease_factor, "persisted ease out of range, clamped to {clamped_ease}");
        }

        let next_review_at = match last_reviewed_at {
            Some(last) if next_review_at < last => {
                tracing::warn!(item = %id, "next review precedes last review, lifted to last review");
                last
            }
            _ => next_review_at,
        };

        Self {
            id,
            level: clamped_level,
            ease_factor: clamped_ease,
            next_review_at,
            last_reviewed_at,
            correct_count,
            incorrect_count,
        }
    }

    pub(crate) fn apply_review(
        &mut self,
        correct: bool,
        level: u8,
        ease_factor: f64,
        reviewed_at: DateTime<Utc>,
        next_review_at: DateTime<Utc>,
    ) {
        self.level = level.min(MAX_LEVEL);
        self.ease_factor = clamp_ease(ease_factor);
        self.last_reviewed_at = Some(reviewed_at);
        self.next_review_at = next_review_at.max(reviewed_at);
        if correct {
            self.correct_count = self.correct_count.saturating_add(1);
        } else {
            self.incorrect_count = self.incorrect_count.saturating_add(1);
        }
    }

    #[must_use]
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    #[must_use]
    pub fn ease_factor(&self) -> f64 {
        self.ease_factor
    }

    #[must_use]
    pub fn next_review_at(&self) -> DateTime<Utc> {
        self.next_review_at
    }

    #[must_use]
    pub fn last_reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.last_reviewed_at
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.incorrect_count
    }

    #[must_use]
    pub fn review_count(&self) -> u64 {
        u64::from(self.correct_count) + u64::from(self.incorrect_count)
    }

    /// Fraction of correct answers in `[0, 1]`, or `None` if never reviewed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy(&self) -> Option<f64> {
        let total = self.review_count();
        if total == 0 {
            None
        } else {
            Some(self.correct_count as f64 / total as f64)
        }
    }

    #[must_use]
    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.next_review_at <= as_of
    }
}

#[must_use]
pub fn clamp_level(level: i64) -> u8 {
    // Bounded to 0..=MAX_LEVEL, so the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let level = level.clamp(0, i64::from(MAX_LEVEL)) as u8;
    level
}

/// Clamp an ease factor into bounds; non-finite values fall back to the default.
#[must_use]
pub fn clamp_ease(ease: f64) -> f64 {
    if ease.is_nan() {
        DEFAULT_EASE
    } else {
        ease.clamp(MIN_EASE, MAX_EASE)
    }
}
