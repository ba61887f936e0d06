use chrono::{DateTime, Duration, Utc};

use crate::model::{ItemId, LearningItem, MAX_EASE, MAX_LEVEL, MIN_EASE, clamp_ease};
use crate::registry::ItemRegistry;

//
// ─── CONSTANTS ─────────────────────────────────────────────────────────────────
//

/// Base review interval in days for each level.
pub const INTERVALS: [u32; 6] = [1, 3, 7, 14, 30, 90];

/// Ease gained on a correct answer.
pub const EASE_BONUS: f64 = 0.1;

/// Ease lost on an incorrect answer.
pub const EASE_PENALTY: f64 = 0.2;

//
// ─── TRANSITIONS ───────────────────────────────────────────────────────────────
//

/// Level after an answer: one step up (capped) when correct, back to 0 otherwise.
#[must_use]
pub fn next_level(level: u8, correct: bool) -> u8 {
    if correct {
        level.saturating_add(1).min(MAX_LEVEL)
    } else {
        0
    }
}

/// Ease after an answer, bounded to `[MIN_EASE, MAX_EASE]`.
///
/// The result is kept at two decimal places so that repeated 0.1/0.2 steps
/// land on the same values regardless of the path taken.
#[must_use]
pub fn next_ease(ease: f64, correct: bool) -> f64 {
    let adjusted = if correct {
        (ease + EASE_BONUS).min(MAX_EASE)
    } else {
        (ease - EASE_PENALTY).max(MIN_EASE)
    };
    clamp_ease((adjusted * 100.0).round() / 100.0)
}

/// Review interval in whole days: `round_half_up(INTERVALS[level] * ease)`, at least 1.
///
/// ```
/// # use recall_core::scheduler::interval_days;
/// assert_eq!(interval_days(1, 2.5), 8);
/// assert_eq!(interval_days(0, 2.4), 2);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn interval_days(level: u8, ease: f64) -> u32 {
    let base = INTERVALS[usize::from(level.min(MAX_LEVEL))];
    let scaled = f64::from(base) * clamp_ease(ease);
    // Bounded by 90 * MAX_EASE, well inside u32.
    let rounded = (scaled + 0.5).floor() as u32;
    rounded.max(1)
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Result of recording one answer against an item.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    /// The item record after the answer was applied.
    pub item: LearningItem,
    pub interval_days: u32,
    /// `true` when the item was not tracked before this answer.
    pub created: bool,
}

/// Fixed-ladder spaced repetition scheduler.
///
/// Owns the item registry and applies the level/ease state machine to it.
/// Every method takes the current instant explicitly, so the scheduler
/// itself never reads a clock.
///
/// # Examples
///
/// ```
/// # use recall_core::scheduler::Scheduler;
/// # use recall_core::model::ItemId;
/// # use chrono::Duration;
/// let mut scheduler = Scheduler::new();
/// let now = recall_core::time::fixed_now();
///
/// let outcome = scheduler.record_answer(ItemId::from("w1"), true, now);
/// assert_eq!(outcome.item.level(), 1);
/// assert_eq!(outcome.item.next_review_at(), now + Duration::days(8));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scheduler {
    registry: ItemRegistry,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_registry(registry: ItemRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ItemRegistry {
        &mut self.registry
    }

    /// Start tracking `id`; a no-op if it is already tracked.
    pub fn add_item(&mut self, id: ItemId, now: DateTime<Utc>) -> bool {
        let added = self.registry.add_item(id, now);
        if added {
            tracing::debug!("item added to review queue");
        }
        added
    }

    /// Apply a correct/incorrect answer, creating the item first if needed.
    pub fn record_answer(&mut self, id: ItemId, correct: bool, now: DateTime<Utc>) -> AnswerOutcome {
        let (item, created) = self.registry.get_or_create(id, now);

        let level = next_level(item.level(), correct);
        let ease = next_ease(item.ease_factor(), correct);
        let days = interval_days(level, ease);
        let next_review_at = now + Duration::days(i64::from(days));

        item.apply_review(correct, level, ease, now, next_review_at);
        tracing::debug!(
            item = %item.id(),
            correct,
            level,
            ease,
            interval_days = days,
            "answer recorded"
        );

        AnswerOutcome {
            item: item.clone(),
            interval_days: days,
            created,
        }
    }

    /// Ids of all items with `next_review_at <= as_of`, in id order.
    #[must_use]
    pub fn due_items(&self, as_of: DateTime<Utc>) -> Vec<ItemId> {
        self.registry
            .all_items()
            .filter(|item| item.is_due(as_of))
            .map(|item| item.id().clone())
            .collect()
    }

    #[must_use]
    pub fn due_count(&self, as_of: DateTime<Utc>) -> usize {
        self.registry
            .all_items()
            .filter(|item| item.is_due(as_of))
            .count()
    }

    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&LearningItem> {
        self.registry.get(id)
    }

    pub fn remove_item(&mut self, id: &ItemId) -> Option<LearningItem> {
        self.registry.remove(id)
    }

    pub fn clear(&mut self) {
        self.registry.clear();
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
