use chrono::NaiveDate;
use std::cmp::Ordering;

use crate::model::{
    CompletedSession, ItemId, LearningItem, StudyStats, UserProgressSummary,
    empty_level_distribution,
};
use crate::tracker::SessionTracker;

/// Accuracy at or above which an item counts as learned.
pub const MASTERY_THRESHOLD: f64 = 0.8;

/// Accuracy below which a reviewed item is listed as weak.
pub const WEAK_THRESHOLD: f64 = 0.6;

/// Maximum number of weak items kept in the summary.
pub const WEAK_ITEMS_LIMIT: usize = 20;

/// Derives the user progress summary from completed sessions and item records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressAggregator {
    summary: UserProgressSummary,
}

impl ProgressAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_summary(summary: UserProgressSummary) -> Self {
        Self { summary }
    }

    #[must_use]
    pub fn summary(&self) -> &UserProgressSummary {
        &self.summary
    }

    /// Fold a finished session into study time and the daily streak.
    ///
    /// `today` is a calendar date: two sessions on the same date never extend
    /// the streak, a session on the day after `last_study_date` does, and any
    /// other gap starts over at 1.
    pub fn on_session_completed(&mut self, session: &CompletedSession, today: NaiveDate) {
        let summary = &mut self.summary;
        summary.total_study_time_minutes = summary
            .total_study_time_minutes
            .saturating_add(u64::from(session.duration_minutes));

        summary.daily_streak_days = next_streak(summary.daily_streak_days, summary.last_study_date, today);
        summary.last_study_date = Some(today);

        tracing::debug!(
            minutes = session.duration_minutes,
            streak = summary.daily_streak_days,
            %today,
            "session folded into progress"
        );
    }

    /// Recompute every item-derived statistic from scratch.
    pub fn on_items_changed<'a, I>(&mut self, items: I)
    where
        I: IntoIterator<Item = &'a LearningItem>,
    {
        let mut learned = 0_u32;
        let mut accuracy_sum = 0.0_f64;
        let mut reviewed = 0_u32;
        let mut levels = empty_level_distribution();
        let mut weak: Vec<(f64, ItemId)> = Vec::new();

        for item in items {
            *levels.entry(item.level()).or_insert(0) += 1;

            let Some(accuracy) = item.accuracy() else {
                continue;
            };
            reviewed += 1;
            accuracy_sum += accuracy * 100.0;
            if accuracy >= MASTERY_THRESHOLD {
                learned += 1;
            }
            if accuracy < WEAK_THRESHOLD {
                weak.push((accuracy, item.id().clone()));
            }
        }

        weak.sort_by(|(a_acc, a_id), (b_acc, b_id)| {
            a_acc
                .partial_cmp(b_acc)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a_id.cmp(b_id))
        });
        weak.truncate(WEAK_ITEMS_LIMIT);

        let summary = &mut self.summary;
        summary.total_words_learned = learned;
        summary.average_accuracy = if reviewed == 0 {
            0.0
        } else {
            accuracy_sum / f64::from(reviewed)
        };
        summary.level_distribution = levels;
        summary.weak_items = weak.into_iter().map(|(_, id)| id).collect();
    }

    /// Projection of the summary and the active session for display.
    #[must_use]
    pub fn study_stats(&self, tracker: &SessionTracker) -> StudyStats {
        StudyStats {
            accuracy: tracker.accuracy(),
            streak: self.summary.daily_streak_days,
            total_time_minutes: self.summary.total_study_time_minutes,
        }
    }

    pub fn reset(&mut self) {
        self.summary = UserProgressSummary::default();
    }
}

fn next_streak(current: u32, last_study_date: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_study_date {
        Some(last) if last == today => current,
        Some(last) if last.succ_opt() == Some(today) => current.saturating_add(1),
        _ => 1,
    }
}
