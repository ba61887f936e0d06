use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::model::ids::ItemId;
use crate::model::item::MAX_LEVEL;

/// Longitudinal statistics derived from sessions and item records.
///
/// Never mutated directly by callers; the progress aggregator recomputes it.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProgressSummary {
    pub(crate) total_study_time_minutes: u64,
    pub(crate) daily_streak_days: u32,
    pub(crate) last_study_date: Option<NaiveDate>,
    pub(crate) total_words_learned: u32,
    pub(crate) average_accuracy: f64,
    pub(crate) level_distribution: BTreeMap<u8, u32>,
    pub(crate) weak_items: Vec<ItemId>,
}

impl Default for UserProgressSummary {
    fn default() -> Self {
        Self {
            total_study_time_minutes: 0,
            daily_streak_days: 0,
            last_study_date: None,
            total_words_learned: 0,
            average_accuracy: 0.0,
            level_distribution: empty_level_distribution(),
            weak_items: Vec::new(),
        }
    }
}

impl UserProgressSummary {
    /// Rehydrate a summary from persisted storage.
    ///
    /// Accuracy is clamped into `[0, 100]`; levels above the ladder are folded
    /// into the top level and missing levels are filled with zero.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        total_study_time_minutes: u64,
        daily_streak_days: u32,
        last_study_date: Option<NaiveDate>,
        total_words_learned: u32,
        average_accuracy: f64,
        level_distribution: BTreeMap<u8, u32>,
        weak_items: Vec<ItemId>,
    ) -> Self {
        let average_accuracy = if average_accuracy.is_nan() {
            0.0
        } else {
            average_accuracy.clamp(0.0, 100.0)
        };

        let mut levels = empty_level_distribution();
        for (level, count) in level_distribution {
            let slot = levels.entry(level.min(MAX_LEVEL)).or_insert(0);
            *slot = slot.saturating_add(count);
        }

        Self {
            total_study_time_minutes,
            daily_streak_days,
            last_study_date,
            total_words_learned,
            average_accuracy,
            level_distribution: levels,
            weak_items,
        }
    }

    #[must_use]
    pub fn total_study_time_minutes(&self) -> u64 {
        self.total_study_time_minutes
    }

    #[must_use]
    pub fn daily_streak_days(&self) -> u32 {
        self.daily_streak_days
    }

    #[must_use]
    pub fn last_study_date(&self) -> Option<NaiveDate> {
        self.last_study_date
    }

    #[must_use]
    pub fn total_words_learned(&self) -> u32 {
        self.total_words_learned
    }

    /// Mean per-item accuracy in percent.
    #[must_use]
    pub fn average_accuracy(&self) -> f64 {
        self.average_accuracy
    }

    /// Number of tracked items at each ladder level.
    #[must_use]
    pub fn level_distribution(&self) -> &BTreeMap<u8, u32> {
        &self.level_distribution
    }

    /// Reviewed items with low accuracy, weakest first.
    #[must_use]
    pub fn weak_items(&self) -> &[ItemId] {
        &self.weak_items
    }
}

/// Read-only projection returned by `getStudyStats`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudyStats {
    /// Accuracy of the active session in percent, 0 when idle.
    pub accuracy: f64,
    pub streak: u32,
    pub total_time_minutes: u64,
}

pub(crate) fn empty_level_distribution() -> BTreeMap<u8, u32> {
    (0..=MAX_LEVEL).map(|level| (level, 0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_summary_lists_every_level() {
        let summary = UserProgressSummary::default();
        assert_eq!(summary.level_distribution().len(), usize::from(MAX_LEVEL) + 1);
        assert!(summary.level_distribution().values().all(|count| *count == 0));
    }

    #[test]
    fn from_persisted_clamps_accuracy_and_folds_levels() {
        let mut levels = BTreeMap::new();
        levels.insert(1, 2);
        levels.insert(9, 3);
        levels.insert(5, 1);

        let summary =
            UserProgressSummary::from_persisted(10, 2, None, 1, 140.0, levels, Vec::new());

        assert_eq!(summary.average_accuracy(), 100.0);
        assert_eq!(summary.level_distribution()[&1], 2);
        assert_eq!(summary.level_distribution()[&5], 4);
        assert_eq!(summary.level_distribution()[&0], 0);
        assert!(!summary.level_distribution().contains_key(&9));
    }
}
