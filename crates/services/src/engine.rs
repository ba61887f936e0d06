use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use recall_core::model::{
    CompletedSession, EngineSnapshot, ItemId, LearningItem, SessionType, StudySession, StudyStats,
    UserProgressSummary,
};
use recall_core::{AnswerOutcome, Clock, ItemRegistry, ProgressAggregator, Scheduler, SessionTracker};
use recall_storage::{StateRepository, Storage, load_or_default};

use crate::config::EngineConfig;
use crate::error::{EngineError, PersistError};
use crate::persistence::PersistenceGateway;

/// The engine facade: item scheduling, the active study session and the
/// derived progress summary, persisted after every mutation.
///
/// Every method completes synchronously against in-memory state; durable
/// writes happen on a background task and never delay the caller.
#[derive(Debug)]
pub struct StudyEngine {
    config: EngineConfig,
    clock: Clock,
    scheduler: Scheduler,
    tracker: SessionTracker,
    progress: ProgressAggregator,
    persistence: PersistenceGateway,
}

impl StudyEngine {
    /// Open the backend named by `config` and restore its saved state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the configuration is invalid or the backend
    /// cannot be opened. An unreadable document is not an error; the engine
    /// starts fresh.
    pub async fn open(config: EngineConfig, clock: Clock) -> Result<Self, EngineError> {
        config.validate()?;
        let storage = Storage::open(&config.storage).await?;
        Self::with_repository(config, clock, storage.state).await
    }

    /// Restore state from an explicit repository.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the configuration is invalid or no tokio
    /// runtime is available for the writer task.
    pub async fn with_repository(
        config: EngineConfig,
        clock: Clock,
        repo: Arc<dyn StateRepository>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let snapshot = load_or_default(repo.as_ref()).await;
        let persistence = PersistenceGateway::spawn(repo)?;
        let engine = Self::from_parts(config, clock, snapshot, persistence);
        tracing::info!(
            items = engine.scheduler.registry().len(),
            backend = %engine.config.storage.url,
            "study engine opened"
        );
        Ok(engine)
    }

    /// An engine whose state lives only as long as the value.
    #[must_use]
    pub fn in_memory(config: EngineConfig, clock: Clock) -> Self {
        Self::from_parts(
            config,
            clock,
            EngineSnapshot::default(),
            PersistenceGateway::detached(),
        )
    }

    fn from_parts(
        config: EngineConfig,
        clock: Clock,
        snapshot: EngineSnapshot,
        persistence: PersistenceGateway,
    ) -> Self {
        let scheduler = Scheduler::with_registry(ItemRegistry::from_items(snapshot.items.into_values()));
        let mut progress = ProgressAggregator::with_summary(snapshot.progress);
        // derived fields are never trusted from disk
        progress.on_items_changed(scheduler.registry().all_items());

        Self {
            config,
            clock,
            scheduler,
            tracker: SessionTracker::new(),
            progress,
            persistence,
        }
    }

    //
    // ─── ITEMS ─────────────────────────────────────────────────────────────────
    //

    /// Start tracking `id`; returns `false` if it was already tracked.
    pub fn add_item(&mut self, id: impl Into<ItemId>) -> bool {
        let now = self.clock.now();
        let created = self.scheduler.add_item(id.into(), now);
        if created {
            self.items_changed();
        }
        created
    }

    /// Track every id not already present; returns how many were added.
    pub fn add_all_items<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<ItemId>,
    {
        let now = self.clock.now();
        let added = self.scheduler.registry_mut().add_all_items(ids, now);
        if added > 0 {
            self.items_changed();
        }
        added
    }

    /// Grade one answer for `id`, creating the item if needed.
    pub fn record_answer(&mut self, id: impl Into<ItemId>, correct: bool) -> AnswerOutcome {
        let now = self.clock.now();
        let outcome = self.scheduler.record_answer(id.into(), correct, now);
        self.items_changed();
        outcome
    }

    /// Grade an answer and count it toward the current session.
    pub fn review(&mut self, id: impl Into<ItemId>, correct: bool) -> AnswerOutcome {
        let outcome = self.record_answer(id, correct);
        self.session_record_answer(correct);
        outcome
    }

    /// Items due now, in id order.
    #[must_use]
    pub fn due_items(&self) -> Vec<ItemId> {
        self.due_items_at(self.clock.now())
    }

    #[must_use]
    pub fn due_items_at(&self, as_of: DateTime<Utc>) -> Vec<ItemId> {
        self.scheduler.due_items(as_of)
    }

    #[must_use]
    pub fn due_count(&self) -> usize {
        self.scheduler.due_count(self.clock.now())
    }

    pub fn remove_item(&mut self, id: &ItemId) -> Option<LearningItem> {
        let removed = self.scheduler.remove_item(id);
        if removed.is_some() {
            self.items_changed();
        }
        removed
    }

    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&LearningItem> {
        self.scheduler.item(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &LearningItem> + '_ {
        self.scheduler.registry().all_items()
    }

    //
    // ─── SESSIONS ──────────────────────────────────────────────────────────────
    //

    /// Open a session, discarding any unfinished one.
    pub fn start_session(&mut self, session_type: SessionType) -> Option<StudySession> {
        self.tracker.start(session_type, self.clock.now())
    }

    /// Count an answer in the current session, opening an anonymous one if
    /// none is active. Returns whether a session had to be opened.
    pub fn session_record_answer(&mut self, correct: bool) -> bool {
        self.tracker.record_answer(correct, self.clock.now())
    }

    /// Close the current session and fold it into the progress summary.
    ///
    /// With no active session this returns an empty, zero-duration result and
    /// leaves the summary untouched.
    pub fn end_session(&mut self) -> CompletedSession {
        let now = self.clock.now();
        match self.tracker.end(now) {
            Some(completed) => {
                let today = self.today();
                self.progress.on_session_completed(&completed, today);
                self.persist();
                completed
            }
            None => CompletedSession::empty(now),
        }
    }

    #[must_use]
    pub fn current_session(&self) -> Option<&StudySession> {
        self.tracker.current()
    }

    #[must_use]
    pub fn study_stats(&self) -> StudyStats {
        self.progress.study_stats(&self.tracker)
    }

    #[must_use]
    pub fn summary(&self) -> &UserProgressSummary {
        self.progress.summary()
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Forget every item, the active session and all progress, and remove
    /// the stored document.
    pub fn reset_all(&mut self) {
        self.scheduler.clear();
        self.tracker.reset();
        self.progress.reset();
        self.persistence.clear();
        tracing::debug!("engine state reset");
    }

    /// Copy of everything the engine persists.
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot::new(
            self.scheduler.registry().as_map().clone(),
            self.progress.summary().clone(),
        )
    }

    /// Wait for queued writes to reach the backend.
    ///
    /// # Errors
    ///
    /// Returns `PersistError::WriterClosed` if the writer task has stopped.
    pub async fn flush(&self) -> Result<(), PersistError> {
        self.persistence.flush().await
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Calendar date used for streaks, in the configured offset.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today(self.config.offset())
    }

    fn items_changed(&mut self) {
        self.progress.on_items_changed(self.scheduler.registry().all_items());
        self.persist();
    }

    fn persist(&self) {
        if !self.persistence.is_detached() {
            self.persistence.persist(self.snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use recall_core::time::{fixed_clock, fixed_now};

    fn engine() -> StudyEngine {
        StudyEngine::in_memory(EngineConfig::memory(), fixed_clock())
    }

    #[test]
    fn worked_example_schedules_eight_then_two_days() {
        let mut engine = engine();
        let now = fixed_now();

        let first = engine.record_answer("w1", true);
        assert_eq!(first.item.level(), 1);
        assert_eq!(first.item.ease_factor(), 2.5);
        assert_eq!(first.interval_days, 8);
        assert_eq!(first.item.next_review_at(), now + Duration::days(8));

        let second = engine.record_answer("w1", false);
        assert_eq!(second.item.level(), 0);
        assert_eq!(second.item.ease_factor(), 2.3);
        assert_eq!(second.interval_days, 2);
    }

    #[test]
    fn add_item_is_idempotent() {
        let mut engine = engine();
        assert!(engine.add_item(7_u64));
        engine.record_answer(7_u64, true);
        assert!(!engine.add_item(7_u64));
        assert_eq!(engine.item(&ItemId::from(7_u64)).unwrap().level(), 1);
    }

    #[test]
    fn new_items_are_due_immediately() {
        let mut engine = engine();
        engine.add_all_items([3_u64, 1, 2]);
        engine.record_answer(2_u64, true);

        assert_eq!(engine.due_items(), vec![ItemId::from(1_u64), ItemId::from(3_u64)]);
        assert_eq!(engine.due_count(), 2);
        assert_eq!(engine.due_items_at(fixed_now() + Duration::days(8)).len(), 3);
    }

    #[test]
    fn answers_without_a_session_open_an_anonymous_one() {
        let mut engine = engine();
        engine.review("a", true);

        let session = engine.current_session().unwrap();
        assert_eq!(session.session_type(), SessionType::Unknown);
        assert_eq!(session.items_studied(), 1);
        assert_eq!(engine.study_stats().accuracy, 100.0);
    }

    #[test]
    fn ending_an_idle_session_changes_nothing() {
        let mut engine = engine();
        let before = engine.summary().clone();

        let completed = engine.end_session();
        assert_eq!(completed.duration_minutes, 0);
        assert_eq!(completed.items_studied, 0);
        assert_eq!(engine.summary(), &before);
    }

    #[test]
    fn sessions_feed_time_and_streak() {
        let mut engine = engine();

        engine.start_session(SessionType::Quiz);
        engine.review("a", true);
        engine.review("b", false);
        engine.clock_mut().advance(Duration::minutes(12));
        let first = engine.end_session();
        assert_eq!(first.duration_minutes, 12);
        assert_eq!(first.correct_answers, 1);

        engine.clock_mut().advance(Duration::days(1));
        engine.start_session(SessionType::Flashcard);
        engine.clock_mut().advance(Duration::seconds(20));
        engine.end_session();

        let stats = engine.study_stats();
        assert_eq!(stats.streak, 2);
        assert_eq!(stats.total_time_minutes, 13);
        assert_eq!(stats.accuracy, 0.0);
    }

    #[test]
    fn utc_offset_moves_the_calendar_day() {
        // fixed_now is 22:13 UTC; three hours east is already the next day
        let east = StudyEngine::in_memory(
            EngineConfig::memory().with_utc_offset_minutes(180),
            fixed_clock(),
        );
        let utc = engine();
        assert_eq!(east.today(), utc.today().succ_opt().unwrap());
    }

    #[test]
    fn reset_all_clears_everything() {
        let mut engine = engine();
        engine.start_session(SessionType::Reading);
        engine.review("a", true);
        engine.clock_mut().advance(Duration::minutes(3));
        engine.end_session();
        engine.start_session(SessionType::Quiz);

        engine.reset_all();

        assert!(engine.items().next().is_none());
        assert!(engine.current_session().is_none());
        assert_eq!(engine.summary(), &UserProgressSummary::default());
        assert!(engine.snapshot().is_empty());
    }

    #[test]
    fn derived_statistics_follow_item_changes() {
        let mut engine = engine();
        for _ in 0..4 {
            engine.record_answer("strong", true);
        }
        engine.record_answer("weak", false);

        assert_eq!(engine.summary().total_words_learned(), 1);
        assert_eq!(engine.summary().average_accuracy(), 50.0);
        assert_eq!(engine.summary().weak_items(), &[ItemId::from("weak")]);

        engine.remove_item(&ItemId::from("weak"));
        assert_eq!(engine.summary().average_accuracy(), 100.0);
        assert!(engine.summary().weak_items().is_empty());
    }
}
