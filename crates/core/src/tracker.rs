use chrono::{DateTime, Utc};

use crate::model::{CompletedSession, SessionType, StudySession};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Tracks at most one active study session.
///
/// `Idle --start--> Active --record_answer--> Active --end--> Idle`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTracker {
    active: Option<StudySession>,
}

impl SessionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session, discarding any unfinalized one.
    ///
    /// Returns the discarded session so callers can tell it was overwritten.
    pub fn start(&mut self, session_type: SessionType, now: DateTime<Utc>) -> Option<StudySession> {
        let discarded = self.active.replace(StudySession::new(session_type, now));
        if let Some(previous) = &discarded {
            tracing::debug!(
                session_type = %previous.session_type(),
                items_studied = previous.items_studied(),
                "unfinished session discarded by a new start"
            );
        }
        discarded
    }

    /// Count an answer in the active session.
    ///
    /// While idle an anonymous `Unknown` session is opened first so the answer
    /// is not lost; the return value reports whether that happened.
    pub fn record_answer(&mut self, correct: bool, now: DateTime<Utc>) -> bool {
        let opened = self.active.is_none();
        if opened {
            tracing::debug!("answer recorded while idle, opening anonymous session");
        }
        self.active
            .get_or_insert_with(|| StudySession::new(SessionType::Unknown, now))
            .record(correct);
        opened
    }

    /// Finalize the active session. Returns `None` if there was none.
    pub fn end(&mut self, now: DateTime<Utc>) -> Option<CompletedSession> {
        let session = self.active.take()?;
        let duration_minutes = duration_minutes(session.started_at(), now);

        Some(CompletedSession {
            session_type: session.session_type(),
            started_at: session.started_at(),
            ended_at: now,
            items_studied: session.items_studied(),
            correct_answers: session.correct_answers(),
            duration_minutes,
        })
    }

    #[must_use]
    pub fn current(&self) -> Option<&StudySession> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Accuracy of the active session in percent, 0 when idle.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.active.as_ref().map_or(0.0, StudySession::accuracy)
    }

    /// Drop any active session without finalizing it.
    pub fn reset(&mut self) {
        self.active = None;
    }
}

/// Whole minutes between two instants, rounded half up, never less than 1.
#[must_use]
pub fn duration_minutes(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> u32 {
    let millis = ended_at.signed_duration_since(started_at).num_milliseconds();
    let minutes = (millis + MILLIS_PER_MINUTE / 2).div_euclid(MILLIS_PER_MINUTE);
    u32::try_from(minutes.max(1)).unwrap_or(u32::MAX)
}
