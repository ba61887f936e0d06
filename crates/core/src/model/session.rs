use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Kind of study activity a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Flashcard,
    Quiz,
    Reading,
    /// Sessions opened implicitly by an answer recorded while idle.
    #[default]
    Unknown,
}

impl SessionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Flashcard => "flashcard",
            SessionType::Quiz => "quiz",
            SessionType::Reading => "reading",
            SessionType::Unknown => "unknown",
        }
    }

    /// Like `from_str`, but unrecognised text maps to `Unknown`.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or(SessionType::Unknown)
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flashcard" => Ok(Self::Flashcard),
            "quiz" => Ok(Self::Quiz),
            "reading" => Ok(Self::Reading),
            "unknown" => Ok(Self::Unknown),
            _ => Err(ModelError::UnknownSessionType(s.to_owned())),
        }
    }
}

/// Counters of the currently active study session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySession {
    session_type: SessionType,
    started_at: DateTime<Utc>,
    items_studied: u32,
    correct_answers: u32,
}

impl StudySession {
    #[must_use]
    pub fn new(session_type: SessionType, started_at: DateTime<Utc>) -> Self {
        Self {
            session_type,
            started_at,
            items_studied: 0,
            correct_answers: 0,
        }
    }

    pub(crate) fn record(&mut self, correct: bool) {
        self.items_studied = self.items_studied.saturating_add(1);
        if correct {
            self.correct_answers = self.correct_answers.saturating_add(1);
        }
    }

    #[must_use]
    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn items_studied(&self) -> u32 {
        self.items_studied
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    /// Session-local accuracy as a percentage, 0 with no answers.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct_answers, self.items_studied)
    }
}

/// A finalized session, handed to the progress aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedSession {
    pub session_type: SessionType,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub items_studied: u32,
    pub correct_answers: u32,
    pub duration_minutes: u32,
}

impl CompletedSession {
    /// Zero-duration result returned when ending a session that never started.
    #[must_use]
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            session_type: SessionType::Unknown,
            started_at: at,
            ended_at: at,
            items_studied: 0,
            correct_answers: 0,
            duration_minutes: 0,
        }
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct_answers, self.items_studied)
    }
}

fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn session_type_parses_known_names() {
        assert_eq!("flashcard".parse::<SessionType>().unwrap(), SessionType::Flashcard);
        assert_eq!(" Quiz ".parse::<SessionType>().unwrap(), SessionType::Quiz);
        assert_eq!(SessionType::Reading.to_string(), "reading");
        assert!(matches!(
            "dictation".parse::<SessionType>(),
            Err(ModelError::UnknownSessionType(_))
        ));
        assert_eq!(SessionType::parse_lenient("dictation"), SessionType::Unknown);
    }

    #[test]
    fn session_accuracy_is_a_percentage() {
        let mut session = StudySession::new(SessionType::Quiz, fixed_now());
        assert_eq!(session.accuracy(), 0.0);

        session.record(true);
        session.record(true);
        session.record(false);
        session.record(true);

        assert_eq!(session.items_studied(), 4);
        assert_eq!(session.correct_answers(), 3);
        assert!((session.accuracy() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_completed_session_has_zero_duration() {
        let empty = CompletedSession::empty(fixed_now());
        assert_eq!(empty.duration_minutes, 0);
        assert_eq!(empty.items_studied, 0);
        assert_eq!(empty.accuracy(), 0.0);
    }
}
