mod ids;
mod item;
mod progress;
mod session;
mod snapshot;

pub use ids::ItemId;
pub use item::{DEFAULT_EASE, LearningItem, MAX_EASE, MAX_LEVEL, MIN_EASE, clamp_ease, clamp_level};
pub use progress::{StudyStats, UserProgressSummary};
pub use session::{CompletedSession, SessionType, StudySession};
pub use snapshot::EngineSnapshot;

pub(crate) use progress::empty_level_distribution;
