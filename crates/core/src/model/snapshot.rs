use std::collections::BTreeMap;

use crate::model::{ItemId, LearningItem, UserProgressSummary};

/// Everything the engine persists: tracked items plus the derived summary.
///
/// Sessions are intentionally absent; an unfinished session does not survive
/// a restart.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineSnapshot {
    pub items: BTreeMap<ItemId, LearningItem>,
    pub progress: UserProgressSummary,
}

impl EngineSnapshot {
    #[must_use]
    pub fn new(items: BTreeMap<ItemId, LearningItem>, progress: UserProgressSummary) -> Self {
        Self { items, progress }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.progress == UserProgressSummary::default()
    }
}
