//! Versioned document format shared by every storage backend.
//!
//! JSON has no native map type with non-string keys, so every map is written
//! as an explicit envelope: `{"type": "Map", "entries": [[key, value], ...]}`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use recall_core::model::{DEFAULT_EASE, EngineSnapshot, ItemId, LearningItem, UserProgressSummary};

use crate::legacy;
use crate::repository::{StateRepository, StorageError};

/// Version written by this build.
pub const CURRENT_VERSION: u32 = 2;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Errors raised while turning document text back into engine state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("document root must be a JSON object or a legacy item list")]
    NotAnObject,

    #[error("legacy document could not be migrated: {0}")]
    Legacy(String),
}

//
// ─── TAGGED MAPS ───────────────────────────────────────────────────────────────
//

/// Serde adapter writing a `BTreeMap` as a `{"type": "Map", "entries": [...]}` envelope.
///
/// Reading skips entries whose key or value does not parse, so one foreign
/// entry cannot take the rest of the map down with it.
pub mod tagged_map {
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize)]
    enum MapTag {
        Map,
    }

    #[derive(Serialize)]
    struct EnvelopeRef<'a, K, V> {
        #[serde(rename = "type")]
        tag: MapTag,
        entries: Vec<(&'a K, &'a V)>,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry<K, V> {
        Valid(K, V),
        Unreadable(IgnoredAny),
    }

    #[derive(Deserialize)]
    struct Envelope<K, V> {
        #[serde(rename = "type")]
        #[allow(dead_code)]
        tag: MapTag,
        entries: Vec<Entry<K, V>>,
    }

    /// # Errors
    ///
    /// Propagates serializer errors for keys or values.
    pub fn serialize<S, K, V>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        K: Serialize,
        V: Serialize,
    {
        EnvelopeRef {
            tag: MapTag::Map,
            entries: map.iter().collect(),
        }
        .serialize(serializer)
    }

    /// # Errors
    ///
    /// Fails if the value is not an envelope or its tag is not `"Map"`.
    pub fn deserialize<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        D: Deserializer<'de>,
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
    {
        let envelope = Envelope::<K, V>::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        let mut skipped = 0_usize;
        for entry in envelope.entries {
            match entry {
                Entry::Valid(key, value) => {
                    map.insert(key, value);
                }
                Entry::Unreadable(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "dropped unreadable map entries");
        }
        Ok(map)
    }
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Persisted shape of a learning item; the id is the map key.
///
/// Numeric fields are wide and signed so out-of-range values survive parsing
/// and get clamped by the domain constructor instead of failing the load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    #[serde(default)]
    pub level: i64,
    #[serde(default = "default_ease")]
    pub ease_factor: f64,
    pub next_review_at: DateTime<Utc>,
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub correct_count: i64,
    #[serde(default)]
    pub incorrect_count: i64,
}

fn default_ease() -> f64 {
    DEFAULT_EASE
}

impl ItemRecord {
    #[must_use]
    pub fn from_item(item: &LearningItem) -> Self {
        Self {
            level: i64::from(item.level()),
            ease_factor: item.ease_factor(),
            next_review_at: item.next_review_at(),
            last_reviewed_at: item.last_reviewed_at(),
            correct_count: i64::from(item.correct_count()),
            incorrect_count: i64::from(item.incorrect_count()),
        }
    }

    #[must_use]
    pub fn into_item(self, id: ItemId) -> LearningItem {
        LearningItem::from_persisted(
            id,
            self.level,
            self.ease_factor,
            self.next_review_at,
            self.last_reviewed_at,
            clamp_count(self.correct_count),
            clamp_count(self.incorrect_count),
        )
    }
}

/// Persisted shape of the progress summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressRecord {
    pub total_study_time_minutes: u64,
    pub daily_streak_days: u32,
    pub last_study_date: Option<NaiveDate>,
    pub total_words_learned: u32,
    pub average_accuracy: f64,
    #[serde(with = "tagged_map")]
    pub level_distribution: BTreeMap<u8, u32>,
    #[serde(deserialize_with = "readable_ids")]
    pub weak_items: Vec<ItemId>,
}

fn readable_ids<'de, D>(deserializer: D) -> Result<Vec<ItemId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Slot {
        Id(ItemId),
        Unreadable(serde::de::IgnoredAny),
    }

    let slots = Vec::<Slot>::deserialize(deserializer)?;
    Ok(slots
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Id(id) => Some(id),
            Slot::Unreadable(_) => None,
        })
        .collect())
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self::from_summary(&UserProgressSummary::default())
    }
}

impl ProgressRecord {
    #[must_use]
    pub fn from_summary(summary: &UserProgressSummary) -> Self {
        Self {
            total_study_time_minutes: summary.total_study_time_minutes(),
            daily_streak_days: summary.daily_streak_days(),
            last_study_date: summary.last_study_date(),
            total_words_learned: summary.total_words_learned(),
            average_accuracy: summary.average_accuracy(),
            level_distribution: summary.level_distribution().clone(),
            weak_items: summary.weak_items().to_vec(),
        }
    }

    #[must_use]
    pub fn into_summary(self) -> UserProgressSummary {
        UserProgressSummary::from_persisted(
            self.total_study_time_minutes,
            self.daily_streak_days,
            self.last_study_date,
            self.total_words_learned,
            self.average_accuracy,
            self.level_distribution,
            self.weak_items,
        )
    }
}

fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

//
// ─── DOCUMENT ──────────────────────────────────────────────────────────────────
//

/// Top-level persisted document: `{ version, items, progress }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDocument {
    #[serde(default)]
    pub version: u32,
    #[serde(default, with = "tagged_map")]
    pub items: BTreeMap<ItemId, ItemRecord>,
    #[serde(default)]
    pub progress: ProgressRecord,
}

impl StateDocument {
    #[must_use]
    pub fn from_snapshot(snapshot: &EngineSnapshot) -> Self {
        Self {
            version: CURRENT_VERSION,
            items: snapshot
                .items
                .iter()
                .map(|(id, item)| (id.clone(), ItemRecord::from_item(item)))
                .collect(),
            progress: ProgressRecord::from_summary(&snapshot.progress),
        }
    }

    #[must_use]
    pub fn into_snapshot(self) -> EngineSnapshot {
        let items = self
            .items
            .into_iter()
            .map(|(id, record)| (id.clone(), record.into_item(id)))
            .collect();
        EngineSnapshot::new(items, self.progress.into_summary())
    }

    /// Serialize to document text.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a value cannot be encoded.
    pub fn encode(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Parse document text, migrating legacy layouts to the current version.
    ///
    /// Unknown fields are ignored so newer additive writers stay readable.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the text is not JSON or does not match any
    /// known layout.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if value.is_array() {
            tracing::info!("migrating legacy item list");
            return legacy::migrate_item_list(value);
        }
        if !value.is_object() {
            return Err(DecodeError::NotAnObject);
        }

        if legacy::is_legacy(&value) {
            tracing::info!("migrating legacy progress document");
            return legacy::migrate(value);
        }

        let document: Self = serde_json::from_value(value)?;
        if document.version == 0 {
            tracing::warn!("document carries no version, reading it as version {CURRENT_VERSION}");
        } else if document.version > CURRENT_VERSION {
            tracing::warn!(
                version = document.version,
                "document written by a newer version, reading known fields only"
            );
        }
        Ok(document)
    }
}

/// Encode an engine snapshot as current-version document text.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if encoding fails.
pub fn encode_snapshot(snapshot: &EngineSnapshot) -> Result<String, StorageError> {
    StateDocument::from_snapshot(snapshot).encode()
}

/// Decode document text into an engine snapshot.
///
/// # Errors
///
/// Returns `DecodeError` for unreadable documents.
pub fn decode_snapshot(text: &str) -> Result<EngineSnapshot, DecodeError> {
    StateDocument::decode(text).map(StateDocument::into_snapshot)
}

/// Load the stored snapshot, falling back to a fresh state on any failure.
///
/// Missing documents are normal on first launch; unreadable or corrupt ones
/// are logged as warnings and never reach the caller as errors.
pub async fn load_or_default(repo: &dyn StateRepository) -> EngineSnapshot {
    match repo.load().await {
        Ok(Some(text)) => match decode_snapshot(&text) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(error = %err, "stored document is corrupt, starting from a fresh state");
                EngineSnapshot::default()
            }
        },
        Ok(None) => {
            tracing::debug!("no stored document, starting from a fresh state");
            EngineSnapshot::default()
        }
        Err(err) => {
            tracing::warn!(error = %err, "stored document could not be read, starting from a fresh state");
            EngineSnapshot::default()
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use chrono::Duration;
    use recall_core::progress::ProgressAggregator;
    use recall_core::scheduler::Scheduler;
    use recall_core::time::fixed_now;
    use recall_core::tracker::duration_minutes;
    use recall_core::model::{CompletedSession, SessionType};

    fn reachable_snapshot() -> EngineSnapshot {
        let now = fixed_now();
        let mut scheduler = Scheduler::new();
        scheduler.add_item(ItemId::from(3_u64), now);
        scheduler.record_answer(ItemId::from("w1"), true, now);
        scheduler.record_answer(ItemId::from("w1"), false, now + Duration::days(8));
        scheduler.record_answer(ItemId::from(10_u64), true, now);

        let mut progress = ProgressAggregator::new();
        progress.on_items_changed(scheduler.registry().all_items());
        progress.on_session_completed(
            &CompletedSession {
                session_type: SessionType::Quiz,
                started_at: now,
                ended_at: now + Duration::minutes(7),
                items_studied: 3,
                correct_answers: 2,
                duration_minutes: duration_minutes(now, now + Duration::minutes(7)),
            },
            now.date_naive(),
        );

        EngineSnapshot::new(scheduler.registry().as_map().clone(), progress.summary().clone())
    }

    #[test]
    fn snapshot_round_trips_through_document_text() {
        let snapshot = reachable_snapshot();
        let text = encode_snapshot(&snapshot).unwrap();
        let restored = decode_snapshot(&text).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn maps_use_explicit_envelopes() {
        let text = encode_snapshot(&reachable_snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["version"], CURRENT_VERSION);
        assert_eq!(value["items"]["type"], "Map");
        let entries = value["items"]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        // numbers sort before strings and keep their JSON type
        assert_eq!(entries[0][0], 3);
        assert_eq!(entries[2][0], "w1");
        assert_eq!(value["progress"]["levelDistribution"]["type"], "Map");
    }

    #[test]
    fn decode_ignores_unknown_fields_and_defaults_missing_ones() {
        let text = r#"{
            "version": 2,
            "futureFlag": true,
            "items": {"type": "Map", "entries": [
                ["a", {"nextReviewAt": "2024-01-01T00:00:00Z", "extra": 1}]
            ]},
            "progress": {"dailyStreakDays": 4, "lastStudyDate": "2024-01-01", "mood": "ok"}
        }"#;
        let snapshot = decode_snapshot(text).unwrap();

        let item = &snapshot.items[&ItemId::from("a")];
        assert_eq!(item.level(), 0);
        assert_eq!(item.ease_factor(), DEFAULT_EASE);
        assert_eq!(snapshot.progress.daily_streak_days(), 4);
        assert_eq!(
            snapshot.progress.last_study_date(),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn decode_clamps_out_of_range_values() {
        let text = r#"{"version": 2, "items": {"type": "Map", "entries": [
            [1, {"level": 12, "easeFactor": 9.5, "nextReviewAt": "2024-01-01T00:00:00Z",
                 "correctCount": -4, "incorrectCount": 2}]
        ]}}"#;
        let snapshot = decode_snapshot(text).unwrap();
        let item = &snapshot.items[&ItemId::from(1_u64)];
        assert_eq!(item.level(), 5);
        assert_eq!(item.ease_factor(), 2.5);
        assert_eq!(item.correct_count(), 0);
        assert_eq!(item.incorrect_count(), 2);
    }

    #[test]
    fn decode_rejects_wrong_envelope_tag() {
        let text = r#"{"version": 2, "items": {"type": "Set", "entries": []}}"#;
        assert!(matches!(decode_snapshot(text), Err(DecodeError::Json(_))));
    }

    #[test]
    fn unreadable_entries_are_skipped_not_fatal() {
        let text = r#"{"version": 2,
            "items": {"type": "Map", "entries": [
                [1, {"nextReviewAt": "2024-01-01T00:00:00Z", "correctCount": 2}],
                [-3, {"nextReviewAt": "2024-01-02T00:00:00Z"}],
                [2.5, {"nextReviewAt": "2024-01-01T00:00:00Z"}],
                ["w", {"level": "high"}],
                [7]
            ]},
            "progress": {"dailyStreakDays": 3, "weakItems": [1, {"id": 9}, "w"]}}"#;
        let snapshot = decode_snapshot(text).unwrap();

        assert_eq!(
            snapshot.items.keys().cloned().collect::<Vec<_>>(),
            vec![ItemId::from(-3_i64), ItemId::from(1_u64)]
        );
        assert_eq!(snapshot.items[&ItemId::from(1_u64)].correct_count(), 2);
        assert_eq!(snapshot.progress.daily_streak_days(), 3);
        assert_eq!(
            snapshot.progress.weak_items(),
            &[ItemId::from(1_u64), ItemId::from("w")]
        );
    }

    #[test]
    fn bare_arrays_are_read_as_legacy_item_lists() {
        let text = r#"[{"vocabularyId": 12, "level": 3, "nextReviewDate": "2024-01-01T00:00:00.000Z"}]"#;
        let snapshot = decode_snapshot(text).unwrap();
        assert_eq!(snapshot.items[&ItemId::from(12_u64)].level(), 3);
    }

    #[test]
    fn decode_rejects_non_object_roots() {
        assert!(matches!(decode_snapshot("42"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode_snapshot("\"state\""), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode_snapshot("not json"), Err(DecodeError::Json(_))));
    }

    #[tokio::test]
    async fn load_or_default_falls_back_on_corrupt_documents() {
        let repo = InMemoryRepository::with_document("{ this is not json");
        let snapshot = load_or_default(&repo).await;
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn load_or_default_reads_saved_documents() {
        let repo = InMemoryRepository::new();
        let snapshot = reachable_snapshot();
        repo.save(&encode_snapshot(&snapshot).unwrap()).await.unwrap();

        assert_eq!(load_or_default(&repo).await, snapshot);
    }
}
