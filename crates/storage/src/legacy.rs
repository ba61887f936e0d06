//! Migration of documents written by the earlier browser stores.
//!
//! The progress store wrote its state at the document root alongside
//! `__version`, encoding maps, sets and dates as `{"__type": ..., "__data": ...}`
//! objects. An older review hook wrote a bare array of items keyed by
//! `vocabularyId` with plain ISO dates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use recall_core::model::{DEFAULT_EASE, ItemId};

use crate::document::{CURRENT_VERSION, DecodeError, ItemRecord, ProgressRecord, StateDocument};

const LEGACY_MARKERS: [&str; 3] = ["__version", "spacedRepetition", "userProgress"];

pub(crate) fn is_legacy(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|root| LEGACY_MARKERS.iter().any(|key| root.contains_key(*key)))
}

pub(crate) fn migrate(value: Value) -> Result<StateDocument, DecodeError> {
    let store: LegacyStore =
        serde_json::from_value(revive(value)).map_err(|e| DecodeError::Legacy(e.to_string()))?;

    let items = store
        .spaced_repetition
        .into_entries()
        .into_iter()
        .map(|(id, item)| (id, item.into_record()))
        .collect();
    let progress = store.user_progress.unwrap_or_default().into_record();

    Ok(StateDocument {
        version: CURRENT_VERSION,
        items,
        progress,
    })
}

/// Migrate a bare item array. Elements that do not parse are skipped.
pub(crate) fn migrate_item_list(value: Value) -> Result<StateDocument, DecodeError> {
    let Value::Array(elements) = value else {
        return Err(DecodeError::Legacy("expected an item array".into()));
    };

    let mut items = BTreeMap::new();
    for element in elements {
        match serde_json::from_value::<LegacyListItem>(element) {
            Ok(item) => {
                let (id, record) = item.into_entry();
                items.insert(id, record);
            }
            Err(err) => tracing::warn!(error = %err, "skipping unreadable legacy list item"),
        }
    }

    Ok(StateDocument {
        version: CURRENT_VERSION,
        items,
        progress: ProgressRecord::default(),
    })
}

/// Replace `__type` envelopes with plain JSON: maps and sets become arrays,
/// dates become their ISO string.
fn revive(value: Value) -> Value {
    match value {
        Value::Array(values) => Value::Array(values.into_iter().map(revive).collect()),
        Value::Object(object) => revive_object(object),
        other => other,
    }
}

fn revive_object(mut object: Map<String, Value>) -> Value {
    let tag = object.get("__type").and_then(Value::as_str).map(str::to_owned);
    match tag.as_deref() {
        Some("Map" | "Set" | "Date") => revive(object.remove("__data").unwrap_or(Value::Null)),
        _ => Value::Object(
            object
                .into_iter()
                .map(|(key, value)| (key, revive(value)))
                .collect(),
        ),
    }
}

//
// ─── LEGACY SHAPES ─────────────────────────────────────────────────────────────
//

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyStore {
    #[serde(default)]
    spaced_repetition: LegacyEntries,
    #[serde(default)]
    user_progress: Option<LegacyProgress>,
}

/// A revived map arrives as entry pairs; a plain object keyed by id is
/// accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyEntries {
    Pairs(Vec<(ItemId, LegacyItem)>),
    Keyed(BTreeMap<String, LegacyItem>),
}

impl Default for LegacyEntries {
    fn default() -> Self {
        Self::Pairs(Vec::new())
    }
}

impl LegacyEntries {
    fn into_entries(self) -> Vec<(ItemId, LegacyItem)> {
        match self {
            Self::Pairs(pairs) => pairs,
            Self::Keyed(keyed) => keyed
                .into_iter()
                .map(|(key, item)| {
                    let id = key.parse().unwrap_or(ItemId::Text(key));
                    (id, item)
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyItem {
    #[serde(default)]
    level: f64,
    #[serde(default)]
    next_review: Option<String>,
    #[serde(default)]
    last_reviewed: Option<String>,
    #[serde(default)]
    correct_count: f64,
    #[serde(default)]
    incorrect_count: f64,
    #[serde(default)]
    ease_factor: Option<f64>,
}

impl LegacyItem {
    fn into_record(self) -> ItemRecord {
        let last_reviewed_at = self.last_reviewed.as_deref().and_then(parse_instant);
        // an item with no readable schedule is due immediately
        let next_review_at = self
            .next_review
            .as_deref()
            .and_then(parse_instant)
            .or(last_reviewed_at)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        ItemRecord {
            level: to_whole(self.level),
            ease_factor: self.ease_factor.unwrap_or(DEFAULT_EASE),
            next_review_at,
            last_reviewed_at,
            correct_count: to_whole(self.correct_count),
            incorrect_count: to_whole(self.incorrect_count),
        }
    }
}

/// Element of the bare item array; it carried no counters or ease.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyListItem {
    vocabulary_id: ItemId,
    #[serde(default)]
    level: f64,
    #[serde(default)]
    next_review_date: Option<String>,
    #[serde(default)]
    last_review_date: Option<String>,
}

impl LegacyListItem {
    fn into_entry(self) -> (ItemId, ItemRecord) {
        let record = LegacyItem {
            level: self.level,
            next_review: self.next_review_date,
            last_reviewed: self.last_review_date,
            correct_count: 0.0,
            incorrect_count: 0.0,
            ease_factor: None,
        }
        .into_record();
        (self.vocabulary_id, record)
    }
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyProgress {
    total_study_time: f64,
    daily_streak: f64,
    last_study_date: Option<String>,
    total_words_learned: f64,
    average_accuracy: f64,
}

impl LegacyProgress {
    fn into_record(self) -> ProgressRecord {
        ProgressRecord {
            total_study_time_minutes: u64::try_from(to_whole(self.total_study_time)).unwrap_or(0),
            daily_streak_days: u32::try_from(to_whole(self.daily_streak)).unwrap_or(0),
            last_study_date: self.last_study_date.as_deref().and_then(parse_date),
            total_words_learned: u32::try_from(to_whole(self.total_words_learned)).unwrap_or(0),
            average_accuracy: if self.average_accuracy.is_finite() {
                self.average_accuracy
            } else {
                0.0
            },
            ..ProgressRecord::default()
        }
    }
}

fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    if text.trim().is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(text.trim()) {
        Ok(at) => Some(at.with_timezone(&Utc)),
        Err(err) => {
            tracing::warn!(value = text, error = %err, "dropping unreadable legacy timestamp");
            None
        }
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_instant(text).map(|at| at.date_naive()))
}

#[allow(clippy::cast_possible_truncation)]
fn to_whole(value: f64) -> i64 {
    if value.is_finite() {
        value.round() as i64
    } else {
        0
    }
}
