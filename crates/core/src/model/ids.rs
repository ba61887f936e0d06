use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Opaque key of a learnable item.
///
/// The content universe lives elsewhere, so any integer or string is a valid
/// key. Numbers order before strings; within a kind the natural order applies.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl ItemId {
    #[must_use]
    pub fn number(id: i64) -> Self {
        Self::Number(id)
    }

    /// Returns the numeric value if this id is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<i64> {
        match self {
            ItemId::Number(n) => Some(*n),
            ItemId::Text(_) => None,
        }
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for ItemId {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<u32> for ItemId {
    fn from(value: u32) -> Self {
        Self::Number(i64::from(value))
    }
}

/// Values beyond `i64::MAX` keep their digits as text.
impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Text(value.to_string()), Self::Number)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "ItemId({n})"),
            ItemId::Text(s) => write!(f, "ItemId({s:?})"),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{n}"),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for ItemId {
    type Err = ModelError;

    /// Canonical decimal text (optional `-`, no leading zeros, no `-0`)
    /// becomes a number, everything else stays text so `to_string`
    /// round-trips.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ModelError::EmptyItemId);
        }
        let digits = s.strip_prefix('-').unwrap_or(s);
        let canonical = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && (s == "0" || !digits.starts_with('0'));
        if canonical {
            if let Ok(n) = s.parse::<i64>() {
                return Ok(Self::Number(n));
            }
        }
        Ok(Self::Text(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_order_before_text() {
        let mut ids = vec![
            ItemId::from("b"),
            ItemId::from(10_u64),
            ItemId::from("a"),
            ItemId::from(9_u64),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                ItemId::from(9_u64),
                ItemId::from(10_u64),
                ItemId::from("a"),
                ItemId::from("b"),
            ]
        );
    }

    #[test]
    fn from_str_parses_canonical_numbers() {
        assert_eq!("42".parse::<ItemId>().unwrap(), ItemId::Number(42));
        assert_eq!("0".parse::<ItemId>().unwrap(), ItemId::Number(0));
        assert_eq!("007".parse::<ItemId>().unwrap(), ItemId::from("007"));
        assert_eq!("w1".parse::<ItemId>().unwrap(), ItemId::from("w1"));
        assert_eq!("-3".parse::<ItemId>().unwrap(), ItemId::Number(-3));
        assert_eq!("-0".parse::<ItemId>().unwrap(), ItemId::from("-0"));
        assert_eq!("-".parse::<ItemId>().unwrap(), ItemId::from("-"));
        assert!(matches!("".parse::<ItemId>(), Err(ModelError::EmptyItemId)));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for id in [
            ItemId::from(123_u64),
            ItemId::from(-45_i64),
            ItemId::from(u64::MAX),
            ItemId::from("你好"),
            ItemId::from("007"),
        ] {
            let parsed: ItemId = id.to_string().parse().unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn negative_numbers_are_ids_too() {
        let ids: Vec<ItemId> = serde_json::from_str("[-3, 4, \"x\"]").unwrap();
        assert_eq!(ids, vec![ItemId::from(-3_i64), ItemId::from(4_i32), ItemId::from("x")]);
        assert!(ItemId::from(-3_i64) < ItemId::from(0_u32));
        assert_eq!(serde_json::to_string(&ItemId::from(-3_i64)).unwrap(), "-3");
    }

    #[test]
    fn oversized_unsigned_ids_become_text() {
        assert_eq!(ItemId::from(u64::MAX), ItemId::from("18446744073709551615"));
        assert_eq!(ItemId::from(7_u64), ItemId::Number(7));
    }

    #[test]
    fn debug_distinguishes_kinds() {
        assert_eq!(format!("{:?}", ItemId::from(1_u64)), "ItemId(1)");
        assert_eq!(format!("{:?}", ItemId::from("1")), "ItemId(\"1\")");
    }
}
