use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::NoteError;

/// Which backend an operation targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Remote,
    Local,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Remote => "remote",
            Mode::Local => "local",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Mode::Remote),
            "local" => Ok(Mode::Local),
            other => Err(NoteError::Config(format!("Unknown mode: {}", other))),
        }
    }
}

pub const TITLE_KEY: &str = "title";
pub const PARENT_ID_KEY: &str = "parent_id";
pub const TYPE_KEY: &str = "type";
pub const ORDER_KEY: &str = "order";
pub const IS_EXPANDED_KEY: &str = "is_expanded";

/// Open key-value attributes stored next to a note's content.
///
/// Only `title` and `parent_id` are always written; folder nodes also carry
/// `type`, `order` and `is_expanded`. Values are kept as raw JSON so unknown
/// keys survive a round trip through either backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserMetadata(BTreeMap<String, Value>);

impl UserMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `{title, parent_id}` pair every save writes.
    pub fn titled(title: &str, parent_id: &str) -> Self {
        let mut meta = Self::new();
        meta.insert(TITLE_KEY, title);
        meta.insert(PARENT_ID_KEY, parent_id);
        meta
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn title(&self) -> &str {
        self.get_str(TITLE_KEY).unwrap_or_default()
    }

    pub fn parent_id(&self) -> &str {
        self.get_str(PARENT_ID_KEY).unwrap_or_default()
    }

    pub fn note_type(&self) -> Option<&str> {
        self.get_str(TYPE_KEY)
    }

    /// Ordering weight. Stored as a string by most writers, but numbers are accepted.
    pub fn order(&self) -> Option<String> {
        match self.get(ORDER_KEY)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn is_expanded(&self) -> Option<bool> {
        match self.get(IS_EXPANDED_KEY)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Overlay `other` onto `self`; keys in `other` win.
    pub fn merge(&mut self, other: &UserMetadata) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// `self` overlaid with `other`, leaving both inputs untouched.
    pub fn merged(&self, other: &UserMetadata) -> UserMetadata {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for UserMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<UserMetadata, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<UserMetadata>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a backend-reported timestamp. RFC 3339 first, then naive
/// date-times (taken as UTC), then epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Unreadable timestamps decode as `None` instead of failing the record.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(parse_timestamp))
}

fn lenient_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let size = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(size.unwrap_or(0))
}

/// A stored note as reported by a backend listing or metadata lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default, deserialize_with = "lenient_size")]
    pub size: u64,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_metadata: UserMetadata,
}

impl Note {
    /// Enforce `id == key`; servers are free to report their own ids.
    pub fn normalized(mut self) -> Self {
        self.id = self.key.clone();
        self
    }

    pub fn title(&self) -> &str {
        self.user_metadata.title()
    }

    pub fn parent_id(&self) -> &str {
        self.user_metadata.parent_id()
    }
}

/// Decoded body of a note plus copies of its timestamps.
///
/// `title` is empty when the backend keeps titles only in metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteContent {
    pub title: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const CREATED_AT_KEY: &str = "created_at";
pub const UPDATED_AT_KEY: &str = "updated_at";

/// One record of the local `metadata.json` index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: UserMetadata,
}

impl MetadataEntry {
    pub fn new(fields: UserMetadata) -> Self {
        let now = Utc::now();
        let mut entry = Self {
            created_at: Some(now),
            updated_at: Some(now),
            fields: UserMetadata::new(),
        };
        entry.merge_fields(&fields);
        entry
    }

    /// Merge user fields. Timestamp keys are owned by the entry itself and are skipped.
    pub fn merge_fields(&mut self, fields: &UserMetadata) {
        for (key, value) in fields.iter() {
            if key == CREATED_AT_KEY || key == UPDATED_AT_KEY {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Refresh `updated_at`, backfilling `created_at` for records that predate it.
    pub fn touch(&mut self) {
        let now = next_timestamp(self.updated_at);
        self.updated_at = Some(now);
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
    }
}

/// Current time, forced past `previous` so successive writes are ordered.
pub fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}
