use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, path::Path, time::Duration};

/// Nanosecond TTL written for keys without an expiry.
const PERSISTENT_TTL: i64 = -1;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("key {name:?}: {kind} value must be {expected}")]
    InvalidValue {
        name: String,
        kind: KeyKind,
        expected: &'static str,
    },
}

/// Structural category of a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind {
    String,
    Hash,
    List,
    Set,
    SortedSet,
    /// A server type without a value representation (`stream`, module types).
    /// Kept on load so the record survives; never replayed.
    Other(String),
}

impl KeyKind {
    /// Maps a `TYPE` reply onto a kind; `None` for types the snapshot does not carry.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "hash" => Some(Self::Hash),
            "list" => Some(Self::List),
            "set" => Some(Self::Set),
            "zset" | "sortedset" => Some(Self::SortedSet),
            _ => None,
        }
    }

    /// Like `from_type_name`, but keeps unknown names as `Other`.
    pub fn from_type_name_lossless(name: &str) -> Self {
        Self::from_type_name(name).unwrap_or_else(|| Self::Other(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Hash => "hash",
            Self::List => "list",
            Self::Set => "set",
            Self::SortedSet => "zset",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured value of a key, one variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    String(String),
    Hash(BTreeMap<String, String>),
    List(Vec<String>),
    Set(Vec<String>),
    /// Members in rank order. Scores are not captured.
    SortedSet(Vec<String>),
}

impl KeyValue {
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::String(_) => KeyKind::String,
            Self::Hash(_) => KeyKind::Hash,
            Self::List(_) => KeyKind::List,
            Self::Set(_) => KeyKind::Set,
            Self::SortedSet(_) => KeyKind::SortedSet,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Hash(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(field, value)| (field.clone(), Value::String(value.clone())))
                    .collect(),
            ),
            Self::List(items) | Self::Set(items) | Self::SortedSet(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }

    /// Decodes the JSON payload of a known kind; `None` for `KeyKind::Other`.
    fn from_json(name: &str, kind: &KeyKind, value: Value) -> Result<Option<Self>, SnapshotError> {
        let invalid = |expected| SnapshotError::InvalidValue {
            name: name.to_string(),
            kind: kind.clone(),
            expected,
        };

        let value = match kind {
            KeyKind::Other(_) => return Ok(None),
            KeyKind::String => scalar_to_string(value)
                .map(Self::String)
                .ok_or_else(|| invalid("a scalar"))?,
            KeyKind::Hash => match value {
                Value::Object(fields) => fields
                    .into_iter()
                    .map(|(field, value)| scalar_to_string(value).map(|value| (field, value)))
                    .collect::<Option<BTreeMap<_, _>>>()
                    .map(Self::Hash)
                    .ok_or_else(|| invalid("an object of scalars"))?,
                _ => return Err(invalid("an object of scalars")),
            },
            KeyKind::List | KeyKind::Set | KeyKind::SortedSet => {
                let items = match value {
                    Value::Array(items) => items
                        .into_iter()
                        .map(scalar_to_string)
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| invalid("an array of scalars"))?,
                    _ => return Err(invalid("an array of scalars")),
                };
                match kind {
                    KeyKind::List => Self::List(items),
                    KeyKind::Set => Self::Set(items),
                    _ => Self::SortedSet(items),
                }
            }
        };
        Ok(Some(value))
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A single captured key.
///
/// `value` is `None` when the key could not be read at capture time; it is
/// always of kind `kind` otherwise, and always `None` for `KeyKind::Other`.
/// `ttl` is the remaining lifetime at capture, `None` for persistent keys; the
/// constructors fold a zero duration into `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawKey", into = "RawKey")]
pub struct Key {
    pub name: String,
    pub kind: KeyKind,
    pub value: Option<KeyValue>,
    pub ttl: Option<Duration>,
}

impl Key {
    pub fn new(name: impl Into<String>, value: KeyValue, ttl: Option<Duration>) -> Self {
        Self {
            name: name.into(),
            kind: value.kind(),
            value: Some(value),
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
        }
    }

    /// A key whose value could not be read.
    pub fn unread(name: impl Into<String>, kind: KeyKind, ttl: Option<Duration>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: None,
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
        }
    }
}

/// On-disk shape of a key: `{"name", "type", "value", "ttl"}` with ttl in nanoseconds.
#[derive(Serialize, Deserialize)]
struct RawKey {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    ttl: i64,
}

impl From<Key> for RawKey {
    fn from(key: Key) -> Self {
        let ttl = match key.ttl.filter(|ttl| !ttl.is_zero()) {
            Some(ttl) => i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX),
            None => PERSISTENT_TTL,
        };
        RawKey {
            name: key.name,
            kind: key.kind.as_str().to_string(),
            value: key.value.as_ref().map_or(Value::Null, KeyValue::to_json),
            ttl,
        }
    }
}

impl TryFrom<RawKey> for Key {
    type Error = SnapshotError;

    fn try_from(raw: RawKey) -> Result<Self, Self::Error> {
        let kind = KeyKind::from_type_name_lossless(&raw.kind);
        let value = match raw.value {
            Value::Null => None,
            value => KeyValue::from_json(&raw.name, &kind, value)?,
        };
        let ttl = u64::try_from(raw.ttl)
            .ok()
            .filter(|nanos| *nanos > 0)
            .map(Duration::from_nanos);

        Ok(Key {
            name: raw.name,
            kind,
            value,
            ttl,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    #[serde(rename = "db_name")]
    pub id: u32,
    #[serde(rename = "db_size")]
    pub approx_size: i64,
    #[serde(default)]
    pub keys: Vec<Key>,
}

/// Root of a snapshot: every captured database, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default)]
    pub databases: Vec<Database>,
}

impl Instance {
    pub fn key_count(&self) -> usize {
        self.databases.iter().map(|db| db.keys.len()).sum()
    }

    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_vec_pretty(self).context("Failed to serialize snapshot")?;
        tokio::fs::write(path, data)
            .await
            .with_context(|| format!("Failed to write snapshot to {}", path.display()))
    }

    pub async fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }
}
