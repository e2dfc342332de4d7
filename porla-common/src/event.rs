//! Torrent lifecycle events raised by the job engine.
//!
//! An [`Event`] is an ephemeral value: a name from the fixed [`EventName`]
//! taxonomy plus structured fields. Consumers turn the fields into template
//! variables with [`Event::variables`].

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize, ser::SerializeTuple};
use serde_json::{Map, Value};
use thiserror::Error;

/// Template variables bound for a single event, keyed by name.
pub type Variables = BTreeMap<String, Value>;

/// Reserved variable carrying the event's wire name.
pub const EVENT_NAME_VARIABLE: &str = "event_name";

/// The lifecycle transitions a torrent can go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    TorrentAdded,
    TorrentFinished,
    TorrentPaused,
    TorrentRemoved,
    TorrentResumed,
}

impl EventName {
    pub const ALL: [Self; 5] = [
        Self::TorrentAdded,
        Self::TorrentFinished,
        Self::TorrentPaused,
        Self::TorrentRemoved,
        Self::TorrentResumed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TorrentAdded => "torrent_added",
            Self::TorrentFinished => "torrent_finished",
            Self::TorrentPaused => "torrent_paused",
            Self::TorrentRemoved => "torrent_removed",
            Self::TorrentResumed => "torrent_resumed",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown event name: {0}")]
pub struct UnknownEventName(pub String);

impl FromStr for EventName {
    type Err = UnknownEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownEventName(s.to_string()))
    }
}

/// A torrent's v1 and/or v2 info hash, as lowercase hex.
///
/// Serialises as `[v1, v2]` with `null` for a missing half.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InfoHash {
    pub v1: Option<String>,
    pub v2: Option<String>,
}

impl InfoHash {
    #[must_use]
    pub fn v1(hash: impl Into<String>) -> Self {
        Self {
            v1: Some(hash.into()),
            v2: None,
        }
    }

    #[must_use]
    pub fn v2(hash: impl Into<String>) -> Self {
        Self {
            v1: None,
            v2: Some(hash.into()),
        }
    }

    #[must_use]
    pub fn hybrid(v1: impl Into<String>, v2: impl Into<String>) -> Self {
        Self {
            v1: Some(v1.into()),
            v2: Some(v2.into()),
        }
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.v1, &self.v2) {
            (Some(v1), _) => f.write_str(v1),
            (None, Some(v2)) => f.write_str(v2),
            (None, None) => f.write_str("<none>"),
        }
    }
}

impl Serialize for InfoHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.v1)?;
        tuple.serialize_element(&self.v2)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Pair(Option<String>, Option<String>),
            Single(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Pair(v1, v2) => Self { v1, v2 },
            Repr::Single(v1) => Self::v1(v1),
        })
    }
}

/// Snapshot of a torrent handed over by the job engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TorrentStatus {
    pub info_hash: InfoHash,
    pub name: String,
    pub progress: f32,
    pub save_path: String,
    pub total: i64,
    pub total_done: i64,
    pub total_wanted: i64,
}

/// A lifecycle event with its structured payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: EventName,
    pub fields: Map<String, Value>,
}

impl Event {
    #[must_use]
    pub const fn new(name: EventName, fields: Map<String, Value>) -> Self {
        Self { name, fields }
    }

    fn with_torrent(name: EventName, torrent: Value) -> Self {
        let mut fields = Map::new();
        fields.insert("torrent".to_string(), torrent);
        Self::new(name, fields)
    }

    fn with_status(name: EventName, status: &TorrentStatus) -> Self {
        // A struct of plain strings and numbers cannot fail to serialise,
        // except for a non-finite progress which maps to null.
        let torrent = serde_json::to_value(status).unwrap_or(Value::Null);
        Self::with_torrent(name, torrent)
    }

    #[must_use]
    pub fn torrent_added(status: &TorrentStatus) -> Self {
        Self::with_status(EventName::TorrentAdded, status)
    }

    #[must_use]
    pub fn torrent_finished(status: &TorrentStatus) -> Self {
        Self::with_status(EventName::TorrentFinished, status)
    }

    #[must_use]
    pub fn torrent_paused(status: &TorrentStatus) -> Self {
        Self::with_status(EventName::TorrentPaused, status)
    }

    #[must_use]
    pub fn torrent_resumed(status: &TorrentStatus) -> Self {
        Self::with_status(EventName::TorrentResumed, status)
    }

    /// Removed torrents only carry their info hash.
    #[must_use]
    pub fn torrent_removed(info_hash: &InfoHash) -> Self {
        let mut torrent = Map::new();
        torrent.insert(
            "info_hash".to_string(),
            serde_json::to_value(info_hash).unwrap_or(Value::Null),
        );
        Self::with_torrent(EventName::TorrentRemoved, Value::Object(torrent))
    }

    /// Every field of the event plus the reserved `event_name` variable.
    ///
    /// `event_name` always reflects [`Event::name`], even if a field of the
    /// same name exists.
    #[must_use]
    pub fn variables(&self) -> Variables {
        let mut variables: Variables = self
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        variables.insert(
            EVENT_NAME_VARIABLE.to_string(),
            Value::String(self.name.as_str().to_string()),
        );

        variables
    }
}
