//! Generic Report Model
//!
//! A snapshot is an ordered list of named sections whose values have
//! runtime-determined shape. Every value is one of four closed variants, so
//! rendering and serialization never meet an unknown shape.

use crate::result::{ScopeError, ScopeResult};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Recursive report value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonValue {
    /// A scalar, always held as text
    Text(String),
    /// Ordered list
    List(Vec<JsonValue>),
    /// Order-preserving named groups (e.g. storage sub-stores)
    NamedList(Vec<(String, JsonValue)>),
    /// Mapping; key order is not meaningful
    Map(BTreeMap<String, JsonValue>),
}

/// The four shapes a value can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonKind {
    /// Named groups
    NamedList,
    /// Ordered list
    List,
    /// Mapping
    Map,
    /// Scalar text
    Text,
}

/// Classify a value for rendering
#[must_use]
pub fn classify(value: &JsonValue) -> JsonKind {
    match value {
        JsonValue::NamedList(_) => JsonKind::NamedList,
        JsonValue::List(_) => JsonKind::List,
        JsonValue::Map(_) => JsonKind::Map,
        JsonValue::Text(_) => JsonKind::Text,
    }
}

impl JsonValue {
    /// Empty text
    #[must_use]
    pub const fn empty_text() -> Self {
        Self::Text(String::new())
    }

    /// Shape of this value
    #[must_use]
    pub fn kind(&self) -> JsonKind {
        classify(self)
    }

    /// Whether the value holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::NamedList(entries) => entries.is_empty(),
            Self::Map(map) => map.is_empty(),
        }
    }

    /// List of text values
    #[must_use]
    pub fn text_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Text(s.into())).collect())
    }

    /// Mapping of text values
    #[must_use]
    pub fn text_map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), Self::Text(v.into())))
                .collect(),
        )
    }

    /// Convert arbitrary JSON
    ///
    /// Objects become mappings; numbers, booleans and null become text.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Text(String::from("null")),
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => Self::Text(n.to_string()),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(object) => Self::Map(
                object
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to plain JSON; named lists become objects
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::NamedList(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Map(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl Serialize for JsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::NamedList(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Report categories, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionKey {
    /// Document markup
    Html,
    /// Network call records
    Network,
    /// Cookies, local and session storage
    Storage,
    /// Console lines
    Console,
    /// Page sources (always empty)
    Sources,
}

impl SectionKey {
    /// Every section, in report order
    pub const ALL: [Self; 5] = [
        Self::Html,
        Self::Network,
        Self::Storage,
        Self::Console,
        Self::Sources,
    ];

    /// Key used in the exported text
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Console => "console",
            Self::Sources => "sources",
        }
    }

    /// Look up a key by name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Value used when the section has no data
    #[must_use]
    pub fn empty_value(&self) -> JsonValue {
        match self {
            Self::Html => JsonValue::empty_text(),
            Self::Network | Self::Console => JsonValue::List(Vec::new()),
            Self::Storage => JsonValue::NamedList(Vec::new()),
            Self::Sources => JsonValue::Map(BTreeMap::new()),
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage sub-store names, in report order
pub const STORAGE_STORES: [&str; 3] = ["Cookies", "LocalStorage", "SessionStorage"];

/// One named, independently renderable part of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    /// Category
    pub key: SectionKey,
    /// Content
    pub value: JsonValue,
}

impl ReportSection {
    /// Create a section
    #[must_use]
    pub const fn new(key: SectionKey, value: JsonValue) -> Self {
        Self { key, value }
    }
}

/// One complete, ordered capture of every report section
///
/// Always holds exactly one section per [`SectionKey`], in
/// [`SectionKey::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    sections: Vec<ReportSection>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::from_sections(std::iter::empty())
    }
}

impl Snapshot {
    /// Build a snapshot; missing sections are filled with empty values
    ///
    /// If a key appears more than once the last value wins.
    #[must_use]
    pub fn from_sections(sections: impl IntoIterator<Item = ReportSection>) -> Self {
        let mut slots: BTreeMap<SectionKey, JsonValue> = BTreeMap::new();
        for section in sections {
            slots.insert(section.key, section.value);
        }
        let sections = SectionKey::ALL
            .into_iter()
            .map(|key| {
                let value = slots.remove(&key).unwrap_or_else(|| key.empty_value());
                ReportSection::new(key, value)
            })
            .collect();
        Self { sections }
    }

    /// Sections in report order
    #[must_use]
    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    /// Value of one section
    #[must_use]
    pub fn section(&self, key: SectionKey) -> &JsonValue {
        // Every key has a slot by construction.
        &self.sections[key as usize].value
    }

    /// Take ownership of the sections
    #[must_use]
    pub fn into_sections(self) -> Vec<ReportSection> {
        self.sections
    }

    /// Pretty-printed JSON export
    ///
    /// A pure function of the snapshot: equal snapshots give equal text.
    #[must_use]
    pub fn to_serialized_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "snapshot serialization failed");
            String::from("null")
        })
    }

    /// Parse exported text back into a snapshot
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a JSON object
    pub fn from_serialized_text(text: &str) -> ScopeResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        let object = value
            .as_object()
            .ok_or_else(|| ScopeError::invalid_report("top level is not an object"))?;

        let sections = SectionKey::ALL.into_iter().filter_map(|key| {
            let raw = object.get(key.as_str())?;
            let value = match (key, raw) {
                (SectionKey::Storage, Value::Object(stores)) => storage_from_json(stores),
                _ => JsonValue::from_json(raw),
            };
            Some(ReportSection::new(key, value))
        });
        Ok(Self::from_sections(sections))
    }
}

fn storage_from_json(stores: &serde_json::Map<String, Value>) -> JsonValue {
    let mut entries: Vec<(String, JsonValue)> = STORAGE_STORES
        .iter()
        .filter_map(|name| {
            stores
                .get(*name)
                .map(|v| ((*name).to_string(), JsonValue::from_json(v)))
        })
        .collect();
    let mut extra: Vec<(&String, &Value)> = stores
        .iter()
        .filter(|(k, _)| !STORAGE_STORES.contains(&k.as_str()))
        .collect();
    extra.sort_by(|a, b| a.0.cmp(b.0));
    entries.extend(
        extra
            .into_iter()
            .map(|(k, v)| (k.clone(), JsonValue::from_json(v))),
    );
    JsonValue::NamedList(entries)
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(section.key.as_str(), &section.value)?;
        }
        map.end()
    }
}
