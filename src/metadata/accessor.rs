use chrono::NaiveDateTime;
use serde_json::{Map, Number};
use std::collections::BTreeMap;
use std::fmt;

use crate::gps::{Direction, GpsStatus};

/// EXIF timestamp layout (`DateTimeOriginal` and friends).
pub const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// A `(group, tag)` pair naming one metadata value, e.g. `IPTC:City`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagKey {
    pub group: &'static str,
    pub name: &'static str,
}

impl TagKey {
    pub const fn new(group: &'static str, name: &'static str) -> Self {
        Self { group, name }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// Tags this crate reads or writes.
pub mod tags {
    use super::TagKey;

    pub const FILE_NAME: TagKey = TagKey::new("File", "FileName");
    pub const DATE_TIME_ORIGINAL: TagKey = TagKey::new("EXIF", "DateTimeOriginal");

    pub const GPS_LATITUDE: TagKey = TagKey::new("EXIF", "GPSLatitude");
    pub const GPS_LATITUDE_REF: TagKey = TagKey::new("EXIF", "GPSLatitudeRef");
    pub const GPS_LONGITUDE: TagKey = TagKey::new("EXIF", "GPSLongitude");
    pub const GPS_LONGITUDE_REF: TagKey = TagKey::new("EXIF", "GPSLongitudeRef");
    pub const GPS_STATUS: TagKey = TagKey::new("EXIF", "GPSStatus");

    /// Already signed by exiftool.
    pub const COMPOSITE_LATITUDE: TagKey = TagKey::new("Composite", "GPSLatitude");
    pub const COMPOSITE_LONGITUDE: TagKey = TagKey::new("Composite", "GPSLongitude");

    pub const COUNTRY: TagKey = TagKey::new("IPTC", "Country-PrimaryLocationName");
    pub const STATE: TagKey = TagKey::new("IPTC", "Province-State");
    pub const CITY: TagKey = TagKey::new("IPTC", "City");
    pub const NEIGHBORHOOD: TagKey = TagKey::new("IPTC", "Sub-location");
    pub const KEYWORDS: TagKey = TagKey::new("IPTC", "Keywords");

    /// Group exiftool reports per-file failures in.
    pub const TOOL_ERROR: TagKey = TagKey::new("ExifTool", "Error");
}

/// A loosely typed metadata value as reported by the extraction tool.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDateTime),
}

impl Value {
    /// Convert a JSON scalar. Lists are joined with `", "`; `null` and objects have no value.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            serde_json::Value::Bool(b) => Some(Self::String(b.to_string())),
            serde_json::Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(Self::from_json)
                    .map(|v| v.to_string())
                    .collect();
                Some(Self::String(parts.join(", ")))
            }
            serde_json::Value::Null | serde_json::Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Integer(i) => serde_json::Value::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Date(d) => serde_json::Value::String(d.format(EXIF_DATE_FORMAT).to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Date(d) => write!(f, "{}", d.format(EXIF_DATE_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

/// Typed view over one image's metadata groups.
///
/// Lookups never fail: a missing group or tag is simply `None`, and the typed
/// getters fall back to a default when a value cannot be coerced, because not
/// every image populates every tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    groups: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from one grouped exiftool JSON record (`-json -g`).
    ///
    /// Top-level scalars such as `SourceFile` are not part of any group and are ignored.
    pub fn from_json(record: &Map<String, serde_json::Value>) -> Self {
        let mut metadata = Self::new();
        for (group, tags) in record {
            let Some(tags) = tags.as_object() else {
                continue;
            };
            let entries = metadata.groups.entry(group.clone()).or_default();
            for (name, value) in tags {
                if let Some(value) = Value::from_json(value) {
                    entries.insert(name.clone(), value);
                }
            }
        }
        metadata
    }

    /// Grouped JSON object, the layout `from_json` reads.
    pub fn to_json(&self) -> Map<String, serde_json::Value> {
        let mut map = Map::new();
        for (group, tags) in &self.groups {
            let tags: Map<String, serde_json::Value> = tags
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect();
            map.insert(group.clone(), serde_json::Value::Object(tags));
        }
        map
    }

    /// Copy every value of `other` over this one.
    pub fn merge(&mut self, other: &Metadata) {
        for (group, tags) in &other.groups {
            let entries = self.groups.entry(group.clone()).or_default();
            for (name, value) in tags {
                entries.insert(name.clone(), value.clone());
            }
        }
    }

    /// Flatten into `"Group:Tag": value` pairs, the form exiftool imports with `-json=`.
    pub fn to_flat_json(&self) -> Map<String, serde_json::Value> {
        let mut map = Map::new();
        for (group, tags) in &self.groups {
            for (name, value) in tags {
                map.insert(format!("{group}:{name}"), value.to_json());
            }
        }
        map
    }

    pub fn get(&self, key: TagKey) -> Option<&Value> {
        self.groups.get(key.group)?.get(key.name)
    }

    pub fn set(&mut self, key: TagKey, value: impl Into<Value>) {
        self.groups
            .entry(key.group.to_string())
            .or_default()
            .insert(key.name.to_string(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(|g| g.is_empty())
    }

    /// Every `(tag, value)` pair, ordered by group then tag.
    pub fn entries(&self) -> impl Iterator<Item = (String, &Value)> {
        self.groups.iter().flat_map(|(group, tags)| {
            tags.iter()
                .map(move |(name, value)| (format!("{group}:{name}"), value))
        })
    }

    /// Text value; numbers are rendered, empty strings count as absent.
    pub fn string(&self, key: TagKey) -> Option<String> {
        let s = self.get(key)?.to_string();
        let s = s.trim();
        if s.is_empty() { None } else { Some(s.to_string()) }
    }

    /// Integer value, `0` when absent or not numeric.
    pub fn integer(&self, key: TagKey) -> i64 {
        match self.get(key) {
            Some(Value::Integer(i)) => *i,
            Some(Value::Float(f)) => *f as i64,
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    /// Floating-point value, `0.0` when absent or not numeric.
    pub fn float(&self, key: TagKey) -> f64 {
        self.try_float(key).unwrap_or(0.0)
    }

    /// Floating-point value, `None` when absent or not numeric.
    pub fn try_float(&self, key: TagKey) -> Option<f64> {
        match self.get(key)? {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::String(s) => s.trim().parse().ok(),
            Value::Date(_) => None,
        }
    }

    /// Timestamp in the EXIF `yyyy:MM:dd HH:mm:ss` layout.
    pub fn date(&self, key: TagKey) -> Option<NaiveDateTime> {
        match self.get(key)? {
            Value::Date(d) => Some(*d),
            Value::String(s) => NaiveDateTime::parse_from_str(s.trim(), EXIF_DATE_FORMAT).ok(),
            _ => None,
        }
    }

    pub fn direction(&self, key: TagKey) -> Option<Direction> {
        match self.get(key)? {
            Value::String(s) => Direction::parse(s),
            _ => None,
        }
    }

    pub fn gps_status(&self, key: TagKey) -> Option<GpsStatus> {
        match self.get(key)? {
            Value::String(s) => GpsStatus::parse(s),
            _ => None,
        }
    }
}
