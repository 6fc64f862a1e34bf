use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use crate::gps::GpsStatus;
use crate::metadata::{Metadata, TagKey, tags};

/// Human-readable place fields, as stored in IPTC.
///
/// Every field is optional. A lookup that succeeded with nothing filled in is
/// still a success; a failed lookup produces no `GeoPlace` at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoPlace {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
    /// Street or route; written as an IPTC keyword.
    pub route: Option<String>,
}

impl GeoPlace {
    pub fn is_empty(&self) -> bool {
        self.fields().all(|(_, v)| v.is_none())
    }

    /// Place fields paired with the IPTC tag each one is stored in.
    pub fn fields(&self) -> impl Iterator<Item = (TagKey, Option<&str>)> {
        [
            (tags::COUNTRY, self.country.as_deref()),
            (tags::STATE, self.state.as_deref()),
            (tags::CITY, self.city.as_deref()),
            (tags::NEIGHBORHOOD, self.neighborhood.as_deref()),
            (tags::KEYWORDS, self.route.as_deref()),
        ]
        .into_iter()
    }

    /// The metadata edits needed to store this place: one entry per non-empty field.
    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        for (key, value) in self.fields() {
            if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                metadata.set(key, value);
            }
        }
        metadata
    }
}

/// One image file in the working set.
///
/// Identity is the absolute path; two records for the same file are equal even
/// if their metadata differs. Latitude and longitude are only meaningful when
/// `status` is [`GpsStatus::Active`]; use [`ImageRecord::coordinates`] rather
/// than reading them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub captured_at: Option<NaiveDateTime>,
    /// Signed decimal degrees, positive north.
    pub latitude: Option<f64>,
    /// Signed decimal degrees, positive east.
    pub longitude: Option<f64>,
    pub status: Option<GpsStatus>,
    pub place: GeoPlace,
}

impl ImageRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            captured_at: None,
            latitude: None,
            longitude: None,
            status: None,
            place: GeoPlace::default(),
        }
    }

    /// Populate a record from the metadata read for `path`.
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &Metadata) -> Self {
        let latitude = metadata.try_float(tags::COMPOSITE_LATITUDE).or_else(|| {
            let magnitude = metadata.try_float(tags::GPS_LATITUDE)?;
            Some(match metadata.direction(tags::GPS_LATITUDE_REF) {
                Some(direction) => direction.sign(magnitude),
                None => magnitude,
            })
        });
        let longitude = metadata.try_float(tags::COMPOSITE_LONGITUDE).or_else(|| {
            let magnitude = metadata.try_float(tags::GPS_LONGITUDE)?;
            Some(match metadata.direction(tags::GPS_LONGITUDE_REF) {
                Some(direction) => direction.sign(magnitude),
                None => magnitude,
            })
        });

        Self {
            path: path.into(),
            captured_at: metadata.date(tags::DATE_TIME_ORIGINAL),
            latitude,
            longitude,
            status: metadata.gps_status(tags::GPS_STATUS),
            place: GeoPlace {
                country: metadata.string(tags::COUNTRY),
                state: metadata.string(tags::STATE),
                city: metadata.string(tags::CITY),
                neighborhood: metadata.string(tags::NEIGHBORHOOD),
                route: None,
            },
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn is_active(&self) -> bool {
        self.status.is_some_and(GpsStatus::is_active)
    }

    /// `(latitude, longitude)` if the fix is active and both values are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        if !self.is_active() {
            return None;
        }
        Some((self.latitude?, self.longitude?))
    }
}

impl PartialEq for ImageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ImageRecord {}

impl Hash for ImageRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}
