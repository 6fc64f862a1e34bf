//! Presentation strings for image records. Pure functions, no I/O.

use geolocator::metadata::EXIF_DATE_FORMAT;
use geolocator::record::{GeoPlace, ImageRecord};

const NONE: &str = "none";

pub fn display_name(record: &ImageRecord) -> String {
    record.file_name()
}

pub fn display_date(record: &ImageRecord) -> String {
    record
        .captured_at
        .map(|d| d.format(EXIF_DATE_FORMAT).to_string())
        .unwrap_or_else(|| NONE.to_string())
}

pub fn display_status(record: &ImageRecord) -> String {
    record
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| NONE.to_string())
}

/// Signed decimal degrees, six places; `none` unless both values are present.
pub fn display_coordinates(record: &ImageRecord) -> String {
    match (record.latitude, record.longitude) {
        (Some(lat), Some(lon)) => format!("{lat:.6}, {lon:.6}"),
        _ => NONE.to_string(),
    }
}

/// `country, state, city`, with `none` standing in for each absent part.
pub fn display_place(place: &GeoPlace) -> String {
    [&place.country, &place.state, &place.city]
        .iter()
        .map(|field| field.as_deref().filter(|v| !v.is_empty()).unwrap_or(NONE))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn display_neighborhood(place: &GeoPlace) -> String {
    place
        .neighborhood
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(NONE)
        .to_string()
}
