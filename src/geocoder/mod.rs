mod google;
mod local;

pub use google::{DEFAULT_ENDPOINT as DEFAULT_GOOGLE_ENDPOINT, GoogleGeocoder, extract_place};
pub use local::{Gazetteer, GazetteerPlace, LocalGeocoder};

use std::fmt;

use crate::config::Config;
use crate::error::GeocodeError;
use crate::record::{GeoPlace, ImageRecord};

/// How a single image's reverse-geocode request ended.
///
/// Every request ends in exactly one `Completion`; none of them abort the batch.
#[derive(Debug)]
pub enum Completion {
    /// Place fields were assigned to the record.
    Resolved { file: String },
    /// The record was not eligible for a lookup; no request was made.
    Skipped { file: String, reason: SkipReason },
    /// The lookup failed; the record was left untouched.
    Failed { file: String, error: GeocodeError },
    /// The batch was cancelled before this record's lookup started.
    Cancelled { file: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    StatusNotActive,
    MissingCoordinates,
}

impl Completion {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// Human-readable status line for progress reporting.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved { file } => write!(f, "Assigning location information to {file}"),
            Self::Skipped {
                file,
                reason: SkipReason::StatusNotActive,
            } => write!(f, "GPS status is not active for {file}, skipping"),
            Self::Skipped {
                file,
                reason: SkipReason::MissingCoordinates,
            } => write!(f, "No GPS coordinates in {file}, skipping"),
            Self::Failed { file, error } => write!(f, "No location for {file}: {error}"),
            Self::Cancelled { file } => write!(f, "Cancelled before geocoding {file}"),
        }
    }
}

/// A reverse-geocoding backend.
///
/// Implementations only resolve coordinates to a [`GeoPlace`] in
/// [`lookup`](ReverseGeocoder::lookup). The provided
/// [`reverse_geocode`](ReverseGeocoder::reverse_geocode) checks the record's
/// GPS fix first, and only ever touches the record's place fields.
///
/// # Example
///
/// ```rust,no_run
/// use geolocator::geocoder::{GoogleGeocoder, ReverseGeocoder};
/// use geolocator::record::ImageRecord;
///
/// # async fn example(record: &mut ImageRecord) {
/// let geocoder = GoogleGeocoder::new("AIza...".into());
/// let completion = geocoder.reverse_geocode(record).await;
/// println!("{}", completion.message());
/// # }
/// ```
#[async_trait::async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// The display name of this provider.
    fn name(&self) -> &str;

    /// Batch size from which callers should show visible progress. Advisory only.
    fn show_activity_count(&self) -> usize;

    /// Resolve signed decimal coordinates to a place.
    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<GeoPlace, GeocodeError>;

    /// Resolve `record`'s location and replace its place with the result.
    /// Fields the provider left out end up absent.
    ///
    /// Records without an active GPS fix complete immediately as skipped and
    /// never reach [`lookup`](ReverseGeocoder::lookup).
    async fn reverse_geocode(&self, record: &mut ImageRecord) -> Completion {
        let file = record.file_name();
        log::debug!("Begin reverse geocode for {file}");

        if !record.is_active() {
            return Completion::Skipped {
                file,
                reason: SkipReason::StatusNotActive,
            };
        }
        let Some((latitude, longitude)) = record.coordinates() else {
            return Completion::Skipped {
                file,
                reason: SkipReason::MissingCoordinates,
            };
        };

        match self.lookup(latitude, longitude).await {
            Ok(place) => {
                log::debug!("{file}: {place:?}");
                record.place = place;
                Completion::Resolved { file }
            }
            Err(error) => {
                log::warn!("{} lookup failed for {file}: {error}", self.name());
                Completion::Failed { file, error }
            }
        }
    }
}

/// Provider names in preference-index order.
pub const PROVIDERS: &[&str] = &["local", "google"];

/// Build the geocoder selected by `config.geocoder.active`.
///
/// A networked provider without an API key is disabled with a warning, and the
/// local provider is used instead; so is an out-of-range index.
pub fn build_geocoder(config: &Config) -> anyhow::Result<Box<dyn ReverseGeocoder>> {
    let settings = &config.geocoder;
    let mut active = settings.active;

    if active >= PROVIDERS.len() {
        log::warn!("Unknown geocoder index {active}, using the local geocoder");
        active = 0;
    }

    if PROVIDERS[active] == "google" {
        if settings.google.api_key.trim().is_empty() {
            log::warn!("Google geocoder selected but no API key configured, using the local geocoder");
        } else {
            return Ok(Box::new(
                GoogleGeocoder::new(settings.google.api_key.clone())
                    .with_endpoint(settings.google.endpoint.clone()),
            ));
        }
    }

    let gazetteer = match settings.local.gazetteer_path.as_deref() {
        Some(path) if !path.as_os_str().is_empty() => Gazetteer::load(path)?,
        _ => {
            log::warn!("No gazetteer configured for the local geocoder; lookups will find nothing");
            Gazetteer::default()
        }
    };
    Ok(Box::new(LocalGeocoder::new(
        gazetteer,
        settings.local.max_distance_km,
    )))
}
