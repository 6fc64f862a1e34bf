use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::ReverseGeocoder;
use crate::error::GeocodeError;
use crate::record::GeoPlace;

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// One named point in a gazetteer file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazetteerPlace {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
}

impl GazetteerPlace {
    fn to_place(&self) -> GeoPlace {
        GeoPlace {
            country: self.country.clone(),
            state: self.state.clone(),
            city: self.city.clone(),
            neighborhood: self.neighborhood.clone(),
            route: None,
        }
    }
}

/// An offline list of places, loaded from a JSON array of [`GazetteerPlace`].
///
/// ```json
/// [
///   { "latitude": 48.8566, "longitude": 2.3522,
///     "country": "France", "state": "Île-de-France", "city": "Paris" }
/// ]
/// ```
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    places: Vec<GazetteerPlace>,
}

impl Gazetteer {
    pub fn new(places: Vec<GazetteerPlace>) -> Self {
        Self { places }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read gazetteer {}", path.display()))?;
        let places: Vec<GazetteerPlace> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse gazetteer {}", path.display()))?;
        log::info!("Loaded {} places from {}", places.len(), path.display());
        Ok(Self { places })
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    /// The closest place within `max_distance_km`, with its distance.
    pub fn nearest(
        &self,
        latitude: f64,
        longitude: f64,
        max_distance_km: f64,
    ) -> Option<(&GazetteerPlace, f64)> {
        self.places
            .iter()
            .map(|p| (p, haversine_km(latitude, longitude, p.latitude, p.longitude)))
            .filter(|(_, d)| *d <= max_distance_km)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// On-device reverse geocoding against a [`Gazetteer`].
///
/// Makes no network calls. Each lookup scans the gazetteer on the blocking
/// pool, so large files do not stall the runtime.
pub struct LocalGeocoder {
    gazetteer: Arc<Gazetteer>,
    max_distance_km: f64,
}

impl LocalGeocoder {
    pub fn new(gazetteer: Gazetteer, max_distance_km: f64) -> Self {
        Self {
            gazetteer: Arc::new(gazetteer),
            max_distance_km,
        }
    }
}

#[async_trait::async_trait]
impl ReverseGeocoder for LocalGeocoder {
    fn name(&self) -> &str {
        "Local"
    }

    fn show_activity_count(&self) -> usize {
        100
    }

    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<GeoPlace, GeocodeError> {
        let gazetteer = Arc::clone(&self.gazetteer);
        let max_distance_km = self.max_distance_km;

        tokio::task::spawn_blocking(move || -> Result<GeoPlace, GeocodeError> {
            let (place, distance) = gazetteer
                .nearest(latitude, longitude, max_distance_km)
                .ok_or(GeocodeError::NoResult)?;
            log::trace!("Nearest gazetteer place is {distance:.1} km away");
            Ok(place.to_place())
        })
        .await
        .map_err(|e| GeocodeError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::GpsStatus;
    use crate::record::ImageRecord;
    use tempfile::TempDir;

    fn gazetteer() -> Gazetteer {
        Gazetteer::new(vec![
            GazetteerPlace {
                latitude: 37.7793,
                longitude: -122.4193,
                country: Some("USA".into()),
                state: Some("California".into()),
                city: Some("San Francisco".into()),
                neighborhood: None,
            },
            GazetteerPlace {
                latitude: 37.8044,
                longitude: -122.2712,
                country: Some("USA".into()),
                state: Some("California".into()),
                city: Some("Oakland".into()),
                neighborhood: None,
            },
        ])
    }

    #[test]
    fn haversine_known_distance() {
        // Paris to London is roughly 344 km.
        let d = haversine_km(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((d - 343.5).abs() < 2.0, "{d}");
        assert_eq!(haversine_km(10.0, 20.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn nearest_respects_max_distance() {
        let g = gazetteer();
        let (place, _) = g.nearest(37.7749, -122.4194, 25.0).unwrap();
        assert_eq!(place.city.as_deref(), Some("San Francisco"));
        let (place, _) = g.nearest(37.80, -122.27, 25.0).unwrap();
        assert_eq!(place.city.as_deref(), Some("Oakland"));
        assert!(g.nearest(48.8566, 2.3522, 25.0).is_none());
    }

    #[tokio::test]
    async fn resolves_nearest_place() {
        let geocoder = LocalGeocoder::new(gazetteer(), 25.0);
        let mut record = ImageRecord::new("/p/img1.jpg");
        record.latitude = Some(37.7749);
        record.longitude = Some(-122.4194);
        record.status = Some(GpsStatus::Active);

        let completion = geocoder.reverse_geocode(&mut record).await;
        assert!(completion.is_resolved());
        assert_eq!(record.place.city.as_deref(), Some("San Francisco"));
        assert_eq!(record.place.neighborhood, None);
    }

    #[tokio::test]
    async fn empty_gazetteer_finds_nothing() {
        let geocoder = LocalGeocoder::new(Gazetteer::default(), 25.0);
        let err = geocoder.lookup(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, GeocodeError::NoResult));
    }

    #[test]
    fn load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("places.json");
        std::fs::write(
            &path,
            r#"[{ "latitude": 48.8566, "longitude": 2.3522, "country": "France", "city": "Paris" }]"#,
        )
        .unwrap();

        let g = Gazetteer::load(&path).unwrap();
        assert_eq!(g.len(), 1);
        let (place, _) = g.nearest(48.86, 2.35, 5.0).unwrap();
        assert_eq!(place.country.as_deref(), Some("France"));
        assert_eq!(place.state, None);
    }

    #[test]
    fn load_rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("places.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(Gazetteer::load(&path).is_err());
    }
}
