use reqwest::Client;
use serde_json::Value;

use super::ReverseGeocoder;
use crate::error::GeocodeError;
use crate::record::GeoPlace;

pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Reverse geocoding through the Google Geocoding web API.
pub struct GoogleGeocoder {
    api_key: String,
    endpoint: String,
    client: Client,
}

impl GoogleGeocoder {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client: Client::new(),
        }
    }

    /// Point requests at a different base URL. An empty string keeps the default.
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        if !endpoint.trim().is_empty() {
            self.endpoint = endpoint;
        }
        self
    }

    pub fn request_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}?latlng={latitude},{longitude}&key={}",
            self.endpoint, self.api_key
        )
    }
}

#[async_trait::async_trait]
impl ReverseGeocoder for GoogleGeocoder {
    fn name(&self) -> &str {
        "Google"
    }

    fn show_activity_count(&self) -> usize {
        50
    }

    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<GeoPlace, GeocodeError> {
        let resp = self
            .client
            .get(self.request_url(latitude, longitude))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(GeocodeError::Provider {
                status: status.to_string(),
                message: text,
            });
        }

        let json: Value = serde_json::from_str(&text)?;
        check_status(&json)?;
        extract_place(&json).ok_or(GeocodeError::Extraction)
    }
}

/// Map the API's `status` field to an error. A missing status is treated as OK.
fn check_status(json: &Value) -> Result<(), GeocodeError> {
    match json["status"].as_str() {
        None | Some("OK") => Ok(()),
        Some("ZERO_RESULTS") => Err(GeocodeError::NoResult),
        Some(status) => Err(GeocodeError::Provider {
            status: status.to_string(),
            message: json["error_message"].as_str().unwrap_or_default().to_string(),
        }),
    }
}

/// Pull place fields from the first result's `address_components`.
///
/// Each component contributes `long_name` to the first field its `types`
/// match, checked in the order country, state, city, route, neighborhood.
/// Returns `None` when the response has no first result or that result has no
/// component list.
pub fn extract_place(json: &Value) -> Option<GeoPlace> {
    let components = json.get("results")?.get(0)?.get("address_components")?.as_array()?;

    let mut place = GeoPlace::default();
    for component in components {
        let Some(name) = component["long_name"].as_str() else {
            continue;
        };
        let Some(types) = component["types"].as_array() else {
            continue;
        };
        let has = |t: &str| types.iter().any(|v| v.as_str() == Some(t));

        let field = if has("country") {
            &mut place.country
        } else if has("administrative_area_level_1") {
            &mut place.state
        } else if has("locality") {
            &mut place.city
        } else if has("route") {
            &mut place.route
        } else if has("neighborhood") {
            &mut place.neighborhood
        } else {
            continue;
        };
        *field = Some(name.to_string());
    }
    Some(place)
}
