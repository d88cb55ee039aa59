use crate::error::{GedcomError, Result};
use crate::types::Location;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";

/// Place lookup capability. Implementations swallow their own failures:
/// an unreachable service or a missing credential is an empty result.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, place: &str) -> Option<Location>;
}

/// Stand-in used when no access token is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableGeocoder;

#[async_trait]
impl Geocoder for UnavailableGeocoder {
    async fn lookup(&self, place: &str) -> Option<Location> {
        debug!("Geocoding unavailable; skipping {:?}", place);
        None
    }
}

/// Mapbox forward-geocoding client
pub struct MapboxGeocoder {
    client: Client,
    access_token: String,
    base_url: String,
}

impl MapboxGeocoder {
    pub fn new(access_token: String, base_url: Option<String>, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| GedcomError::Geocoding(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            access_token,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    /// `<base>/<place>.json`, with the place text percent-encoded as a path segment
    fn endpoint(&self, place: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GedcomError::Geocoding(format!("Invalid base URL {}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| GedcomError::Geocoding(format!("Base URL cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .push(&format!("{}.json", place));

        Ok(url)
    }

    async fn request(&self, place: &str) -> Result<Option<Location>> {
        let url = self.endpoint(place)?;

        let response = self
            .client
            .get(url)
            .query(&[("access_token", self.access_token.as_str()), ("limit", "1")])
            .send()
            .await
            .map_err(|e| GedcomError::Geocoding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GedcomError::Geocoding(format!("Mapbox API error: {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GedcomError::Geocoding(format!("Invalid response body: {}", e)))?;

        Ok(parse_response(&body))
    }
}

#[async_trait]
impl Geocoder for MapboxGeocoder {
    async fn lookup(&self, place: &str) -> Option<Location> {
        match self.request(place).await {
            Ok(location) => {
                debug!("Geocoded {:?}: {:?}", place, location);
                location
            }
            Err(e) => {
                warn!("Geocoding {:?} failed: {}", place, e);
                None
            }
        }
    }
}

/// First feature of a Mapbox response. `center` is `[longitude, latitude]`.
pub(crate) fn parse_response(body: &Value) -> Option<Location> {
    let feature = body.get("features")?.as_array()?.first()?;
    let display_name = feature.get("place_name")?.as_str()?.to_string();
    let center = feature.get("center")?.as_array()?;
    let longitude = center.first()?.as_f64()?;
    let latitude = center.get(1)?.as_f64()?;

    Some(Location {
        display_name,
        coordinates: (latitude, longitude),
    })
}

/// Build the geocoding capability for this process. Without a token every
/// lookup resolves to nothing.
pub fn build_geocoder(
    access_token: Option<String>,
    base_url: Option<String>,
    timeout_seconds: u64,
) -> Result<Box<dyn Geocoder>> {
    match access_token.filter(|token| !token.trim().is_empty()) {
        Some(token) => Ok(Box::new(MapboxGeocoder::new(token, base_url, timeout_seconds)?)),
        None => {
            info!("No geocoding access token configured; place lookups are disabled");
            Ok(Box::new(UnavailableGeocoder))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_response() {
        let body = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "place_name": "Boston, Massachusetts, United States",
                    "center": [-71.0596, 42.3605]
                },
                {
                    "place_name": "Boston, Lincolnshire, England",
                    "center": [-0.0266, 52.9763]
                }
            ]
        });

        let location = parse_response(&body).unwrap();
        assert_eq!(location.display_name, "Boston, Massachusetts, United States");
        assert_eq!(location.coordinates, (42.3605, -71.0596));
    }

    #[test]
    fn test_parse_response_without_features() {
        assert_eq!(parse_response(&json!({"features": []})), None);
        assert_eq!(parse_response(&json!({"message": "Not Authorized"})), None);
        assert_eq!(parse_response(&json!({"features": [{"place_name": "x"}]})), None);
    }

    #[test]
    fn test_endpoint_encodes_place() {
        let geocoder =
            MapboxGeocoder::new("token".to_string(), Some("https://geo.example.com/places/".to_string()), 5)
                .unwrap();

        let url = geocoder.endpoint("Salem, Essex/MA").unwrap();
        assert_eq!(url.as_str(), "https://geo.example.com/places/Salem,%20Essex%2FMA.json");
    }

    #[tokio::test]
    async fn test_unavailable_geocoder_is_always_empty() {
        let geocoder = build_geocoder(None, None, 5).unwrap();
        assert_eq!(geocoder.lookup("Boston").await, None);

        let geocoder = build_geocoder(Some("  ".to_string()), None, 5).unwrap();
        assert_eq!(geocoder.lookup("London").await, None);
    }

    #[tokio::test]
    async fn test_unreachable_service_degrades_to_empty() {
        let geocoder =
            MapboxGeocoder::new("token".to_string(), Some("http://127.0.0.1:9/places".to_string()), 1).unwrap();

        assert_eq!(geocoder.lookup("Boston").await, None);
    }
}
