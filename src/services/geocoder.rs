use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::GeocoderConfig;
use crate::database::models::Location;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Could not find location for the specified address")]
    NoResults,

    #[error("Geocoding service answered with status {0}")]
    Upstream(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Resolves a postal address to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, address: &str) -> Result<Location, GeocodeError>;
}

/// Picks the Google geocoder when an API key is configured.
pub fn from_config(config: &GeocoderConfig) -> Result<Box<dyn Geocoder>, GeocodeError> {
    match &config.api_key {
        Some(key) => Ok(Box::new(GoogleGeocoder::new(&config.api_base, key.clone())?)),
        None => {
            let (lat, lng) = config.fallback;
            tracing::warn!("No geocoder API key configured, every address resolves to ({lat}, {lng})");
            Ok(Box::new(FixedGeocoder::new(Location { lat, lng })))
        }
    }
}

/// Answers every address with the same coordinates.
pub struct FixedGeocoder {
    location: Location,
}

impl FixedGeocoder {
    pub fn new(location: Location) -> Self {
        Self { location }
    }
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn resolve(&self, _address: &str) -> Result<Location, GeocodeError> {
        Ok(self.location)
    }
}

pub struct GoogleGeocoder {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

impl GoogleGeocoder {
    pub fn new(api_base: &str, api_key: String) -> Result<Self, GeocodeError> {
        let endpoint = Url::parse(api_base)?.join("/maps/api/geocode/json")?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    #[tracing::instrument(name = "GoogleGeocoder::resolve", skip(self))]
    async fn resolve(&self, address: &str) -> Result<Location, GeocodeError> {
        let res = self
            .client
            .get(self.endpoint.clone())
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let data: GeocodeResponse = res.json().await?;
        first_location(data)
    }
}

fn first_location(data: GeocodeResponse) -> Result<Location, GeocodeError> {
    match data.status.as_str() {
        "OK" => data
            .results
            .into_iter()
            .next()
            .map(|r| r.geometry.location)
            .ok_or(GeocodeError::NoResults),
        "ZERO_RESULTS" => Err(GeocodeError::NoResults),
        other => Err(GeocodeError::Upstream(other.to_string())),
    }
}
