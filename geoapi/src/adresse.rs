//! Fetcher pour l'API Adresse (Base Adresse Nationale)

use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;

use crate::config::{ApiConfig, RetryPolicy};
use crate::fetcher::{Fetcher, RequestEngine};
use crate::types::GeocodingResult;
use crate::FetchError;

const SEARCH_ENDPOINT: &str = "/search/";

/// Réponse de `/search/` (FeatureCollection GeoJSON)
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    features: Vec<BanFeature>,
}

#[derive(Debug, Deserialize)]
struct BanFeature {
    geometry: Option<BanGeometry>,
    #[serde(default)]
    properties: BanProperties,
}

#[derive(Debug, Deserialize)]
struct BanGeometry {
    /// [longitude, latitude]
    #[serde(default)]
    coordinates: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct BanProperties {
    label: Option<String>,
    score: Option<f64>,
    postcode: Option<String>,
    city: Option<String>,
    citycode: Option<String>,
}

/// Géocodage d'adresses via l'API Adresse
#[derive(Debug)]
pub struct AdresseFetcher {
    engine: RequestEngine,
}

impl AdresseFetcher {
    /// Fetcher sur l'API publique
    pub fn new() -> Result<Self, FetchError> {
        Self::with_config(ApiConfig::adresse(), RetryPolicy::default())
    }

    pub fn with_config(config: ApiConfig, retry: RetryPolicy) -> Result<Self, FetchError> {
        Ok(Self {
            engine: RequestEngine::with_retry(config, retry)?,
        })
    }
}

#[async_trait]
impl Fetcher for AdresseFetcher {
    type Query = String;
    type Output = GeocodingResult;

    fn engine(&self) -> &RequestEngine {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut RequestEngine {
        &mut self.engine
    }

    /// Géocode une adresse ; retourne toujours un résultat (dégénéré si rien trouvé)
    async fn fetch_one(&mut self, query: &String) -> Result<Option<GeocodingResult>, FetchError> {
        if query.trim().is_empty() {
            return Ok(Some(GeocodingResult::degenerate(query.as_str())));
        }

        let body = self
            .engine
            .get_json(SEARCH_ENDPOINT, &[("q", query.as_str()), ("limit", "1")])
            .await?;

        let Some(body) = body else {
            return Ok(Some(GeocodingResult::degenerate(query.as_str())));
        };

        let response: SearchResponse = match serde_json::from_value(body) {
            Ok(r) => r,
            Err(e) => {
                self.engine.record_failure();
                let url = self.engine.config().url(SEARCH_ENDPOINT);
                return Err(FetchError::malformed(url, e.to_string()));
            }
        };

        let Some(feature) = response.features.into_iter().next() else {
            // Aucun résultat trouvé
            return Ok(Some(GeocodingResult::degenerate(query.as_str())));
        };

        let (longitude, latitude) = match feature.geometry.as_ref().map(|g| g.coordinates.as_slice()) {
            Some([lon, lat, ..]) => (Some(*lon), Some(*lat)),
            _ => (None, None),
        };
        let props = feature.properties;

        self.engine.record_item();

        Ok(Some(GeocodingResult {
            query: query.clone(),
            label: props.label,
            latitude,
            longitude,
            score: props.score.unwrap_or(0.0),
            city: props.city,
            postcode: props.postcode,
            citycode: props.citycode,
            fetched_at: Local::now(),
        }))
    }
}
