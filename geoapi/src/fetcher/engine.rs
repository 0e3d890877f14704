//! Moteur de requêtes HTTP : retry, pacing et statistiques
//!
//! Partagé par composition entre tous les fetchers : chaque fetcher possède
//! son propre `RequestEngine`, donc ses propres compteurs.

use std::time::Duration;

use chrono::Local;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ApiConfig, RetryPolicy};
use crate::types::FetchStats;
use crate::FetchError;

/// Client HTTP d'une API avec retry borné et rate limiting fixe
#[derive(Debug)]
pub struct RequestEngine {
    config: ApiConfig,
    retry: RetryPolicy,
    client: reqwest::Client,
    stats: FetchStats,
}

impl RequestEngine {
    /// Crée un moteur avec la politique de retry par défaut (3 tentatives, 2 s → 20 s)
    pub fn new(config: ApiConfig) -> Result<Self, FetchError> {
        Self::with_retry(config, RetryPolicy::default())
    }

    pub fn with_retry(config: ApiConfig, retry: RetryPolicy) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(build_headers(&config)?)
            .build()
            .map_err(|e| FetchError::Config(e.to_string()))?;

        Ok(Self {
            config,
            retry,
            client,
            stats: FetchStats::default(),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Copie des statistiques courantes
    pub fn stats(&self) -> FetchStats {
        self.stats.clone()
    }

    /// Attend le délai de rate limit avant une opération de fetch
    pub async fn pace(&self) {
        let delay = self.config.rate_limit();
        if delay > Duration::ZERO {
            debug!(api = self.config.name(), "Rate limiting: waiting {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// GET JSON avec retry
    ///
    /// Retourne `Ok(None)` sur un 404. Les erreurs réseau et les autres
    /// statuts en erreur sont retentés selon la `RetryPolicy` ; un corps non
    /// JSON échoue immédiatement.
    pub async fn get_json(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, FetchError> {
        let url = self.config.url(endpoint);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.stats.requests_made += 1;

            match self.attempt(&url, params).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let wait = self.retry.backoff(attempt);
                    warn!(
                        api = self.config.name(),
                        url = %url,
                        attempt,
                        error = %err,
                        "Request failed, retrying in {:?}",
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(err) => {
                    self.stats.requests_failed += 1;
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&self, url: &str, params: &[(&str, &str)]) -> Result<Option<Value>, FetchError> {
        debug!(url = %url, params = ?params, "GET");

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "404, no resource");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| FetchError::malformed(url, e.to_string()))
    }

    /// Enregistre un élément récupéré
    pub fn record_item(&mut self) {
        self.stats.items_fetched += 1;
    }

    /// Enregistre un échec détecté après la requête (réponse inexploitable)
    pub fn record_failure(&mut self) {
        self.stats.requests_failed += 1;
    }

    pub(crate) fn mark_started(&mut self) {
        self.stats.start_time = Some(Local::now());
        self.stats.end_time = None;
    }

    pub(crate) fn mark_finished(&mut self) {
        self.stats.end_time = Some(Local::now());
    }
}

fn build_headers(config: &ApiConfig) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    for (name, value) in config.headers() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::Config(format!("header {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::Config(format!("header {}: {}", name, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
