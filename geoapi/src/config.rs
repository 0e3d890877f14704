//! Configuration des APIs REST et de la politique de retry

use std::collections::HashMap;
use std::time::Duration;

/// URL de l'API Adresse (Base Adresse Nationale)
pub const ADRESSE_BASE_URL: &str = "https://api-adresse.data.gouv.fr";

/// URL de l'API geo.api.gouv.fr (référentiel des communes)
pub const COMMUNE_BASE_URL: &str = "https://geo.api.gouv.fr";

/// Description immuable d'une API REST distante
///
/// Une instance par API, construite au démarrage puis confiée à un fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    name: String,
    base_url: String,
    timeout: Duration,
    rate_limit: Duration,
    headers: HashMap<String, String>,
}

impl ApiConfig {
    /// Crée une configuration avec un timeout de 10 s et sans rate limit
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(10),
            rate_limit: Duration::ZERO,
            headers: HashMap::new(),
        }
    }

    /// API Adresse, géocodage BAN
    pub fn adresse() -> Self {
        Self::new("API Adresse (BAN)", ADRESSE_BASE_URL)
            .with_timeout(Duration::from_secs(10))
            .with_rate_limit(Duration::from_millis(100))
    }

    /// geo.api.gouv.fr, données communes
    pub fn commune() -> Self {
        Self::new("Geo API Gouv - Communes", COMMUNE_BASE_URL)
            .with_timeout(Duration::from_secs(10))
            .with_rate_limit(Duration::from_millis(100))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Délai minimal entre deux opérations de fetch
    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn rate_limit(&self) -> Duration {
        self.rate_limit
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Construit l'URL complète d'un endpoint
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

/// Politique de retry avec backoff exponentiel borné
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Nombre total de tentatives (la première incluse)
    pub max_attempts: u32,
    /// Attente après le premier échec
    pub initial_backoff: Duration,
    /// Plafond de l'attente
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Attente à observer après la tentative `attempt` (1-indexée) en échec
    ///
    /// 2 s, 4 s, 8 s... plafonné à `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.initial_backoff.saturating_mul(1u32 << exponent);
        delay.min(self.max_backoff)
    }
}
