//! Fetcher pour geo.api.gouv.fr (référentiel des communes)

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{ApiConfig, RetryPolicy};
use crate::fetcher::{Fetcher, RequestEngine};
use crate::types::CommuneInfo;
use crate::FetchError;

const COMMUNE_FIELDS: &str = "nom,code,population,codeDepartement,codeRegion";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommuneResponse {
    code: String,
    nom: String,
    /// Absente pour certaines communes déléguées
    population: Option<u64>,
    #[serde(default)]
    code_departement: String,
    #[serde(default)]
    code_region: String,
}

impl From<CommuneResponse> for CommuneInfo {
    fn from(r: CommuneResponse) -> Self {
        Self {
            citycode: r.code,
            nom: r.nom,
            population: r.population.unwrap_or(0),
            code_departement: r.code_departement,
            code_region: r.code_region,
        }
    }
}

/// Informations administratives des communes par code INSEE
#[derive(Debug)]
pub struct CommuneFetcher {
    engine: RequestEngine,
}

impl CommuneFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_config(ApiConfig::commune(), RetryPolicy::default())
    }

    pub fn with_config(config: ApiConfig, retry: RetryPolicy) -> Result<Self, FetchError> {
        Ok(Self {
            engine: RequestEngine::with_retry(config, retry)?,
        })
    }
}

#[async_trait]
impl Fetcher for CommuneFetcher {
    type Query = String;
    type Output = CommuneInfo;

    fn engine(&self) -> &RequestEngine {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut RequestEngine {
        &mut self.engine
    }

    /// `None` pour un code vide ou inconnu (404)
    async fn fetch_one(&mut self, citycode: &String) -> Result<Option<CommuneInfo>, FetchError> {
        let code = citycode.trim();
        if code.is_empty() {
            return Ok(None);
        }

        let endpoint = format!("/communes/{}", code);
        let Some(body) = self
            .engine
            .get_json(&endpoint, &[("fields", COMMUNE_FIELDS)])
            .await?
        else {
            return Ok(None);
        };

        let response: CommuneResponse = serde_json::from_value(body).map_err(|e| {
            self.engine.record_failure();
            FetchError::malformed(self.engine.config().url(&endpoint), e.to_string())
        })?;

        self.engine.record_item();
        Ok(Some(response.into()))
    }
}
