//! Configuration du pipeline
//!
//! Valeurs par défaut, surchargées par un fichier JSON optionnel puis par
//! les variables d'environnement (`.env` compris).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geoapi::ApiConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::quality::QualityThresholds;

/// Dossier des données
pub const ENV_DATA_DIR: &str = "GEO_DATA_DIR";
/// Nombre maximal d'adresses géocodées par exécution
pub const ENV_MAX_ITEMS: &str = "GEO_MAX_ITEMS";
/// URL de base de l'API Adresse
pub const ENV_BAN_BASE_URL: &str = "BAN_BASE_URL";
/// URL de base de geo.api.gouv.fr
pub const ENV_GEO_API_BASE_URL: &str = "GEO_API_BASE_URL";

/// Configuration principale
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Racine des données (`raw/`, `processed/`, `reports/`)
    pub data_dir: PathBuf,

    /// Nombre maximal d'adresses géocodées
    pub max_items: usize,

    /// Intervalle des logs de progression
    pub batch_size: usize,

    /// Seuils de qualité
    pub thresholds: QualityThresholds,

    /// URL de l'API Adresse (défaut : BAN publique)
    pub ban_base_url: Option<String>,

    /// URL de geo.api.gouv.fr (défaut : API publique)
    pub geo_api_base_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_items: 200,
            batch_size: 20,
            thresholds: QualityThresholds::default(),
            ban_base_url: None,
            geo_api_base_url: None,
        }
    }
}

impl PipelineConfig {
    /// Charge la configuration : fichier JSON optionnel puis environnement
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Charge une configuration depuis un fichier
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Applique les surcharges d'environnement fournies par `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(max) = lookup(ENV_MAX_ITEMS).filter(|v| !v.trim().is_empty()) {
            self.max_items = max
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_MAX_ITEMS, max))?;
        }
        if let Some(url) = lookup(ENV_BAN_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.ban_base_url = Some(url);
        }
        if let Some(url) = lookup(ENV_GEO_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.geo_api_base_url = Some(url);
        }
        Ok(())
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }

    /// Crée les sous-dossiers de données
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.raw_dir(), self.processed_dir(), self.reports_dir()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    /// Configuration de l'API Adresse
    pub fn adresse_api(&self) -> ApiConfig {
        let config = ApiConfig::adresse();
        match &self.ban_base_url {
            Some(url) => config.with_base_url(url.as_str()),
            None => config,
        }
    }

    /// Configuration de geo.api.gouv.fr
    pub fn commune_api(&self) -> ApiConfig {
        let config = ApiConfig::commune();
        match &self.geo_api_base_url {
            Some(url) => config.with_base_url(url.as_str()),
            None => config,
        }
    }
}
