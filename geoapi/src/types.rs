//! Types de données pour le crate geoapi

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Score BAN minimal pour qu'un géocodage soit exploitable
pub const GEOCODING_SCORE_MIN: f64 = 0.5;

/// Résultat du géocodage d'une adresse via l'API Adresse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingResult {
    /// Adresse d'entrée
    pub query: String,
    /// Adresse normalisée
    pub label: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Score de confiance BAN (0 à 1)
    pub score: f64,
    pub city: Option<String>,
    pub postcode: Option<String>,
    /// Code INSEE de la commune
    pub citycode: Option<String>,
    pub fetched_at: DateTime<Local>,
}

impl GeocodingResult {
    /// Résultat dégénéré : score 0, aucune coordonnée
    pub fn degenerate(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            label: None,
            latitude: None,
            longitude: None,
            score: 0.0,
            city: None,
            postcode: None,
            citycode: None,
            fetched_at: Local::now(),
        }
    }

    /// Vérifie si le résultat est exploitable pour l'analyse
    pub fn is_valid(&self) -> bool {
        self.score >= GEOCODING_SCORE_MIN
            && self.latitude.is_some()
            && self.longitude.is_some()
            && self.citycode.is_some()
    }
}

/// Informations administratives d'une commune
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommuneInfo {
    pub citycode: String,
    pub nom: String,
    pub population: u64,
    pub code_departement: String,
    pub code_region: String,
}

/// Adresse géocodée et enrichie avec sa commune
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedAddress {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub score: f64,
    pub city: String,
    pub postcode: String,
    pub citycode: String,
    /// Nom officiel de la commune
    pub commune: String,
    pub population: u64,
    pub fetched_at: DateTime<Local>,
}

impl EnrichedAddress {
    /// Fusionne un géocodage et une commune
    ///
    /// Retourne `None` si un champ du géocodage manque ou si les codes INSEE
    /// ne correspondent pas.
    pub fn merge(geo: &GeocodingResult, commune: &CommuneInfo) -> Option<Self> {
        let citycode = geo.citycode.as_deref()?;
        if citycode != commune.citycode {
            return None;
        }

        Some(Self {
            address: geo.query.clone(),
            latitude: geo.latitude?,
            longitude: geo.longitude?,
            score: geo.score,
            city: geo.city.clone()?,
            postcode: geo.postcode.clone()?,
            citycode: citycode.to_string(),
            commune: commune.nom.clone(),
            population: commune.population,
            fetched_at: geo.fetched_at,
        })
    }
}

/// Compteurs d'utilisation d'un fetcher
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchStats {
    /// Tentatives HTTP effectuées (retries inclus)
    pub requests_made: u64,
    /// Appels logiques en échec définitif
    pub requests_failed: u64,
    /// Éléments effectivement récupérés
    pub items_fetched: u64,
    pub start_time: Option<DateTime<Local>>,
    pub end_time: Option<DateTime<Local>>,
}

impl FetchStats {
    /// Durée entre le début et la fin du dernier fetch groupé
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geocoded(score: f64) -> GeocodingResult {
        GeocodingResult {
            query: "8 bd du port 38000 grenoble".into(),
            label: Some("8 Boulevard du Port 38000 Grenoble".into()),
            latitude: Some(45.18),
            longitude: Some(5.72),
            score,
            city: Some("Grenoble".into()),
            postcode: Some("38000".into()),
            citycode: Some("38185".into()),
            fetched_at: Local::now(),
        }
    }

    fn grenoble() -> CommuneInfo {
        CommuneInfo {
            citycode: "38185".into(),
            nom: "Grenoble".into(),
            population: 156_389,
            code_departement: "38".into(),
            code_region: "84".into(),
        }
    }

    #[test]
    fn test_is_valid_threshold() {
        assert!(geocoded(0.6).is_valid());
        assert!(geocoded(0.5).is_valid());
        assert!(!geocoded(0.3).is_valid());
    }

    #[test]
    fn test_is_valid_requires_coordinates_and_citycode() {
        let mut result = geocoded(0.9);
        result.latitude = None;
        assert!(!result.is_valid());

        let mut result = geocoded(0.9);
        result.citycode = None;
        assert!(!result.is_valid());
    }

    #[test]
    fn test_degenerate() {
        let result = GeocodingResult::degenerate("");
        assert_eq!(result.score, 0.0);
        assert!(result.latitude.is_none());
        assert!(!result.is_valid());
    }

    #[test]
    fn test_merge() {
        let enriched = EnrichedAddress::merge(&geocoded(0.9), &grenoble()).unwrap();
        assert_eq!(enriched.commune, "Grenoble");
        assert_eq!(enriched.population, 156_389);
        assert_eq!(enriched.address, "8 bd du port 38000 grenoble");
    }

    #[test]
    fn test_merge_rejects_mismatch_or_missing_fields() {
        let mut other = grenoble();
        other.citycode = "75056".into();
        assert!(EnrichedAddress::merge(&geocoded(0.9), &other).is_none());

        let mut partial = geocoded(0.9);
        partial.postcode = None;
        assert!(EnrichedAddress::merge(&partial, &grenoble()).is_none());
    }

    #[test]
    fn test_stats_duration() {
        let mut stats = FetchStats::default();
        assert!(stats.duration().is_none());
        let now = Local::now();
        stats.start_time = Some(now);
        stats.end_time = Some(now + chrono::Duration::seconds(3));
        assert_eq!(stats.duration(), Some(chrono::Duration::seconds(3)));
    }
}
