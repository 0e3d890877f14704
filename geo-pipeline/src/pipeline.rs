//! Étapes du pipeline : lecture des adresses, géocodage, enrichissement,
//! nettoyage

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use futures::StreamExt;
use geoapi::{CommuneInfo, EnrichedAddress, FetchError, Fetcher, GeocodingResult};
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::transform::{DataTransformer, NumericStrategy, TransformLog};
use crate::DatasetError;

/// Colonnes texte normalisées par le nettoyage standard
pub const NORMALIZED_COLUMNS: &[&str] = &["city", "commune"];

/// Lit un fichier d'adresses, une par ligne
///
/// Les lignes vides et celles commençant par `#` sont ignorées.
pub fn read_addresses(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read addresses file: {}", path.display()))?;

    let addresses: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    debug!(path = %path.display(), count = addresses.len(), "Addresses read");
    Ok(addresses)
}

/// Géocode les adresses une par une via le flux du fetcher
///
/// S'arrête à la première erreur. `progress_every` règle la fréquence des
/// logs de progression.
pub async fn geocode<F>(
    fetcher: &mut F,
    addresses: Vec<String>,
    progress_every: usize,
) -> Result<Vec<GeocodingResult>, FetchError>
where
    F: Fetcher<Query = String, Output = GeocodingResult>,
{
    let total = addresses.len();
    let progress_every = progress_every.max(1);
    let mut results = Vec::with_capacity(total);

    {
        let mut stream = fetcher.fetch_all(addresses);
        while let Some(result) = stream.next().await {
            results.push(result?);
            if results.len() % progress_every == 0 {
                info!("Geocoded {}/{}", results.len(), total);
            }
        }
    }

    let stats = fetcher.stats();
    info!(
        results = results.len(),
        valid = results.iter().filter(|r| r.is_valid()).count(),
        requests = stats.requests_made,
        failed = stats.requests_failed,
        "Geocoding done"
    );
    Ok(results)
}

/// Joint les résultats valides avec leur commune
///
/// Chaque code INSEE distinct est demandé une seule fois, avec pacing avant
/// chaque appel réseau. Les résultats invalides ou sans commune sont écartés.
pub async fn enrich<F>(
    fetcher: &mut F,
    results: &[GeocodingResult],
) -> Result<Vec<EnrichedAddress>, FetchError>
where
    F: Fetcher<Query = String, Output = CommuneInfo>,
{
    let mut communes: HashMap<String, Option<CommuneInfo>> = HashMap::new();
    let mut enriched = Vec::new();

    for result in results.iter().filter(|r| r.is_valid()) {
        let Some(citycode) = result.citycode.as_ref() else {
            continue;
        };

        if !communes.contains_key(citycode) {
            fetcher.engine().pace().await;
            let commune = fetcher.fetch_one(citycode).await?;
            if commune.is_none() {
                debug!(citycode = %citycode, "Unknown commune");
            }
            communes.insert(citycode.clone(), commune);
        }

        if let Some(Some(commune)) = communes.get(citycode) {
            enriched.extend(EnrichedAddress::merge(result, commune));
        }
    }

    info!(
        rows = enriched.len(),
        communes = communes.len(),
        "Enrichment done"
    );
    Ok(enriched)
}

/// Nettoyage standard : doublons, valeurs manquantes, normalisation des
/// noms de communes, colonnes dérivées
///
/// `geocoding_score_min` fixe le seuil de `is_geocoded`, le même que celui
/// de l'analyse de qualité.
pub fn clean(
    dataset: Dataset,
    numeric: NumericStrategy,
    placeholder: &str,
    geocoding_score_min: f64,
) -> Result<(Dataset, TransformLog), DatasetError> {
    let normalized: Vec<&str> = NORMALIZED_COLUMNS
        .iter()
        .copied()
        .filter(|c| dataset.has_column(c))
        .collect();

    let transformer = DataTransformer::new(dataset)
        .with_geocoding_score_min(geocoding_score_min)
        .remove_duplicates(None)?
        .handle_missing_values(numeric, placeholder)
        .normalize_text_columns(Some(normalized.as_slice()))
        .add_derived_columns();

    Ok(transformer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnData, Value};
    use async_trait::async_trait;
    use geoapi::{ApiConfig, RequestEngine};
    use std::time::Duration;

    /// Fetcher sans réseau : répond depuis une table
    struct TableFetcher {
        engine: RequestEngine,
        communes: HashMap<String, CommuneInfo>,
        calls: Vec<String>,
    }

    impl TableFetcher {
        fn new(communes: &[CommuneInfo]) -> Self {
            let config = ApiConfig::new("table", "http://127.0.0.1:9").with_rate_limit(Duration::ZERO);
            Self {
                engine: RequestEngine::new(config).unwrap(),
                communes: communes
                    .iter()
                    .map(|c| (c.citycode.clone(), c.clone()))
                    .collect(),
                calls: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Fetcher for TableFetcher {
        type Query = String;
        type Output = CommuneInfo;

        fn engine(&self) -> &RequestEngine {
            &self.engine
        }

        fn engine_mut(&mut self) -> &mut RequestEngine {
            &mut self.engine
        }

        async fn fetch_one(&mut self, citycode: &String) -> Result<Option<CommuneInfo>, FetchError> {
            self.calls.push(citycode.clone());
            Ok(self.communes.get(citycode).cloned())
        }
    }

    fn geocoded(query: &str, citycode: &str, score: f64) -> GeocodingResult {
        GeocodingResult {
            label: Some(query.to_uppercase()),
            latitude: Some(45.19),
            longitude: Some(5.72),
            score,
            city: Some("Grenoble".to_string()),
            postcode: Some("38000".to_string()),
            citycode: Some(citycode.to_string()),
            ..GeocodingResult::degenerate(query)
        }
    }

    fn grenoble() -> CommuneInfo {
        CommuneInfo {
            citycode: "38185".to_string(),
            nom: "Grenoble".to_string(),
            population: 156_389,
            code_departement: "38".to_string(),
            code_region: "84".to_string(),
        }
    }

    #[test]
    fn test_read_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addresses.txt");
        std::fs::write(&path, "# header\n8 bd du port grenoble\n\n  1 place verdun  \n").unwrap();

        let addresses = read_addresses(&path).unwrap();
        assert_eq!(addresses, vec!["8 bd du port grenoble", "1 place verdun"]);

        assert!(read_addresses(&dir.path().join("missing.txt")).is_err());
    }

    #[tokio::test]
    async fn test_enrich_caches_communes() {
        let mut fetcher = TableFetcher::new(&[grenoble()]);
        let results = vec![
            geocoded("a", "38185", 0.9),
            geocoded("b", "38185", 0.8),
            geocoded("c", "99999", 0.9),
            geocoded("d", "99999", 0.7),
            geocoded("e", "38185", 0.2),
            GeocodingResult::degenerate("f"),
        ];

        let enriched = enrich(&mut fetcher, &results).await.unwrap();

        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].commune, "Grenoble");
        assert_eq!(enriched[1].address, "b");
        assert_eq!(fetcher.calls, vec!["38185", "99999"]);
    }

    #[test]
    fn test_clean_chain() {
        let dataset = Dataset::new()
            .with_column(
                "address",
                ColumnData::Text(vec![Some("a".into()), Some("a".into()), Some("b".into())]),
            )
            .unwrap()
            .with_column(
                "city",
                ColumnData::Text(vec![Some(" GRENOBLE".into()), Some("x".into()), None]),
            )
            .unwrap()
            .with_column("score", ColumnData::Number(vec![Some(0.9), Some(0.1), None]))
            .unwrap();

        let (cleaned, log) = clean(dataset, NumericStrategy::Median, "unknown", 0.5).unwrap();

        assert_eq!(cleaned.n_rows(), 2);
        assert_eq!(cleaned.value(0, "city"), Some(Value::Text("grenoble".into())));
        assert_eq!(cleaned.value(1, "city"), Some(Value::Text("unknown".into())));
        assert_eq!(cleaned.value(1, "score"), Some(Value::Number(0.9)));
        assert_eq!(cleaned.value(1, "is_geocoded"), Some(Value::Bool(true)));
        assert_eq!(
            log.summary(),
            "• Doublons supprimés: 1\n\
             • city: 1 nulls → 'unknown'\n\
             • score: 1 nulls → 0.90\n\
             • Normalisation texte: [city]\n\
             • Ajout: is_geocoded"
        );
    }

    #[test]
    fn test_clean_flag_agrees_with_quality_threshold() {
        let dataset = Dataset::new()
            .with_column(
                "address",
                ColumnData::Text(vec![Some("a".into()), Some("b".into()), Some("c".into())]),
            )
            .unwrap()
            .with_column("score", ColumnData::Number(vec![Some(0.95), Some(0.8), Some(0.6)]))
            .unwrap();
        let thresholds = crate::QualityThresholds {
            geocoding_score_min: 0.75,
            ..Default::default()
        };

        let (cleaned, _) = clean(
            dataset,
            NumericStrategy::Median,
            "unknown",
            thresholds.geocoding_score_min,
        )
        .unwrap();

        let flagged = (0..cleaned.n_rows())
            .filter(|&row| cleaned.value(row, "is_geocoded") == Some(Value::Bool(true)))
            .count();
        assert_eq!(flagged, 2);

        let stats = crate::QualityAnalyzer::with_thresholds(cleaned, thresholds).geocoding_stats();
        assert!((stats.success_rate - flagged as f64 / 3.0 * 100.0).abs() < 1e-9);
    }
}
