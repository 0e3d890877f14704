//! Analyse de qualité d'un dataset géocodé
//!
//! Complétude, doublons, taux de géocodage et note globale A à F.

pub mod report;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{ColumnData, Dataset};
use crate::DatasetError;

pub use report::QualityReport;

/// Note globale de qualité
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Note correspondant à un score sur 100
    pub fn from_points(points: f64) -> Self {
        if points >= 90.0 {
            Grade::A
        } else if points >= 75.0 {
            Grade::B
        } else if points >= 60.0 {
            Grade::C
        } else if points >= 40.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    /// A, B et C sont exploitables
    pub fn is_acceptable(self) -> bool {
        matches!(self, Grade::A | Grade::B | Grade::C)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        write!(f, "{}", letter)
    }
}

/// Seuils de contrôle affichés dans le rapport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Complétude minimale attendue (0 à 1)
    pub completeness_min: f64,
    /// Score BAN à partir duquel une adresse est géocodée
    pub geocoding_score_min: f64,
    /// Pourcentage de doublons maximal toléré
    pub duplicates_max_pct: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            completeness_min: 0.7,
            geocoding_score_min: geoapi::GEOCODING_SCORE_MIN,
            duplicates_max_pct: 5.0,
        }
    }
}

/// Métriques d'une passe d'analyse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub total_records: usize,
    /// Lignes hors doublons
    pub valid_records: usize,
    /// Cellules non nulles / cellules totales (3 décimales)
    pub completeness_score: f64,
    pub duplicates_count: usize,
    /// Pourcentage de doublons (2 décimales)
    pub duplicates_pct: f64,
    /// Pourcentage de lignes géocodées (2 décimales)
    pub geocoding_success_rate: f64,
    /// Score moyen des lignes géocodées (3 décimales)
    pub avg_geocoding_score: f64,
    /// Valeurs nulles par colonne, dans l'ordre des colonnes
    pub null_counts: Vec<(String, usize)>,
    pub quality_grade: Grade,
}

impl QualityMetrics {
    pub fn is_acceptable(&self) -> bool {
        self.quality_grade.is_acceptable()
    }
}

/// Note à partir des métriques non arrondies
///
/// Barème sur 100 : complétude jusqu'à 40 points, doublons par paliers
/// (≤1% 30, ≤5% 20, ≤10% 10), taux de géocodage jusqu'à 30 points.
pub fn determine_grade(completeness: f64, duplicates_pct: f64, geocoding_rate: f64) -> Grade {
    let completeness_points = (completeness * 40.0).min(40.0);

    let duplicates_points = if duplicates_pct <= 1.0 {
        30.0
    } else if duplicates_pct <= 5.0 {
        20.0
    } else if duplicates_pct <= 10.0 {
        10.0
    } else {
        0.0
    };

    let geocoding_points = (geocoding_rate / 100.0 * 30.0).min(30.0);

    Grade::from_points(completeness_points + duplicates_points + geocoding_points)
}

/// Statistiques de géocodage : taux de succès (%) et score moyen des succès
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeocodingStats {
    pub success_rate: f64,
    pub avg_score: f64,
}

/// Analyseur de qualité sur un snapshot de dataset
#[derive(Debug, Clone)]
pub struct QualityAnalyzer {
    dataset: Dataset,
    thresholds: QualityThresholds,
}

impl QualityAnalyzer {
    pub fn new(dataset: Dataset) -> Self {
        Self::with_thresholds(dataset, QualityThresholds::default())
    }

    pub fn with_thresholds(dataset: Dataset, thresholds: QualityThresholds) -> Self {
        Self {
            dataset,
            thresholds,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Part des cellules non nulles (0 pour un dataset vide)
    pub fn completeness(&self) -> f64 {
        let size = self.dataset.size();
        if size == 0 {
            return 0.0;
        }
        self.dataset.non_null_count() as f64 / size as f64
    }

    /// Doublons sur `address` (ou la première colonne) : nombre et pourcentage
    pub fn count_duplicates(&self) -> Result<(usize, f64), DatasetError> {
        let Some(key) = self.dataset.default_key_column() else {
            return Ok((0, 0.0));
        };

        let count = self
            .dataset
            .duplicate_mask(&[key.to_string()])?
            .into_iter()
            .filter(|&dup| dup)
            .count();

        let rows = self.dataset.n_rows();
        let pct = if rows == 0 {
            0.0
        } else {
            count as f64 / rows as f64 * 100.0
        };
        Ok((count, pct))
    }

    /// Taux de géocodage (score ≥ seuil) et score moyen des lignes retenues
    pub fn geocoding_stats(&self) -> GeocodingStats {
        let Some(scores) = self.dataset.column("score").and_then(ColumnData::as_numbers) else {
            return GeocodingStats::default();
        };
        if scores.is_empty() {
            return GeocodingStats::default();
        }

        let min = self.thresholds.geocoding_score_min;
        let successes: Vec<f64> = scores.iter().flatten().copied().filter(|&s| s >= min).collect();

        let success_rate = successes.len() as f64 / scores.len() as f64 * 100.0;
        let avg_score = if successes.is_empty() {
            0.0
        } else {
            successes.iter().sum::<f64>() / successes.len() as f64
        };

        GeocodingStats {
            success_rate,
            avg_score,
        }
    }

    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.dataset.null_counts()
    }

    /// Calcule toutes les métriques
    pub fn analyze(&self) -> Result<QualityMetrics, DatasetError> {
        let completeness = self.completeness();
        let (duplicates_count, duplicates_pct) = self.count_duplicates()?;
        let geocoding = self.geocoding_stats();

        let quality_grade = determine_grade(completeness, duplicates_pct, geocoding.success_rate);
        let total_records = self.dataset.n_rows();

        debug!(
            completeness,
            duplicates_pct,
            geocoding_rate = geocoding.success_rate,
            "Raw quality metrics"
        );

        let metrics = QualityMetrics {
            total_records,
            valid_records: total_records - duplicates_count,
            completeness_score: round(completeness, 3),
            duplicates_count,
            duplicates_pct: round(duplicates_pct, 2),
            geocoding_success_rate: round(geocoding.success_rate, 2),
            avg_geocoding_score: round(geocoding.avg_score, 3),
            null_counts: self.null_counts(),
            quality_grade,
        };

        info!(
            rows = metrics.total_records,
            grade = %metrics.quality_grade,
            "Quality analysis done"
        );
        Ok(metrics)
    }

    /// Analyse puis construit le rapport
    pub fn report(&self) -> Result<QualityReport, DatasetError> {
        Ok(QualityReport::new(self.analyze()?, self.thresholds))
    }
}

fn round(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
