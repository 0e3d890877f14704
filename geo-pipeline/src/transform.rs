//! Nettoyage d'un dataset en pipeline d'étapes nommées
//!
//! Chaque étape consomme le transformer et en retourne un nouveau, avec une
//! entrée de journal en plus. Le journal permet de rejouer ou d'afficher la
//! séquence appliquée.

use std::fmt;

use geoapi::GEOCODING_SCORE_MIN;
use serde::Serialize;
use tracing::{debug, info};

use crate::dataset::{ColumnData, Dataset};
use crate::DatasetError;

/// Valeur de remplacement par défaut des textes manquants
pub const DEFAULT_PLACEHOLDER: &str = "unknown";

/// Stratégie de remplissage des colonnes numériques
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericStrategy {
    /// Médiane des valeurs non nulles (défaut)
    #[default]
    Median,
    /// Moyenne des valeurs non nulles
    Mean,
    /// Zéro
    Zero,
    /// Pas de remplissage
    None,
}

impl std::str::FromStr for NumericStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "median" => Ok(NumericStrategy::Median),
            "mean" => Ok(NumericStrategy::Mean),
            "zero" => Ok(NumericStrategy::Zero),
            "none" => Ok(NumericStrategy::None),
            _ => Err(format!(
                "Invalid numeric strategy: {}. Use: median, mean, zero, none",
                s
            )),
        }
    }
}

impl NumericStrategy {
    /// Valeur de remplissage calculée sur les valeurs non nulles
    fn fill_value(self, values: &[Option<f64>]) -> Option<f64> {
        match self {
            NumericStrategy::Median => median(values),
            NumericStrategy::Mean => mean(values),
            NumericStrategy::Zero => Some(0.0),
            NumericStrategy::None => None,
        }
    }
}

/// Étape appliquée au dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Transformation {
    DuplicatesRemoved { removed: usize },
    NumericFilled { column: String, nulls: usize, value: f64 },
    TextFilled { column: String, nulls: usize, placeholder: String },
    TextNormalized { columns: Vec<String> },
    DerivedColumn { column: String },
    Custom { name: String },
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transformation::DuplicatesRemoved { removed } => {
                write!(f, "Doublons supprimés: {}", removed)
            }
            Transformation::NumericFilled { column, nulls, value } => {
                write!(f, "{}: {} nulls → {:.2}", column, nulls, value)
            }
            Transformation::TextFilled {
                column,
                nulls,
                placeholder,
            } => write!(f, "{}: {} nulls → '{}'", column, nulls, placeholder),
            Transformation::TextNormalized { columns } => {
                write!(f, "Normalisation texte: [{}]", columns.join(", "))
            }
            Transformation::DerivedColumn { column } => write!(f, "Ajout: {}", column),
            Transformation::Custom { name } => write!(f, "Custom: {}", name),
        }
    }
}

/// Journal ordonné des transformations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransformLog {
    entries: Vec<Transformation>,
}

impl TransformLog {
    pub fn entries(&self) -> &[Transformation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Une ligne `• entrée` par transformation
    pub fn summary(&self) -> String {
        self.entries
            .iter()
            .map(|t| format!("• {}", t))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push(&mut self, entry: Transformation) {
        debug!(step = %entry, "Transformation applied");
        self.entries.push(entry);
    }
}

impl fmt::Display for TransformLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Pipeline de nettoyage chaînable
#[derive(Debug, Clone)]
pub struct DataTransformer {
    dataset: Dataset,
    log: TransformLog,
    geocoding_score_min: f64,
}

impl DataTransformer {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            log: TransformLog::default(),
            geocoding_score_min: GEOCODING_SCORE_MIN,
        }
    }

    /// Seuil de score utilisé pour `is_geocoded` (défaut 0.5)
    pub fn with_geocoding_score_min(mut self, min: f64) -> Self {
        self.geocoding_score_min = min;
        self
    }

    /// Supprime les lignes dont la clé répète une ligne précédente
    ///
    /// Clé par défaut : `address`, sinon la première colonne.
    pub fn remove_duplicates(mut self, subset: Option<&[&str]>) -> Result<Self, DatasetError> {
        let subset: Vec<String> = match subset {
            Some(columns) => columns.iter().map(|c| c.to_string()).collect(),
            None => self
                .dataset
                .default_key_column()
                .map(|c| vec![c.to_string()])
                .unwrap_or_default(),
        };

        let initial = self.dataset.n_rows();
        if !subset.is_empty() {
            let mask = self.dataset.duplicate_mask(&subset)?;
            let keep: Vec<usize> = (0..initial).filter(|&row| !mask[row]).collect();
            self.dataset = self.dataset.take_rows(&keep);
        }

        let removed = initial - self.dataset.n_rows();
        info!(key = ?subset, removed, "Duplicates removed");
        self.log.push(Transformation::DuplicatesRemoved { removed });
        Ok(self)
    }

    /// Remplit les valeurs manquantes
    ///
    /// Colonnes numériques selon `numeric`, colonnes texte avec
    /// `placeholder`. Les colonnes booléennes ne sont pas modifiées.
    pub fn handle_missing_values(mut self, numeric: NumericStrategy, placeholder: &str) -> Self {
        let mut replaced = Vec::new();

        for column in self.dataset.columns() {
            let nulls = column.data().null_count();
            if nulls == 0 {
                continue;
            }

            match column.data() {
                ColumnData::Number(values) => {
                    let Some(fill) = numeric.fill_value(values) else {
                        continue;
                    };
                    let filled = values.iter().map(|v| Some(v.unwrap_or(fill))).collect();
                    replaced.push((
                        column.name().to_string(),
                        ColumnData::Number(filled),
                        Transformation::NumericFilled {
                            column: column.name().to_string(),
                            nulls,
                            value: fill,
                        },
                    ));
                }
                ColumnData::Text(values) => {
                    let filled = values
                        .iter()
                        .map(|v| Some(v.clone().unwrap_or_else(|| placeholder.to_string())))
                        .collect();
                    replaced.push((
                        column.name().to_string(),
                        ColumnData::Text(filled),
                        Transformation::TextFilled {
                            column: column.name().to_string(),
                            nulls,
                            placeholder: placeholder.to_string(),
                        },
                    ));
                }
                ColumnData::Boolean(_) => {}
            }
        }

        for (name, data, entry) in replaced {
            self.dataset.replace_column(name, data);
            self.log.push(entry);
        }
        self
    }

    /// Trim + minuscules sur les colonnes texte (toutes, ou celles listées)
    pub fn normalize_text_columns(mut self, columns: Option<&[&str]>) -> Self {
        let targets: Vec<String> = match columns {
            Some(names) => names.iter().map(|c| c.to_string()).collect(),
            None => self
                .dataset
                .columns()
                .iter()
                .filter(|c| c.data().as_text().is_some())
                .map(|c| c.name().to_string())
                .collect(),
        };

        for name in &targets {
            let Some(values) = self.dataset.column(name).and_then(ColumnData::as_text) else {
                debug!(column = %name, "Not a text column, skipped");
                continue;
            };
            let normalized = values
                .iter()
                .map(|v| v.as_deref().map(|s| s.trim().to_lowercase()))
                .collect();
            self.dataset.replace_column(name.as_str(), ColumnData::Text(normalized));
        }

        self.log.push(Transformation::TextNormalized { columns: targets });
        self
    }

    /// Ajoute `is_geocoded` (score ≥ seuil) et `has_population` (population > 0)
    pub fn add_derived_columns(mut self) -> Self {
        let min = self.geocoding_score_min;
        if let Some(scores) = self.dataset.column("score").and_then(ColumnData::as_numbers) {
            let flags = scores
                .iter()
                .map(|s| Some(s.map_or(false, |s| s >= min)))
                .collect();
            self.dataset.replace_column("is_geocoded", ColumnData::Boolean(flags));
            self.log.push(Transformation::DerivedColumn {
                column: "is_geocoded".to_string(),
            });
        }

        if let Some(population) = self
            .dataset
            .column("population")
            .and_then(ColumnData::as_numbers)
        {
            let flags = population
                .iter()
                .map(|p| Some(p.map_or(false, |p| p > 0.0)))
                .collect();
            self.dataset.replace_column("has_population", ColumnData::Boolean(flags));
            self.log.push(Transformation::DerivedColumn {
                column: "has_population".to_string(),
            });
        }

        self
    }

    /// Applique une transformation arbitraire, journalisée sous `name`
    pub fn apply_custom<F>(mut self, name: &str, transform: F) -> Self
    where
        F: FnOnce(Dataset) -> Dataset,
    {
        self.dataset = transform(self.dataset);
        self.log.push(Transformation::Custom {
            name: name.to_string(),
        });
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn log(&self) -> &TransformLog {
        &self.log
    }

    /// Résumé des transformations appliquées
    pub fn summary(&self) -> String {
        self.log.summary()
    }

    /// Dataset nettoyé et journal
    pub fn finish(self) -> (Dataset, TransformLog) {
        (self.dataset, self.log)
    }
}

fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));

    let mid = present.len() / 2;
    Some(if present.len() % 2 == 0 {
        (present[mid - 1] + present[mid]) / 2.0
    } else {
        present[mid]
    })
}

fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}
