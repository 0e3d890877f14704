//! # geo-pipeline
//!
//! Pipeline de données géographiques sur l'open data français.
//!
//! ## Features
//!
//! - Géocodage d'une liste d'adresses (API Adresse) avec enrichissement
//!   optionnel par commune (geo.api.gouv.fr)
//! - Snapshots GeoJSON horodatés (`raw/`, `processed/`)
//! - Nettoyage chaînable avec journal des transformations
//! - Analyse de qualité notée de A à F et rapport Markdown
//!
//! ## Usage CLI
//!
//! ```bash
//! # Géocodage brut
//! geo-pipeline geocode --input adresses.txt --limit 50 --enrich
//!
//! # Nettoyage puis rapport de qualité
//! geo-pipeline clean --numeric-strategy median
//! geo-pipeline quality --name geo_quality_report
//!
//! # Tout le pipeline
//! geo-pipeline run --input adresses.txt
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod quality;
pub mod transform;

pub use config::PipelineConfig;
pub use dataset::{ColumnData, Dataset, DatasetSummary, Filter, Value};
pub use error::DatasetError;
pub use quality::{determine_grade, Grade, QualityAnalyzer, QualityMetrics, QualityReport, QualityThresholds};
pub use transform::{DataTransformer, NumericStrategy, TransformLog, Transformation};
