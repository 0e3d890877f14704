//! Rapport de qualité
//!
//! Rendu Markdown horodaté des métriques, avec contrôle des seuils et
//! valeurs nulles par colonne. Aussi affichable sur la console et
//! exportable en JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use super::{QualityMetrics, QualityThresholds};

/// Nombre maximal de colonnes listées sur la console
const CONSOLE_NULL_COLUMNS: usize = 20;

/// Résultat d'un contrôle de seuil
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdCheck {
    pub label: String,
    pub value: String,
    pub expected: String,
    pub passed: bool,
}

/// Rapport complet d'une analyse
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub generated_at: DateTime<Local>,
    pub metrics: QualityMetrics,
    pub thresholds: QualityThresholds,
}

impl QualityReport {
    pub fn new(metrics: QualityMetrics, thresholds: QualityThresholds) -> Self {
        Self {
            generated_at: Local::now(),
            metrics,
            thresholds,
        }
    }

    /// Contrôles des métriques contre les seuils configurés
    pub fn checks(&self) -> Vec<ThresholdCheck> {
        let m = &self.metrics;
        let t = &self.thresholds;
        vec![
            ThresholdCheck {
                label: "Complétude".to_string(),
                value: format!("{:.1}%", m.completeness_score * 100.0),
                expected: format!("≥ {:.1}%", t.completeness_min * 100.0),
                passed: m.completeness_score >= t.completeness_min,
            },
            ThresholdCheck {
                label: "Doublons".to_string(),
                value: format!("{:.1}%", m.duplicates_pct),
                expected: format!("≤ {:.1}%", t.duplicates_max_pct),
                passed: m.duplicates_pct <= t.duplicates_max_pct,
            },
            ThresholdCheck {
                label: "Score géocodage moyen".to_string(),
                value: format!("{:.3}", m.avg_geocoding_score),
                expected: format!("≥ {:.2}", t.geocoding_score_min),
                passed: m.avg_geocoding_score >= t.geocoding_score_min,
            },
        ]
    }

    /// Rendu Markdown
    pub fn to_markdown(&self) -> String {
        let m = &self.metrics;

        let mut out = format!(
            "# Rapport de Qualité des Données GEO\n\n**Date** : {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        );

        out.push_str("## Résumé\n");
        out.push_str(&format!("- Total lignes : {}\n", m.total_records));
        out.push_str(&format!("- Lignes valides : {}\n", m.valid_records));
        out.push_str(&format!("- Complétude : {:.1}%\n", m.completeness_score * 100.0));
        out.push_str(&format!(
            "- Doublons : {:.1}% ({})\n",
            m.duplicates_pct, m.duplicates_count
        ));
        out.push_str(&format!("- Succès géocodage : {:.1}%\n", m.geocoding_success_rate));
        out.push_str(&format!("- Score moyen : {:.3}\n", m.avg_geocoding_score));
        out.push_str(&format!("- Note globale : **{}**\n\n", m.quality_grade));

        out.push_str("## Seuils\n");
        for check in self.checks() {
            out.push_str(&format!(
                "- {} {} : {} (attendu {})\n",
                if check.passed { "✅" } else { "❌" },
                check.label,
                check.value,
                check.expected
            ));
        }

        out.push_str("\n## Valeurs nulles\n");
        for (column, count) in &m.null_counts {
            out.push_str(&format!("- {}: {}\n", column, count));
        }

        out
    }

    /// Écrit `<dir>/<name>_<YYYYmmdd_HHMMSS>.md`
    pub fn write_markdown(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create reports dir: {}", dir.display()))?;

        let path = dir.join(format!(
            "{}_{}.md",
            name,
            self.generated_at.format("%Y%m%d_%H%M%S")
        ));
        std::fs::write(&path, self.to_markdown())
            .with_context(|| format!("Failed to write report: {}", path.display()))?;

        info!(path = %path.display(), grade = %self.metrics.quality_grade, "Quality report written");
        Ok(path)
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        let m = &self.metrics;

        println!("\n{}", "=".repeat(60));
        println!("QUALITY REPORT - Grade {}", m.quality_grade);
        println!("{}", "=".repeat(60));

        println!("\n--- SUMMARY ---");
        println!(
            "Records: {} total, {} valid, {} duplicates ({:.2}%)",
            m.total_records, m.valid_records, m.duplicates_count, m.duplicates_pct
        );
        println!("Completeness: {:.1}%", m.completeness_score * 100.0);
        println!(
            "Geocoding: {:.2}% success, avg score {:.3}",
            m.geocoding_success_rate, m.avg_geocoding_score
        );
        println!(
            "Acceptable: {}",
            if m.is_acceptable() { "yes" } else { "no" }
        );

        println!("\n--- THRESHOLDS ---");
        for check in self.checks() {
            println!(
                "  [{}] {}: {} (expected {})",
                if check.passed { "OK" } else { "KO" },
                check.label,
                check.value,
                check.expected
            );
        }

        let with_nulls: Vec<_> = m.null_counts.iter().filter(|(_, n)| *n > 0).collect();
        if !with_nulls.is_empty() {
            println!("\n--- NULLS ({} columns) ---", with_nulls.len());
            for (column, count) in with_nulls.iter().take(CONSOLE_NULL_COLUMNS) {
                println!("  {}: {}", column, count);
            }
            if with_nulls.len() > CONSOLE_NULL_COLUMNS {
                println!("  ... and {} more", with_nulls.len() - CONSOLE_NULL_COLUMNS);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        let m = &self.metrics;
        format!(
            "Grade {}: {} records, completeness {:.1}%, duplicates {:.1}%, geocoded {:.1}%",
            m.quality_grade,
            m.total_records,
            m.completeness_score * 100.0,
            m.duplicates_pct,
            m.geocoding_success_rate
        )
    }
}
