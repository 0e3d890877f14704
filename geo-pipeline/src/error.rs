//! Types d'erreurs pour les datasets et leurs snapshots

use std::path::PathBuf;

use thiserror::Error;

/// Erreurs pouvant survenir lors de la manipulation d'un dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Erreur d'I/O lors de la lecture ou de l'écriture d'un snapshot
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot GeoJSON illisible
    #[error("Invalid GeoJSON snapshot {path}: {reason}")]
    InvalidSnapshot { path: PathBuf, reason: String },

    /// Motif de recherche de fichiers invalide
    #[error("Invalid snapshot pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Colonne de longueur différente du dataset
    #[error("Column {column} has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    /// Colonne absente du dataset
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Fichier ou dossier introuvable
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Dossier sans aucun snapshot
    #[error("No snapshot (*.geojson) in {}", .0.display())]
    EmptyDirectory(PathBuf),
}

impl DatasetError {
    /// Crée une erreur de snapshot invalide avec contexte
    pub fn invalid_snapshot(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
