//! Types d'erreurs pour le crate geoapi

use thiserror::Error;

/// Erreurs pouvant survenir lors d'un appel à une API
#[derive(Debug, Error)]
pub enum FetchError {
    /// Erreur réseau (connexion refusée, timeout, TLS...)
    #[error("Transport error on {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Réponse HTTP en erreur (hors 404, traité comme "absent")
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Corps de réponse illisible ou inattendu
    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    /// Configuration d'API invalide (header, URL...)
    #[error("Invalid API configuration: {0}")]
    Config(String),
}

impl FetchError {
    /// Crée une erreur de réponse mal formée avec contexte
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de transport à partir d'une erreur reqwest
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Indique si une nouvelle tentative a un sens
    ///
    /// Les erreurs réseau et les statuts HTTP en erreur sont transitoires ;
    /// un corps mal formé ou une configuration invalide ne le sont pas.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let status = FetchError::Status {
            url: "http://x/search/".into(),
            status: 503,
        };
        assert!(status.is_retryable());
        assert!(!FetchError::malformed("http://x", "not json").is_retryable());
        assert!(!FetchError::Config("bad header".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = FetchError::Status {
            url: "http://x/search/".into(),
            status: 500,
        };
        assert_eq!(err.to_string(), "HTTP 500 from http://x/search/");
    }
}
