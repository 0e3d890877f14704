//! # geoapi
//!
//! Clients pour les APIs geo de l'open data français.
//!
//! ## Features
//!
//! - Géocodage via l'API Adresse (Base Adresse Nationale)
//! - Référentiel des communes via geo.api.gouv.fr
//! - Retry borné avec backoff exponentiel (3 tentatives, 2 s → 20 s)
//! - Rate limiting à intervalle fixe entre deux opérations de fetch
//! - Statistiques par fetcher (requêtes, échecs, éléments récupérés)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use geoapi::{AdresseFetcher, Fetcher};
//!
//! let mut fetcher = AdresseFetcher::new()?;
//! let addresses = vec!["8 bd du port 38000 grenoble".to_string()];
//!
//! let mut results = fetcher.fetch_all(addresses);
//! while let Some(result) = results.next().await {
//!     let result = result?;
//!     println!("{} -> {:?} ({})", result.query, result.label, result.score);
//! }
//! ```

pub mod adresse;
pub mod commune;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod types;

pub use adresse::AdresseFetcher;
pub use commune::CommuneFetcher;
pub use config::{ApiConfig, RetryPolicy};
pub use error::FetchError;
pub use fetcher::{Fetcher, RequestEngine};
pub use types::{CommuneInfo, EnrichedAddress, FetchStats, GeocodingResult, GEOCODING_SCORE_MIN};
