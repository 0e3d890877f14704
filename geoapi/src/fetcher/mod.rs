//! Contrat commun des fetchers d'API REST
//!
//! Un fetcher concret possède un [`RequestEngine`] et implémente
//! [`Fetcher::fetch_one`]. Le pacing, les lots et le flux paresseux sont
//! fournis par le trait.

pub mod engine;

pub use engine::RequestEngine;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::types::FetchStats;
use crate::FetchError;

#[async_trait]
pub trait Fetcher: Send {
    /// Requête unitaire (adresse, code INSEE...)
    type Query: Send + Sync;
    /// Enregistre typé produit par l'API
    type Output: Send;

    fn engine(&self) -> &RequestEngine;

    fn engine_mut(&mut self) -> &mut RequestEngine;

    /// Récupère une ressource unique, sans pacing
    ///
    /// `Ok(None)` signifie "aucune donnée" et n'est pas une erreur.
    async fn fetch_one(&mut self, query: &Self::Query) -> Result<Option<Self::Output>, FetchError>;

    /// Récupère un lot, en respectant le rate limit avant chaque élément
    ///
    /// La première erreur interrompt le lot.
    async fn fetch_batch(
        &mut self,
        queries: &[Self::Query],
    ) -> Result<Vec<Self::Output>, FetchError> {
        self.engine_mut().mark_started();
        let mut results = Vec::with_capacity(queries.len());

        for query in queries {
            self.engine().pace().await;
            if let Some(output) = self.fetch_one(query).await? {
                results.push(output);
            }
        }

        self.engine_mut().mark_finished();
        Ok(results)
    }

    /// Flux paresseux : un élément par requête ayant produit un résultat
    ///
    /// Le flux se termine après la première erreur. Il n'est pas
    /// redémarrable : un nouvel appel recommence depuis le début.
    fn fetch_all<'a>(
        &'a mut self,
        queries: Vec<Self::Query>,
    ) -> BoxStream<'a, Result<Self::Output, FetchError>>
    where
        Self::Query: 'a,
    {
        let state = (self, queries.into_iter(), false);

        stream::unfold(state, |(fetcher, mut queries, mut started)| async move {
            if !started {
                fetcher.engine_mut().mark_started();
                started = true;
            }

            loop {
                let Some(query) = queries.next() else {
                    fetcher.engine_mut().mark_finished();
                    return None;
                };

                fetcher.engine().pace().await;
                match fetcher.fetch_one(&query).await {
                    Ok(Some(output)) => return Some((Ok(output), (fetcher, queries, started))),
                    Ok(None) => continue,
                    Err(err) => {
                        // Abandon : les requêtes restantes sont ignorées
                        let drained = Vec::new().into_iter();
                        return Some((Err(err), (fetcher, drained, started)));
                    }
                }
            }
        })
        .boxed()
    }

    /// Copie des statistiques du fetcher
    fn stats(&self) -> FetchStats {
        self.engine().stats()
    }
}
