/// Expansion coordinator
///
/// Owns the session's constellation graph and turns discovery output into
/// graph mutations. Guarantees:
/// - the exclude set sent to discovery always reflects the node's current
///   neighborhood, so re-expansion never re-discovers existing neighbors
/// - only newly created links are returned, so callers can animate exactly
///   the new graph elements
/// - concurrent expansion requests for the same node are coalesced: the
///   second caller receives the first call's in-flight result instead of
///   issuing a second network round-trip
/// - the expansion itself runs in a detached task, so a caller that hangs
///   up mid-flight cannot strand the node's pending entry
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{DiscoveryStrategy, Track, TrackKey},
    services::{
        discovery::DiscoveryEngine,
        graph::ConstellationGraph,
        providers::MusicCatalog,
    },
};

/// A newly created node+edge pair produced by one expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLink {
    pub node_id: Uuid,
    pub track: Track,
    pub score: f64,
    pub strategy: DiscoveryStrategy,
}

/// Everything one expansion produced.
#[derive(Debug, Clone, Default)]
pub struct ExpansionOutcome {
    /// Only links whose edge was newly created; strengthened pre-existing
    /// edges are not reported.
    pub links: Vec<NewLink>,
    pub tags: Vec<String>,
    pub sources_used: Vec<DiscoveryStrategy>,
    /// Seed playcount from the catalog, `None` when the lookup failed.
    pub seed_playcount: Option<u64>,
}

pub struct ExpansionCoordinator {
    graph: Arc<RwLock<ConstellationGraph>>,
    discovery: DiscoveryEngine,
    catalog: Arc<dyn MusicCatalog>,
    pending: Arc<Mutex<HashMap<Uuid, broadcast::Sender<ExpansionOutcome>>>>,
}

impl ExpansionCoordinator {
    pub fn new(catalog: Arc<dyn MusicCatalog>) -> Self {
        Self {
            graph: Arc::new(RwLock::new(ConstellationGraph::new())),
            discovery: DiscoveryEngine::new(catalog.clone()),
            catalog,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Discards the current session graph and starts a new one around the
    /// given seed. Returns the seed's node id.
    pub async fn reset_with_seed(&self, seed: Track) -> Uuid {
        let mut graph = self.graph.write().await;
        *graph = ConstellationGraph::new();
        graph.upsert_node(seed, None)
    }

    /// Returns the node for the given track, inserting it if absent.
    pub async fn ensure_node(&self, track: Track) -> Uuid {
        self.graph.write().await.upsert_node(track, None)
    }

    /// Read access to the session graph.
    pub fn graph(&self) -> Arc<RwLock<ConstellationGraph>> {
        self.graph.clone()
    }

    /// Expands a node: discovers related tracks (excluding the node's
    /// current neighborhood plus `extra_exclude`) and merges them into the
    /// graph. Re-expanding an already-expanded node is allowed and uses a
    /// fresh exclude set (refresh semantics).
    pub async fn expand(
        &self,
        node_id: Uuid,
        extra_exclude: HashSet<TrackKey>,
    ) -> AppResult<ExpansionOutcome> {
        // Resolve before registering as pending so an unknown node can't
        // leave a dangling in-flight entry.
        let (seed, mut exclude) = {
            let graph = self.graph.read().await;
            let node = graph
                .node(node_id)
                .ok_or_else(|| AppError::NotFound(format!("No node {}", node_id)))?;
            (node.track.clone(), graph.exclude_set_for(node_id))
        };
        exclude.extend(extra_exclude);

        // Coalesce duplicate in-flight expansions. Subscribing and
        // publishing both happen under the pending-map lock, so a subscriber
        // that found an entry is guaranteed to receive its result.
        let mut rx = {
            let mut pending = self.pending.lock().await;
            if let Some(tx) = pending.get(&node_id) {
                tracing::debug!(node_id = %node_id, "Coalescing duplicate expansion request");
                tx.subscribe()
            } else {
                let (tx, rx) = broadcast::channel(1);
                pending.insert(node_id, tx.clone());

                // Run the expansion detached: even if every caller hangs up,
                // the task still clears the pending entry and publishes, so
                // the node can never be stranded behind a dead sender.
                let pending_map = self.pending.clone();
                let graph = self.graph.clone();
                let discovery = self.discovery.clone();
                let catalog = self.catalog.clone();
                tokio::spawn(async move {
                    let outcome =
                        Self::run_expansion(graph, discovery, catalog, node_id, seed, exclude)
                            .await;

                    let mut pending = pending_map.lock().await;
                    pending.remove(&node_id);
                    let _ = tx.send(outcome.clone());
                    drop(pending);

                    tracing::info!(
                        node_id = %node_id,
                        new_links = outcome.links.len(),
                        sources = ?outcome.sources_used,
                        "Expansion completed"
                    );
                });
                rx
            }
        };

        rx.recv()
            .await
            .map_err(|_| AppError::Internal("In-flight expansion was dropped".to_string()))
    }

    /// The uncoalesced expansion body. Infallible by design: discovery
    /// absorbs tier failures and the playcount lookup degrades to `None`.
    /// Runs detached from the requesting caller, so it borrows nothing.
    async fn run_expansion(
        graph: Arc<RwLock<ConstellationGraph>>,
        discovery: DiscoveryEngine,
        catalog: Arc<dyn MusicCatalog>,
        node_id: Uuid,
        seed: Track,
        exclude: HashSet<TrackKey>,
    ) -> ExpansionOutcome {
        let discovered = discovery
            .discover(&seed, &exclude, crate::services::discovery::DEFAULT_LIMIT)
            .await;

        let seed_playcount = match catalog.track_info(&seed.artist, &seed.title).await {
            Ok(info) => Some(info.playcount),
            Err(e) => {
                tracing::warn!(error = %e, "Seed playcount lookup failed");
                None
            }
        };

        let mut graph = graph.write().await;

        if seed_playcount.unwrap_or(0) > 0 || !discovered.tags.is_empty() {
            let mut refreshed = seed.clone();
            refreshed.playcount = seed_playcount.unwrap_or(0);
            refreshed.tags = discovered.tags.clone();
            graph.upsert_node(refreshed, None);
        }

        let mut links = Vec::new();
        for result in &discovered.results {
            let child_id = graph.upsert_node(result.track.clone(), Some(node_id));
            let created = graph.upsert_edge(node_id, child_id, result.score, result.strategy);
            if created {
                links.push(NewLink {
                    node_id: child_id,
                    track: result.track.clone(),
                    score: result.score,
                    strategy: result.strategy,
                });
            }
        }
        graph.mark_expanded(node_id);

        ExpansionOutcome {
            links,
            tags: discovered.tags,
            sources_used: discovered.sources_used,
            seed_playcount,
        }
    }
}
