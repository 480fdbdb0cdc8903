/// Constellation graph store
///
/// Session-scoped in-memory graph of discovered tracks. State is monotonic:
/// nodes and edges are only ever added or strengthened, never removed, so
/// out-of-order expansion results can be applied in any order without
/// corrupting earlier ones. At most one node exists per normalized track
/// identity and at most one edge per unordered node pair.
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::{DiscoveryStrategy, Track, TrackKey};

/// A similarity relation between two nodes. Directed seed → result at
/// insertion time, but identified and deduplicated as an unordered pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityEdge {
    pub source: Uuid,
    pub target: Uuid,
    pub score: f64,
    pub strategy: DiscoveryStrategy,
}

/// A track plus its graph-specific state.
#[derive(Debug, Clone)]
pub struct ConstellationNode {
    pub id: Uuid,
    pub track: Track,
    /// The node whose expansion first discovered this one, if any.
    pub introduced_by: Option<Uuid>,
    pub expanded: bool,
}

#[derive(Default)]
pub struct ConstellationGraph {
    nodes: HashMap<Uuid, ConstellationNode>,
    index: HashMap<TrackKey, Uuid>,
    edges: HashMap<(Uuid, Uuid), SimilarityEdge>,
    adjacency: HashMap<Uuid, HashSet<Uuid>>,
}

/// Unordered-pair edge identity.
fn edge_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl ConstellationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a track, or returns the existing node for its identity.
    ///
    /// Re-insertion refreshes popularity and tags when the incoming data is
    /// non-empty; `introduced_by` is only recorded at first insertion.
    pub fn upsert_node(&mut self, track: Track, introduced_by: Option<Uuid>) -> Uuid {
        let key = track.key();

        if let Some(&id) = self.index.get(&key) {
            if let Some(node) = self.nodes.get_mut(&id) {
                if track.playcount > 0 {
                    node.track.playcount = track.playcount;
                }
                if !track.tags.is_empty() {
                    node.track.tags = track.tags;
                }
            }
            return id;
        }

        let id = Uuid::new_v4();
        self.nodes.insert(
            id,
            ConstellationNode {
                id,
                track,
                introduced_by,
                expanded: false,
            },
        );
        self.index.insert(key, id);
        id
    }

    /// Inserts or strengthens the edge between two nodes. Returns `true`
    /// only when the edge is newly created; re-insertion takes the max score
    /// and keeps the higher-scoring strategy.
    pub fn upsert_edge(
        &mut self,
        source: Uuid,
        target: Uuid,
        score: f64,
        strategy: DiscoveryStrategy,
    ) -> bool {
        if source == target || !self.nodes.contains_key(&source) || !self.nodes.contains_key(&target)
        {
            return false;
        }

        let key = edge_key(source, target);
        if let Some(edge) = self.edges.get_mut(&key) {
            if score > edge.score {
                edge.score = score;
                edge.strategy = strategy;
            }
            return false;
        }

        self.edges.insert(
            key,
            SimilarityEdge {
                source,
                target,
                score,
                strategy,
            },
        );
        self.adjacency.entry(source).or_default().insert(target);
        self.adjacency.entry(target).or_default().insert(source);
        true
    }

    /// Marks a node as expanded. Idempotent; once expanded, stays expanded.
    pub fn mark_expanded(&mut self, id: Uuid) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.expanded = true;
        }
    }

    /// Identities a re-expansion of `id` must not re-discover: the node
    /// itself, every current neighbor, and the node that introduced it.
    /// Never shrinks across calls — the graph has no removal.
    pub fn exclude_set_for(&self, id: Uuid) -> HashSet<TrackKey> {
        let mut exclude = HashSet::new();

        let Some(node) = self.nodes.get(&id) else {
            return exclude;
        };
        exclude.insert(node.track.key());

        if let Some(neighbors) = self.adjacency.get(&id) {
            for neighbor in neighbors {
                if let Some(n) = self.nodes.get(neighbor) {
                    exclude.insert(n.track.key());
                }
            }
        }

        if let Some(origin) = node.introduced_by.and_then(|o| self.nodes.get(&o)) {
            exclude.insert(origin.track.key());
        }

        exclude
    }

    pub fn node(&self, id: Uuid) -> Option<&ConstellationNode> {
        self.nodes.get(&id)
    }

    pub fn edge_between(&self, a: Uuid, b: Uuid) -> Option<&SimilarityEdge> {
        self.edges.get(&edge_key(a, b))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
