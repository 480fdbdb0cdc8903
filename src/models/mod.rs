use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod theme;

/// Canonical identity of a track: normalized (artist, title) pair.
///
/// Two tracks with equal keys are the same graph node, full stop. Equality is
/// exact string equality after normalization — no fuzzy matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackKey {
    artist: String,
    title: String,
}

impl TrackKey {
    /// Builds a key by folding case, trimming, and collapsing internal
    /// whitespace runs to a single space. Total: empty or missing fields
    /// normalize to empty components, never an error.
    pub fn new(artist: &str, title: &str) -> Self {
        Self {
            artist: normalize_component(artist),
            title: normalize_component(title),
        }
    }

    /// A key whose both components normalized to empty, e.g. a provider
    /// result with no usable artist or title.
    pub fn is_empty(&self) -> bool {
        self.artist.is_empty() && self.title.is_empty()
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl Display for TrackKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} — {}", self.artist, self.title)
    }
}

fn normalize_component(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A track as it flows through discovery and the constellation graph.
///
/// `playcount` is 0 when the provider doesn't report one; `tags` holds at
/// most the top 3 tags in provider relevance order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub playcount: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Track {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            playcount: 0,
            tags: Vec::new(),
        }
    }

    pub fn key(&self) -> TrackKey {
        TrackKey::new(&self.artist, &self.title)
    }
}

/// Reduces a multi-artist string to its primary artist for catalog queries.
///
/// Recognition services return strings like "A/B/C", "A & B" or
/// "A feat. B"; the catalog matches far better on the primary artist alone.
pub fn primary_artist(raw: &str) -> String {
    let mut s = raw.trim().to_string();
    for sep in ['/', '&', ',', ';'] {
        if let Some(idx) = s.find(sep) {
            s.truncate(idx);
            s = s.trim_end().to_string();
        }
    }
    let lower = s.to_lowercase();
    for token in [" feat. ", " feat ", " ft. ", " ft ", " featuring "] {
        if let Some(idx) = lower.find(token) {
            s.truncate(idx);
            break;
        }
    }
    s.trim().to_string()
}

/// Which fallback tier produced a discovery result.
///
/// Tier order is rank order: scores from different tiers are not comparable,
/// so results are never re-sorted across tier boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    /// track.getSimilar — native similarity scores
    Direct,
    /// artist.getSimilar → each artist's top tracks — synthetic scores
    Artist,
    /// tag.getTopTracks on the seed's top tag — synthetic scores
    Tag,
    /// chart.getTopTracks — last resort, lowest confidence
    Chart,
}

impl DiscoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryStrategy::Direct => "direct",
            DiscoveryStrategy::Artist => "artist",
            DiscoveryStrategy::Tag => "tag",
            DiscoveryStrategy::Chart => "chart",
        }
    }
}

impl Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovery result: a candidate track, its (possibly synthetic) score,
/// and the tier that found it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimilarTrack {
    #[serde(flatten)]
    pub track: Track,
    pub score: f64,
    pub strategy: DiscoveryStrategy,
}

/// Output of one discovery run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    pub results: Vec<SimilarTrack>,
    pub tags: Vec<String>,
    pub sources_used: Vec<DiscoveryStrategy>,
}

/// Result of a successful audio recognition.
///
/// Everything beyond artist/title is passthrough metadata from the
/// fingerprinting service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentifiedTrack {
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub acrid: Option<String>,
}
