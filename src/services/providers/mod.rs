/// Music data provider abstractions
///
/// Two seams separate the engine from the outside world: `MusicCatalog`
/// (the similarity/tag/chart catalog, Last.fm in production) and
/// `Recognizer` (the audio fingerprinting service, ACRCloud in production).
/// The discovery engine and the transport layer are written against these
/// traits so tests can substitute mocks.
use serde::{Deserialize, Serialize};

use crate::{error::AppResult, models::IdentifiedTrack};

pub mod acrcloud;
pub mod lastfm;

/// A candidate track as the catalog reports it: display strings plus the
/// service's native similarity score, when it provides one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrack {
    pub artist: String,
    pub title: String,
    /// Native similarity in [0,1]; `None` when the source call has no
    /// per-track score (top tracks, tag tracks, chart).
    pub score: Option<f64>,
}

/// A similar artist with the catalog's artist-level match score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarArtist {
    pub name: String,
    pub score: Option<f64>,
}

/// Catalog-side metadata for a single track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub playcount: u64,
    /// When this lookup was made; cached entries keep their original stamp.
    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

/// Trait for the music catalog behind the discovery tiers
///
/// One method per wire call. Every method is independently bounded by the
/// provider's client timeout; callers treat an `Err` from any of them as
/// that tier yielding zero results.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MusicCatalog: Send + Sync {
    /// Tracks similar to (artist, title), with native scores.
    async fn similar_tracks(
        &self,
        artist: &str,
        title: &str,
        limit: usize,
    ) -> AppResult<Vec<CandidateTrack>>;

    /// Artists similar to the given artist, in the service's order.
    async fn similar_artists(&self, artist: &str, limit: usize) -> AppResult<Vec<SimilarArtist>>;

    /// An artist's top tracks, most popular first.
    async fn artist_top_tracks(
        &self,
        artist: &str,
        limit: usize,
    ) -> AppResult<Vec<CandidateTrack>>;

    /// Top tracks for a tag.
    async fn tag_top_tracks(&self, tag: &str, limit: usize) -> AppResult<Vec<CandidateTrack>>;

    /// The global top-tracks chart.
    async fn chart_top_tracks(&self, limit: usize) -> AppResult<Vec<CandidateTrack>>;

    /// Top tags for a track, in relevance order.
    async fn track_top_tags(
        &self,
        artist: &str,
        title: &str,
        limit: usize,
    ) -> AppResult<Vec<String>>;

    /// Top tags for an artist; used when the track itself has none.
    async fn artist_top_tags(&self, artist: &str, limit: usize) -> AppResult<Vec<String>>;

    /// Metadata (playcount) for a single track.
    async fn track_info(&self, artist: &str, title: &str) -> AppResult<TrackInfo>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Trait for the audio recognition service
///
/// `Ok(None)` means the service genuinely found no match — a valid terminal
/// outcome, distinct from transport errors.
#[async_trait::async_trait]
pub trait Recognizer: Send + Sync {
    /// Identifies a track from raw audio bytes.
    async fn recognize(&self, audio: Vec<u8>, filename: &str)
        -> AppResult<Option<IdentifiedTrack>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
