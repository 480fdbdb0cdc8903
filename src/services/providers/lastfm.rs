/// Last.fm catalog provider
///
/// One method per Last.fm API call. The API has two quirks this module
/// absorbs so nothing upstream sees them:
/// - single-element lists are returned as a bare object instead of an array
/// - numeric fields (match, playcount) arrive as JSON strings as often as
///   numbers
///
/// Errors are reported in-band: HTTP 200 with an `{"error": N, "message"}`
/// payload, so every response is checked for that shape before decoding.
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    services::providers::{CandidateTrack, MusicCatalog, SimilarArtist, TrackInfo},
};

const SIMILAR_CACHE_TTL: u64 = 3600; // 1 hour
const TAGS_CACHE_TTL: u64 = 86400; // 1 day
const CHART_CACHE_TTL: u64 = 1800; // 30 minutes

#[derive(Clone)]
pub struct LastfmProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Cache,
}

/// Last.fm encodes single-element lists as a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => vec![t],
        }
    }
}

/// Artist field: `{"name": "..."}` in most responses, a bare string in some.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireArtist {
    Named { name: String },
    Plain(String),
}

impl WireArtist {
    fn into_name(self) -> String {
        match self {
            WireArtist::Named { name } => name,
            WireArtist::Plain(s) => s,
        }
    }
}

/// Match/playcount values arrive as either numbers or numeric strings.
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct WireTrack {
    name: String,
    artist: Option<WireArtist>,
    #[serde(rename = "match", default)]
    similarity: Option<Value>,
}

impl WireTrack {
    fn into_candidate(self) -> CandidateTrack {
        CandidateTrack {
            artist: self.artist.map(WireArtist::into_name).unwrap_or_default(),
            title: self.name,
            score: self.similarity.as_ref().and_then(as_f64),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSimilarArtist {
    name: String,
    #[serde(rename = "match", default)]
    similarity: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireTag {
    name: String,
}

impl LastfmProvider {
    pub fn new(cache: Cache, api_key: String, api_url: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(AppError::HttpClient)?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
            cache,
        })
    }

    /// Issues one GET against the Last.fm root endpoint and rejects in-band
    /// error payloads.
    async fn get_json(&self, method: &str, params: &[(&str, &str)]) -> AppResult<Value> {
        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[
                ("method", method),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
            ])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Last.fm returned status {}: {}",
                status, body
            )));
        }

        let payload: Value = response.json().await?;

        if let Some(code) = payload.get("error") {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(AppError::ExternalApi(format!(
                "Last.fm error {}: {}",
                code, message
            )));
        }

        Ok(payload)
    }

    /// Decodes a track list at `payload[outer][inner]`, tolerating the
    /// bare-object single-element encoding and a missing list entirely.
    fn decode_tracks(payload: &Value, outer: &str, inner: &str) -> Vec<CandidateTrack> {
        let Some(raw) = payload.get(outer).and_then(|v| v.get(inner)) else {
            return Vec::new();
        };
        match serde_json::from_value::<OneOrMany<WireTrack>>(raw.clone()) {
            Ok(tracks) => tracks
                .into_vec()
                .into_iter()
                .map(WireTrack::into_candidate)
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, outer = outer, "Unexpected Last.fm track payload shape");
                Vec::new()
            }
        }
    }

    fn decode_tags(payload: &Value, limit: usize) -> Vec<String> {
        let Some(raw) = payload.get("toptags").and_then(|v| v.get("tag")) else {
            return Vec::new();
        };
        match serde_json::from_value::<OneOrMany<WireTag>>(raw.clone()) {
            Ok(tags) => tags
                .into_vec()
                .into_iter()
                .map(|t| t.name)
                .take(limit)
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Unexpected Last.fm tag payload shape");
                Vec::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl MusicCatalog for LastfmProvider {
    async fn similar_tracks(
        &self,
        artist: &str,
        title: &str,
        limit: usize,
    ) -> AppResult<Vec<CandidateTrack>> {
        let limit_str = limit.to_string();
        cached!(
            self.cache,
            CacheKey::SimilarTracks(artist.to_string(), title.to_string()),
            SIMILAR_CACHE_TTL,
            async {
                let payload = self
                    .get_json(
                        "track.getSimilar",
                        &[
                            ("artist", artist),
                            ("track", title),
                            ("limit", &limit_str),
                            ("autocorrect", "1"),
                        ],
                    )
                    .await?;

                let tracks = Self::decode_tracks(&payload, "similartracks", "track");

                tracing::debug!(
                    artist = %artist,
                    title = %title,
                    results = tracks.len(),
                    provider = "lastfm",
                    "Similar tracks fetched"
                );

                Ok(tracks)
            }
        )
    }

    async fn similar_artists(&self, artist: &str, limit: usize) -> AppResult<Vec<SimilarArtist>> {
        let limit_str = limit.to_string();
        cached!(
            self.cache,
            CacheKey::SimilarArtists(artist.to_string()),
            SIMILAR_CACHE_TTL,
            async {
                let payload = self
                    .get_json(
                        "artist.getSimilar",
                        &[("artist", artist), ("limit", &limit_str), ("autocorrect", "1")],
                    )
                    .await?;

                let artists: Vec<SimilarArtist> = payload
                    .get("similarartists")
                    .and_then(|v| v.get("artist"))
                    .and_then(|raw| {
                        serde_json::from_value::<OneOrMany<WireSimilarArtist>>(raw.clone()).ok()
                    })
                    .map(|list| {
                        list.into_vec()
                            .into_iter()
                            .map(|a| SimilarArtist {
                                score: a.similarity.as_ref().and_then(as_f64),
                                name: a.name,
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Ok(artists)
            }
        )
    }

    async fn artist_top_tracks(
        &self,
        artist: &str,
        limit: usize,
    ) -> AppResult<Vec<CandidateTrack>> {
        let limit_str = limit.to_string();
        cached!(
            self.cache,
            CacheKey::ArtistTopTracks(artist.to_string()),
            SIMILAR_CACHE_TTL,
            async {
                let payload = self
                    .get_json(
                        "artist.getTopTracks",
                        &[("artist", artist), ("limit", &limit_str), ("autocorrect", "1")],
                    )
                    .await?;

                // Top tracks carry no per-track similarity; artist names in
                // this payload are objects, so decode_tracks handles them.
                Ok(Self::decode_tracks(&payload, "toptracks", "track"))
            }
        )
    }

    async fn tag_top_tracks(&self, tag: &str, limit: usize) -> AppResult<Vec<CandidateTrack>> {
        let limit_str = limit.to_string();
        cached!(
            self.cache,
            CacheKey::TagTopTracks(tag.to_string()),
            SIMILAR_CACHE_TTL,
            async {
                let payload = self
                    .get_json("tag.getTopTracks", &[("tag", tag), ("limit", &limit_str)])
                    .await?;

                Ok(Self::decode_tracks(&payload, "tracks", "track"))
            }
        )
    }

    async fn chart_top_tracks(&self, limit: usize) -> AppResult<Vec<CandidateTrack>> {
        let limit_str = limit.to_string();
        cached!(
            self.cache,
            CacheKey::ChartTopTracks,
            CHART_CACHE_TTL,
            async {
                let payload = self
                    .get_json("chart.getTopTracks", &[("limit", &limit_str)])
                    .await?;

                Ok(Self::decode_tracks(&payload, "tracks", "track"))
            }
        )
    }

    async fn track_top_tags(
        &self,
        artist: &str,
        title: &str,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        cached!(
            self.cache,
            CacheKey::TrackTags(artist.to_string(), title.to_string()),
            TAGS_CACHE_TTL,
            async {
                let payload = self
                    .get_json(
                        "track.getTopTags",
                        &[("artist", artist), ("track", title), ("autocorrect", "1")],
                    )
                    .await?;

                Ok(Self::decode_tags(&payload, limit))
            }
        )
    }

    async fn artist_top_tags(&self, artist: &str, limit: usize) -> AppResult<Vec<String>> {
        cached!(
            self.cache,
            CacheKey::ArtistTags(artist.to_string()),
            TAGS_CACHE_TTL,
            async {
                let payload = self
                    .get_json(
                        "artist.getTopTags",
                        &[("artist", artist), ("autocorrect", "1")],
                    )
                    .await?;

                Ok(Self::decode_tags(&payload, limit))
            }
        )
    }

    async fn track_info(&self, artist: &str, title: &str) -> AppResult<TrackInfo> {
        cached!(
            self.cache,
            CacheKey::TrackInfo(artist.to_string(), title.to_string()),
            SIMILAR_CACHE_TTL,
            async {
                let payload = self
                    .get_json(
                        "track.getInfo",
                        &[("artist", artist), ("track", title), ("autocorrect", "1")],
                    )
                    .await?;

                let playcount = payload
                    .get("track")
                    .and_then(|t| t.get("playcount"))
                    .and_then(as_u64)
                    .unwrap_or(0);

                Ok(TrackInfo {
                    playcount,
                    fetched_at: chrono::Utc::now(),
                })
            }
        )
    }

    fn name(&self) -> &'static str {
        "lastfm"
    }
}
