use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{
    error::{AppError, AppResult},
    models::{
        primary_artist,
        theme::{theme_for_tags, ThemeDescriptor},
        DiscoveryStrategy, IdentifiedTrack, Track, TrackKey,
    },
    services::coordinator::{ExpansionOutcome, NewLink},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Serialize)]
pub struct SimilarTrackResponse {
    pub artist: String,
    pub title: String,
    pub score: f64,
    pub strategy: DiscoveryStrategy,
}

impl From<&NewLink> for SimilarTrackResponse {
    fn from(link: &NewLink) -> Self {
        Self {
            artist: link.track.artist.clone(),
            title: link.track.title.clone(),
            score: link.score,
            strategy: link.strategy,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub artist: String,
    pub track: String,
}

/// The discovery block shared by both endpoints.
#[derive(Debug, Serialize)]
pub struct LastfmResponse {
    pub similar_tracks: Vec<SimilarTrackResponse>,
    /// "merged" when several tiers contributed, the single tier's name when
    /// one did, "none" when discovery came back empty.
    pub similar_source: String,
    pub similar_sources: Vec<String>,
    pub top_tags: Vec<String>,
    pub query: QueryResponse,
}

impl LastfmResponse {
    fn from_outcome(outcome: &ExpansionOutcome, artist: &str, title: &str) -> Self {
        let similar_sources: Vec<String> = outcome
            .sources_used
            .iter()
            .map(|s| s.to_string())
            .collect();
        let similar_source = match similar_sources.len() {
            0 => "none".to_string(),
            1 => similar_sources[0].clone(),
            _ => "merged".to_string(),
        };

        Self {
            similar_tracks: outcome.links.iter().map(SimilarTrackResponse::from).collect(),
            similar_source,
            similar_sources,
            top_tags: outcome.tags.clone(),
            query: QueryResponse {
                artist: primary_artist(artist),
                track: title.trim().to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    /// `null` when the recognition service found no match — a valid
    /// terminal outcome, not an error.
    pub identified: Option<IdentifiedTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<&'static ThemeDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastfm: Option<LastfmResponse>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub artist: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub exclude: Vec<ExcludeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ExcludeEntry {
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub artist: String,
    pub title: String,
    pub playcount: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub seed: SeedResponse,
    pub lastfm: LastfmResponse,
}

// Handlers

/// Identifies a track from an uploaded audio sample and starts a new
/// constellation session around it.
///
/// Expects multipart/form-data with the audio bytes in a field named
/// `audio` (or `file`).
pub async fn identify(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<IdentifyResponse>> {
    let mut audio: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "audio" || name == "file" {
            let filename = field.file_name().unwrap_or("audio.wav").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidInput(format!("Unreadable audio field: {}", e)))?;
            audio = Some((bytes.to_vec(), filename));
            break;
        }
    }

    let Some((bytes, filename)) = audio else {
        return Err(AppError::InvalidInput(
            "Missing multipart field 'audio'".to_string(),
        ));
    };
    if bytes.is_empty() {
        return Err(AppError::InvalidInput("Empty audio upload".to_string()));
    }

    tracing::info!(bytes = bytes.len(), filename = %filename, "Processing identify request");

    let Some(identified) = state.recognizer.recognize(bytes, &filename).await? else {
        return Ok(Json(IdentifyResponse {
            identified: None,
            theme: None,
            lastfm: None,
        }));
    };

    let artist = identified.artist.clone();
    let title = identified.title.clone();

    // A successful identification starts a fresh session.
    let seed_id = state
        .coordinator
        .reset_with_seed(Track::new(artist.clone(), title.clone()))
        .await;
    let outcome = state.coordinator.expand(seed_id, HashSet::new()).await?;

    Ok(Json(IdentifyResponse {
        theme: Some(theme_for_tags(&outcome.tags)),
        lastfm: Some(LastfmResponse::from_outcome(&outcome, &artist, &title)),
        identified: Some(identified),
    }))
}

/// Expands the constellation around a known track, excluding everything the
/// caller already has.
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> AppResult<Json<RecommendResponse>> {
    let artist = request.artist.unwrap_or_default().trim().to_string();
    let title = request.title.unwrap_or_default().trim().to_string();

    if artist.is_empty() || title.is_empty() {
        return Err(AppError::InvalidInput(
            "Fields 'artist' and 'title' are required".to_string(),
        ));
    }

    let mut extra_exclude = HashSet::new();
    for entry in &request.exclude {
        let key = TrackKey::new(&entry.artist, &entry.title);
        if !key.is_empty() {
            extra_exclude.insert(key);
        }
    }

    tracing::info!(
        artist = %artist,
        title = %title,
        exclude_count = extra_exclude.len(),
        "Processing recommend request"
    );

    let node_id = state
        .coordinator
        .ensure_node(Track::new(artist.clone(), title.clone()))
        .await;
    let outcome = state.coordinator.expand(node_id, extra_exclude).await?;

    let lastfm = LastfmResponse::from_outcome(&outcome, &artist, &title);

    Ok(Json(RecommendResponse {
        seed: SeedResponse {
            artist,
            title,
            playcount: outcome.seed_playcount,
        },
        lastfm,
    }))
}
