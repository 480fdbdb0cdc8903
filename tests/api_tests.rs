use std::sync::Arc;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::json;

use constellation_api::api::{create_router, AppState};
use constellation_api::error::AppResult;
use constellation_api::models::IdentifiedTrack;
use constellation_api::services::providers::{
    CandidateTrack, MusicCatalog, Recognizer, SimilarArtist, TrackInfo,
};

/// Catalog stub with a fixed similar-tracks response and tags.
struct FixedCatalog {
    similar: Vec<CandidateTrack>,
}

#[async_trait::async_trait]
impl MusicCatalog for FixedCatalog {
    async fn similar_tracks(
        &self,
        _artist: &str,
        _title: &str,
        _limit: usize,
    ) -> AppResult<Vec<CandidateTrack>> {
        Ok(self.similar.clone())
    }

    async fn similar_artists(&self, _artist: &str, _limit: usize) -> AppResult<Vec<SimilarArtist>> {
        Ok(vec![])
    }

    async fn artist_top_tracks(
        &self,
        _artist: &str,
        _limit: usize,
    ) -> AppResult<Vec<CandidateTrack>> {
        Ok(vec![])
    }

    async fn tag_top_tracks(&self, _tag: &str, _limit: usize) -> AppResult<Vec<CandidateTrack>> {
        Ok(vec![])
    }

    async fn chart_top_tracks(&self, _limit: usize) -> AppResult<Vec<CandidateTrack>> {
        Ok(vec![])
    }

    async fn track_top_tags(
        &self,
        _artist: &str,
        _title: &str,
        _limit: usize,
    ) -> AppResult<Vec<String>> {
        Ok(vec!["electronic".to_string(), "house".to_string()])
    }

    async fn artist_top_tags(&self, _artist: &str, _limit: usize) -> AppResult<Vec<String>> {
        Ok(vec![])
    }

    async fn track_info(&self, _artist: &str, _title: &str) -> AppResult<TrackInfo> {
        Ok(TrackInfo {
            playcount: 4242,
            fetched_at: chrono::Utc::now(),
        })
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Recognizer stub returning a canned identification, or no match.
struct FixedRecognizer {
    result: Option<IdentifiedTrack>,
}

#[async_trait::async_trait]
impl Recognizer for FixedRecognizer {
    async fn recognize(
        &self,
        _audio: Vec<u8>,
        _filename: &str,
    ) -> AppResult<Option<IdentifiedTrack>> {
        Ok(self.result.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn candidate(artist: &str, title: &str, score: f64) -> CandidateTrack {
    CandidateTrack {
        artist: artist.to_string(),
        title: title.to_string(),
        score: Some(score),
    }
}

fn identified_daft_punk() -> IdentifiedTrack {
    IdentifiedTrack {
        artist: "Daft Punk".to_string(),
        title: "One More Time".to_string(),
        album: Some("Discovery".to_string()),
        release_date: Some("2001-03-12".to_string()),
        duration_ms: Some(320000),
        score: Some(100),
        acrid: Some("abc123".to_string()),
    }
}

fn create_test_server(recognized: Option<IdentifiedTrack>, similar: Vec<CandidateTrack>) -> TestServer {
    let state = AppState::new(
        Arc::new(FixedRecognizer { result: recognized }),
        Arc::new(FixedCatalog { similar }),
    );
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

fn audio_form() -> MultipartForm {
    MultipartForm::new().add_part("audio", Part::bytes(vec![0u8; 256]).file_name("clip.wav"))
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(None, vec![]);
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_identify_success_builds_constellation() {
    let server = create_test_server(
        Some(identified_daft_punk()),
        vec![
            candidate("Justice", "D.A.N.C.E.", 0.8),
            candidate("Modjo", "Lady", 0.7),
        ],
    );

    let response = server.post("/api/v1/identify").multipart(audio_form()).await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["identified"]["artist"], "Daft Punk");
    assert_eq!(body["identified"]["title"], "One More Time");
    assert_eq!(body["identified"]["album"], "Discovery");

    // Tags drive the theme lookup
    assert_eq!(body["theme"]["name"], "circuit");

    let lastfm = &body["lastfm"];
    assert_eq!(lastfm["similar_tracks"].as_array().unwrap().len(), 2);
    assert_eq!(lastfm["similar_tracks"][0]["artist"], "Justice");
    assert_eq!(lastfm["similar_tracks"][0]["strategy"], "direct");
    assert_eq!(lastfm["similar_source"], "direct");
    assert_eq!(lastfm["similar_sources"], json!(["direct"]));
    assert_eq!(lastfm["top_tags"], json!(["electronic", "house"]));
    assert_eq!(lastfm["query"]["artist"], "Daft Punk");
}

#[tokio::test]
async fn test_identify_no_match_is_null_not_error() {
    let server = create_test_server(None, vec![]);

    let response = server.post("/api/v1/identify").multipart(audio_form()).await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert!(body["identified"].is_null());
}

#[tokio::test]
async fn test_identify_missing_audio_field_is_rejected() {
    let server = create_test_server(Some(identified_daft_punk()), vec![]);

    let form = MultipartForm::new().add_text("note", "no audio here");
    let response = server.post("/api/v1/identify").multipart(form).await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_identify_empty_audio_is_rejected() {
    let server = create_test_server(Some(identified_daft_punk()), vec![]);

    let form = MultipartForm::new().add_part("audio", Part::bytes(Vec::new()).file_name("e.wav"));
    let response = server.post("/api/v1/identify").multipart(form).await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_identify_multi_artist_string_queries_primary_artist() {
    let mut identified = identified_daft_punk();
    identified.artist = "Daft Punk/Pharrell Williams".to_string();
    let server = create_test_server(Some(identified), vec![]);

    let response = server.post("/api/v1/identify").multipart(audio_form()).await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    // Display value is untouched; the catalog query uses the primary artist
    assert_eq!(body["identified"]["artist"], "Daft Punk/Pharrell Williams");
    assert_eq!(body["lastfm"]["query"]["artist"], "Daft Punk");
}

#[tokio::test]
async fn test_recommend_returns_seed_and_similars() {
    let server = create_test_server(
        None,
        vec![
            candidate("Justice", "Genesis", 0.9),
            candidate("Air", "Sexy Boy", 0.6),
        ],
    );

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({"artist": "Daft Punk", "title": "One More Time"}))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["seed"]["artist"], "Daft Punk");
    assert_eq!(body["seed"]["playcount"], 4242);
    assert_eq!(body["lastfm"]["similar_tracks"].as_array().unwrap().len(), 2);
    assert_eq!(body["lastfm"]["similar_source"], "direct");
}

#[tokio::test]
async fn test_recommend_missing_fields_are_rejected() {
    let server = create_test_server(None, vec![]);

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({"artist": "Daft Punk"}))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({"artist": "  ", "title": "One More Time"}))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommend_honors_exclude_list() {
    let server = create_test_server(
        None,
        vec![
            candidate("Justice", "Genesis", 0.9),
            candidate("Air", "Sexy Boy", 0.6),
        ],
    );

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({
            "artist": "Daft Punk",
            "title": "One More Time",
            "exclude": [{"artist": "JUSTICE", "title": "genesis"}]
        }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let tracks = body["lastfm"]["similar_tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0]["artist"], "Air");
}

#[tokio::test]
async fn test_recommend_twice_excludes_existing_neighbors() {
    // The graph remembers the first expansion; re-expanding the same seed
    // with unchanged catalog data yields nothing new.
    let server = create_test_server(
        None,
        vec![
            candidate("Justice", "Genesis", 0.9),
            candidate("Air", "Sexy Boy", 0.6),
        ],
    );

    let request = json!({"artist": "Daft Punk", "title": "One More Time"});

    let first = server.post("/api/v1/recommend").json(&request).await;
    first.assert_status_ok();
    let body: serde_json::Value = first.json();
    assert_eq!(body["lastfm"]["similar_tracks"].as_array().unwrap().len(), 2);

    let second = server.post("/api/v1/recommend").json(&request).await;
    second.assert_status_ok();
    let body: serde_json::Value = second.json();
    assert!(body["lastfm"]["similar_tracks"].as_array().unwrap().is_empty());
    assert_eq!(body["lastfm"]["similar_source"], "none");
}
