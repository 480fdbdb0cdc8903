/// ACRCloud recognition provider
///
/// Implements the ACRCloud HTTP identification protocol: a multipart POST of
/// the raw audio sample, authenticated with an HMAC-SHA1 signature over a
/// newline-joined string-to-sign, base64 encoded.
///
/// A non-zero status code in the response body means "no match", which is a
/// valid outcome (`Ok(None)`), not an error.
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use reqwest::multipart::{Form, Part};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use sha1::Sha1;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::{
    error::{AppError, AppResult},
    models::IdentifiedTrack,
    services::providers::Recognizer,
};

type HmacSha1 = Hmac<Sha1>;

const IDENTIFY_URI: &str = "/v1/identify";
const DATA_TYPE: &str = "audio";
const SIGNATURE_VERSION: &str = "1";

#[derive(Clone)]
pub struct AcrCloudRecognizer {
    http_client: HttpClient,
    host: String,
    access_key: String,
    access_secret: String,
}

#[derive(Debug, Deserialize)]
struct AcrResponse {
    status: AcrStatus,
    #[serde(default)]
    metadata: Option<AcrMetadata>,
}

#[derive(Debug, Deserialize)]
struct AcrStatus {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AcrMetadata {
    #[serde(default)]
    music: Vec<AcrMusic>,
}

#[derive(Debug, Deserialize)]
struct AcrMusic {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artists: Vec<AcrArtist>,
    #[serde(default)]
    album: Option<AcrAlbum>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    score: Option<u32>,
    #[serde(default)]
    acrid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AcrArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AcrAlbum {
    #[serde(default)]
    name: Option<String>,
}

impl AcrCloudRecognizer {
    pub fn new(
        host: String,
        access_key: String,
        access_secret: String,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(AppError::HttpClient)?;

        Ok(Self {
            http_client,
            host,
            access_key,
            access_secret,
        })
    }

    /// HMAC-SHA1 signature over the protocol's newline-joined string-to-sign.
    fn signature(&self, timestamp: &str) -> AppResult<String> {
        let string_to_sign = [
            "POST",
            IDENTIFY_URI,
            self.access_key.as_str(),
            DATA_TYPE,
            SIGNATURE_VERSION,
            timestamp,
        ]
        .join("\n");

        let mut mac = HmacSha1::new_from_slice(self.access_secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("HMAC key error: {}", e)))?;
        mac.update(string_to_sign.as_bytes());

        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    fn parse_match(music: AcrMusic) -> Option<IdentifiedTrack> {
        let artist = music.artists.into_iter().next()?.name;
        let title = music.title?;

        Some(IdentifiedTrack {
            artist,
            title,
            album: music.album.and_then(|a| a.name),
            release_date: music.release_date,
            duration_ms: music.duration_ms,
            score: music.score,
            acrid: music.acrid,
        })
    }
}

#[async_trait::async_trait]
impl Recognizer for AcrCloudRecognizer {
    async fn recognize(
        &self,
        audio: Vec<u8>,
        filename: &str,
    ) -> AppResult<Option<IdentifiedTrack>> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(format!("System clock error: {}", e)))?
            .as_secs()
            .to_string();

        let signature = self.signature(&timestamp)?;
        let sample_bytes = audio.len().to_string();

        let form = Form::new()
            .part("sample", Part::bytes(audio).file_name(filename.to_string()))
            .text("access_key", self.access_key.clone())
            .text("data_type", DATA_TYPE)
            .text("signature_version", SIGNATURE_VERSION)
            .text("signature", signature)
            .text("timestamp", timestamp)
            .text("sample_bytes", sample_bytes);

        let url = format!("https://{}{}", self.host, IDENTIFY_URI);

        let response = self.http_client.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "ACRCloud returned status {}: {}",
                status, body
            )));
        }

        let payload: AcrResponse = response.json().await?;

        if payload.status.code != 0 {
            // Non-zero status is "no match", not a failure
            tracing::info!(
                code = payload.status.code,
                msg = payload.status.msg.as_deref().unwrap_or(""),
                provider = "acrcloud",
                "Recognition found no match"
            );
            return Ok(None);
        }

        let identified = payload
            .metadata
            .and_then(|m| m.music.into_iter().next())
            .and_then(Self::parse_match);

        match &identified {
            Some(track) => tracing::info!(
                artist = %track.artist,
                title = %track.title,
                provider = "acrcloud",
                "Track identified"
            ),
            None => tracing::warn!(
                provider = "acrcloud",
                "Match status with unusable metadata, treating as no match"
            ),
        }

        Ok(identified)
    }

    fn name(&self) -> &'static str {
        "acrcloud"
    }
}
