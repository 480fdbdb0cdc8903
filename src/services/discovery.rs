/// Fallback discovery engine
///
/// Runs an ordered sequence of catalog strategies until enough distinct
/// candidates survive exclusion, or every tier is exhausted. Tier order is
/// rank order: scores from different tiers are never compared, so results
/// are appended tier by tier and never re-sorted.
///
/// A tier that fails (network error, timeout, malformed payload) yields zero
/// results and the engine moves on; an all-empty outcome is a valid result,
/// not an error.
use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    models::{primary_artist, Discovery, DiscoveryStrategy, SimilarTrack, Track, TrackKey},
    services::providers::{CandidateTrack, MusicCatalog},
};

/// How many results a discovery run aims for.
pub const DEFAULT_LIMIT: usize = 5;

/// How many tags are fetched for the seed (used for theming, independent of
/// the tier logic).
const MAX_TAGS: usize = 3;

/// Synthetic score scheme: monotonically decreasing across fallback tiers.
/// Only the tier ordering is load-bearing; these keep fallback candidates
/// visibly below native matches when scores are displayed.
const ARTIST_SCORE_DECAY: f64 = 0.5;
const TAG_SCORE: f64 = 0.05;
const CHART_SCORE: f64 = 0.0;

/// Top tracks pulled per similar artist in the artist tier.
const TOP_TRACKS_PER_ARTIST: usize = 3;

#[derive(Clone)]
pub struct DiscoveryEngine {
    catalog: Arc<dyn MusicCatalog>,
}

impl DiscoveryEngine {
    pub fn new(catalog: Arc<dyn MusicCatalog>) -> Self {
        Self { catalog }
    }

    /// Discovers up to `limit` tracks related to `seed`, skipping the seed
    /// itself and everything in `exclude`.
    pub async fn discover(
        &self,
        seed: &Track,
        exclude: &HashSet<TrackKey>,
        limit: usize,
    ) -> Discovery {
        let artist = primary_artist(&seed.artist);
        let title = seed.title.trim().to_string();

        let tags = self.fetch_tags(&artist, &title).await;

        // Seen set grows as candidates are accepted so one tier can't
        // re-introduce another tier's result.
        let mut seen: HashSet<TrackKey> = exclude.clone();
        seen.insert(seed.key());
        seen.insert(TrackKey::new(&artist, &title));

        // Over-fetch so exclusion can't starve a tier that had enough data.
        let fetch_limit = limit + exclude.len() + 10;

        let mut results: Vec<SimilarTrack> = Vec::new();
        let mut sources_used: Vec<DiscoveryStrategy> = Vec::new();

        // Tier 1: direct track similarity, native scores.
        let direct = self
            .tier(
                DiscoveryStrategy::Direct,
                self.catalog.similar_tracks(&artist, &title, fetch_limit),
            )
            .await;
        let accepted = Self::merge(
            &mut results,
            &mut seen,
            direct,
            DiscoveryStrategy::Direct,
            |c| c.score.unwrap_or(0.0).clamp(0.0, 1.0),
            limit,
        );
        if accepted > 0 {
            sources_used.push(DiscoveryStrategy::Direct);
        }

        // Tier 2: similar artists, each contributing its top tracks, with a
        // decayed synthetic score so they rank below genuine track matches.
        if results.len() < limit {
            let artists = self
                .tier(
                    DiscoveryStrategy::Artist,
                    self.catalog.similar_artists(&artist, fetch_limit),
                )
                .await;

            let mut accepted = 0;
            for similar in artists {
                if results.len() >= limit {
                    break;
                }
                let top = self
                    .tier(
                        DiscoveryStrategy::Artist,
                        self.catalog
                            .artist_top_tracks(&similar.name, TOP_TRACKS_PER_ARTIST),
                    )
                    .await;
                let synthetic =
                    similar.score.unwrap_or(0.0).clamp(0.0, 1.0) * ARTIST_SCORE_DECAY;
                accepted += Self::merge(
                    &mut results,
                    &mut seen,
                    top,
                    DiscoveryStrategy::Artist,
                    |_| synthetic,
                    limit,
                );
            }
            if accepted > 0 {
                sources_used.push(DiscoveryStrategy::Artist);
            }
        }

        // Tier 3: top tracks for the seed's tags, top tag first. Stops at
        // the first tag that contributes anything.
        if results.len() < limit && !tags.is_empty() {
            let mut accepted = 0;
            for tag in &tags {
                let tag_tracks = self
                    .tier(
                        DiscoveryStrategy::Tag,
                        self.catalog.tag_top_tracks(tag, fetch_limit),
                    )
                    .await;
                accepted = Self::merge(
                    &mut results,
                    &mut seen,
                    tag_tracks,
                    DiscoveryStrategy::Tag,
                    |_| TAG_SCORE,
                    limit,
                );
                if accepted > 0 {
                    break;
                }
            }
            if accepted > 0 {
                sources_used.push(DiscoveryStrategy::Tag);
            }
        }

        // Tier 4: global chart, lowest confidence. Only when every tier
        // above came back completely empty.
        if results.is_empty() {
            let chart = self
                .tier(
                    DiscoveryStrategy::Chart,
                    self.catalog.chart_top_tracks(fetch_limit),
                )
                .await;
            let accepted = Self::merge(
                &mut results,
                &mut seen,
                chart,
                DiscoveryStrategy::Chart,
                |_| CHART_SCORE,
                limit,
            );
            if accepted > 0 {
                sources_used.push(DiscoveryStrategy::Chart);
            }
        }

        tracing::info!(
            seed = %seed.key(),
            results = results.len(),
            sources = ?sources_used,
            "Discovery completed"
        );

        Discovery {
            results,
            tags,
            sources_used,
        }
    }

    /// Fetches up to 3 tags for the seed: track tags first, then the seed
    /// artist's tags when the track has none. Failures degrade to no tags.
    async fn fetch_tags(&self, artist: &str, title: &str) -> Vec<String> {
        let track_tags = self
            .tier(
                DiscoveryStrategy::Tag,
                self.catalog.track_top_tags(artist, title, MAX_TAGS),
            )
            .await;
        if !track_tags.is_empty() {
            return track_tags;
        }

        self.tier(
            DiscoveryStrategy::Tag,
            self.catalog.artist_top_tags(artist, MAX_TAGS),
        )
        .await
    }

    /// Awaits one catalog call, absorbing failure into an empty tier.
    async fn tier<T>(
        &self,
        strategy: DiscoveryStrategy,
        call: impl std::future::Future<Output = crate::error::AppResult<Vec<T>>>,
    ) -> Vec<T> {
        match call.await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    tier = %strategy,
                    error = %e,
                    "Discovery tier unavailable, continuing with next tier"
                );
                Vec::new()
            }
        }
    }

    /// Appends surviving candidates in service order until `limit`, keyed by
    /// normalized identity. Returns how many were accepted.
    fn merge(
        results: &mut Vec<SimilarTrack>,
        seen: &mut HashSet<TrackKey>,
        candidates: Vec<CandidateTrack>,
        strategy: DiscoveryStrategy,
        score: impl Fn(&CandidateTrack) -> f64,
        limit: usize,
    ) -> usize {
        let mut accepted = 0;
        for candidate in candidates {
            if results.len() >= limit {
                break;
            }
            let key = TrackKey::new(&candidate.artist, &candidate.title);
            if key.is_empty() || seen.contains(&key) {
                continue;
            }
            let value = score(&candidate);
            seen.insert(key);
            results.push(SimilarTrack {
                track: Track::new(candidate.artist.clone(), candidate.title.clone()),
                score: value,
                strategy,
            });
            accepted += 1;
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::{MockMusicCatalog, SimilarArtist};

    fn candidate(artist: &str, title: &str, score: Option<f64>) -> CandidateTrack {
        CandidateTrack {
            artist: artist.to_string(),
            title: title.to_string(),
            score,
        }
    }

    fn seed() -> Track {
        Track::new("Daft Punk", "One More Time")
    }

    fn engine_with(mock: MockMusicCatalog) -> DiscoveryEngine {
        DiscoveryEngine::new(Arc::new(mock))
    }

    fn expect_tags(mock: &mut MockMusicCatalog, tags: Vec<&str>) {
        let owned: Vec<String> = tags.into_iter().map(String::from).collect();
        mock.expect_track_top_tags()
            .returning(move |_, _, _| Ok(owned.clone()));
    }

    #[tokio::test]
    async fn test_direct_tier_fills_limit_without_fallback() {
        let mut mock = MockMusicCatalog::new();
        expect_tags(&mut mock, vec!["electronic", "house", "french"]);
        mock.expect_similar_tracks().times(1).returning(|_, _, _| {
            Ok(vec![
                candidate("Daft Punk", "Digital Love", Some(0.9)),
                candidate("Daft Punk", "Harder Better Faster Stronger", Some(0.85)),
                candidate("Justice", "D.A.N.C.E.", Some(0.7)),
                candidate("Modjo", "Lady", Some(0.65)),
                candidate("Stardust", "Music Sounds Better with You", Some(0.6)),
            ])
        });
        mock.expect_similar_artists().times(0);
        mock.expect_artist_top_tracks().times(0);
        mock.expect_tag_top_tracks().times(0);
        mock.expect_chart_top_tracks().times(0);
        mock.expect_artist_top_tags().times(0);

        let engine = engine_with(mock);
        let discovery = engine
            .discover(&seed(), &HashSet::new(), DEFAULT_LIMIT)
            .await;

        assert_eq!(discovery.results.len(), 5);
        assert_eq!(discovery.sources_used, vec![DiscoveryStrategy::Direct]);
        assert_eq!(discovery.tags, vec!["electronic", "house", "french"]);
        // Service order preserved
        assert_eq!(discovery.results[0].track.title, "Digital Love");
        assert_eq!(discovery.results[4].track.title, "Music Sounds Better with You");
    }

    #[tokio::test]
    async fn test_tier_boundary_is_rank_boundary() {
        // Tier 1 returns 3, tier 2 fills 2 more: final order is exactly
        // tier-1's 3 then tier-2's 2, each in its own original order.
        let mut mock = MockMusicCatalog::new();
        expect_tags(&mut mock, vec!["electronic"]);
        mock.expect_similar_tracks().times(1).returning(|_, _, _| {
            Ok(vec![
                candidate("A", "t1", Some(0.3)),
                candidate("B", "t2", Some(0.2)),
                candidate("C", "t3", Some(0.1)),
            ])
        });
        mock.expect_similar_artists().times(1).returning(|_, _| {
            Ok(vec![SimilarArtist {
                name: "D".to_string(),
                score: Some(1.0),
            }])
        });
        mock.expect_artist_top_tracks().times(1).returning(|_, _| {
            Ok(vec![candidate("D", "t4", None), candidate("D", "t5", None)])
        });
        mock.expect_tag_top_tracks().times(0);
        mock.expect_chart_top_tracks().times(0);

        let engine = engine_with(mock);
        let discovery = engine
            .discover(&seed(), &HashSet::new(), DEFAULT_LIMIT)
            .await;

        let titles: Vec<&str> = discovery
            .results
            .iter()
            .map(|r| r.track.title.as_str())
            .collect();
        assert_eq!(titles, vec!["t1", "t2", "t3", "t4", "t5"]);
        // Tier-2 synthetic scores stay put even though 0.5 > tier-1's 0.3:
        // the tier boundary is the rank boundary, no global re-sort.
        assert_eq!(discovery.results[3].score, 0.5);
        assert_eq!(discovery.results[3].strategy, DiscoveryStrategy::Artist);
        assert_eq!(
            discovery.sources_used,
            vec![DiscoveryStrategy::Direct, DiscoveryStrategy::Artist]
        );
    }

    #[tokio::test]
    async fn test_artist_fallback_with_exclusions() {
        // Tier 1 empty, 2 similar artists with 3 top tracks each; 2 of the 6
        // candidates are excluded → 4 results, all synthetic, sources == [artist].
        let mut mock = MockMusicCatalog::new();
        expect_tags(&mut mock, vec!["electronic"]);
        mock.expect_similar_tracks()
            .times(1)
            .returning(|_, _, _| Ok(vec![]));
        mock.expect_similar_artists().times(1).returning(|_, _| {
            Ok(vec![
                SimilarArtist {
                    name: "Justice".to_string(),
                    score: Some(0.8),
                },
                SimilarArtist {
                    name: "Modjo".to_string(),
                    score: Some(0.6),
                },
            ])
        });
        mock.expect_artist_top_tracks()
            .times(2)
            .returning(|artist, _| {
                if artist == "Justice" {
                    Ok(vec![
                        candidate("Justice", "D.A.N.C.E.", None),
                        candidate("Justice", "Genesis", None),
                        candidate("Justice", "We Are Your Friends", None),
                    ])
                } else {
                    Ok(vec![
                        candidate("Modjo", "Lady", None),
                        candidate("Modjo", "Chillin'", None),
                        candidate("Modjo", "What I Mean", None),
                    ])
                }
            });
        // Four results leave the run below the limit, so the tag tier is
        // still consulted; it just contributes nothing.
        mock.expect_tag_top_tracks()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        mock.expect_chart_top_tracks().times(0);

        let mut exclude = HashSet::new();
        exclude.insert(TrackKey::new("Justice", "Genesis"));
        exclude.insert(TrackKey::new("Modjo", "Lady"));

        let engine = engine_with(mock);
        let discovery = engine.discover(&seed(), &exclude, DEFAULT_LIMIT).await;

        assert_eq!(discovery.results.len(), 4);
        assert_eq!(discovery.sources_used, vec![DiscoveryStrategy::Artist]);
        for result in &discovery.results {
            assert_eq!(result.strategy, DiscoveryStrategy::Artist);
            // Synthetic = artist match × 0.5, below any native tier-1 score
            assert!(result.score <= 0.5);
        }
        assert_eq!(discovery.results[0].score, 0.4);
        assert_eq!(discovery.results[2].score, 0.3);
    }

    #[tokio::test]
    async fn test_all_tiers_empty_is_valid_not_error() {
        let mut mock = MockMusicCatalog::new();
        mock.expect_track_top_tags()
            .returning(|_, _, _| Ok(vec![]));
        mock.expect_artist_top_tags()
            .returning(|_, _| Ok(vec![]));
        mock.expect_similar_tracks()
            .returning(|_, _, _| Ok(vec![]));
        mock.expect_similar_artists().returning(|_, _| Ok(vec![]));
        mock.expect_chart_top_tracks().returning(|_| Ok(vec![]));

        let engine = engine_with(mock);
        let discovery = engine
            .discover(&seed(), &HashSet::new(), DEFAULT_LIMIT)
            .await;

        assert!(discovery.results.is_empty());
        assert!(discovery.tags.is_empty());
        assert!(discovery.sources_used.is_empty());
    }

    #[tokio::test]
    async fn test_tier_failure_is_absorbed() {
        use crate::error::AppError;

        let mut mock = MockMusicCatalog::new();
        expect_tags(&mut mock, vec!["rock"]);
        mock.expect_similar_tracks()
            .times(1)
            .returning(|_, _, _| Err(AppError::ExternalApi("boom".to_string())));
        mock.expect_similar_artists().times(1).returning(|_, _| {
            Ok(vec![SimilarArtist {
                name: "Muse".to_string(),
                score: Some(1.0),
            }])
        });
        mock.expect_artist_top_tracks()
            .times(1)
            .returning(|_, _| Ok(vec![candidate("Muse", "Hysteria", None)]));
        mock.expect_tag_top_tracks()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        mock.expect_chart_top_tracks().times(0);

        let engine = engine_with(mock);
        let discovery = engine
            .discover(&seed(), &HashSet::new(), DEFAULT_LIMIT)
            .await;

        assert_eq!(discovery.results.len(), 1);
        assert_eq!(discovery.sources_used, vec![DiscoveryStrategy::Artist]);
    }

    #[tokio::test]
    async fn test_chart_only_when_everything_above_is_empty() {
        // One direct result means the chart must never fire, even though the
        // run ends below the limit.
        let mut mock = MockMusicCatalog::new();
        expect_tags(&mut mock, vec![]);
        mock.expect_artist_top_tags().returning(|_, _| Ok(vec![]));
        mock.expect_similar_tracks()
            .times(1)
            .returning(|_, _, _| Ok(vec![candidate("Air", "Sexy Boy", Some(0.4))]));
        mock.expect_similar_artists()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        mock.expect_chart_top_tracks().times(0);

        let engine = engine_with(mock);
        let discovery = engine
            .discover(&seed(), &HashSet::new(), DEFAULT_LIMIT)
            .await;

        assert_eq!(discovery.results.len(), 1);
        assert_eq!(discovery.sources_used, vec![DiscoveryStrategy::Direct]);
    }

    #[tokio::test]
    async fn test_chart_fires_when_all_tiers_empty() {
        let mut mock = MockMusicCatalog::new();
        mock.expect_track_top_tags().returning(|_, _, _| Ok(vec![]));
        mock.expect_artist_top_tags().returning(|_, _| Ok(vec![]));
        mock.expect_similar_tracks().returning(|_, _, _| Ok(vec![]));
        mock.expect_similar_artists().returning(|_, _| Ok(vec![]));
        mock.expect_chart_top_tracks().times(1).returning(|_| {
            Ok(vec![
                candidate("Global Star", "Hit Single", None),
                candidate("Another Star", "Other Hit", None),
            ])
        });

        let engine = engine_with(mock);
        let discovery = engine
            .discover(&seed(), &HashSet::new(), DEFAULT_LIMIT)
            .await;

        assert_eq!(discovery.results.len(), 2);
        assert_eq!(discovery.sources_used, vec![DiscoveryStrategy::Chart]);
        assert!(discovery.results.iter().all(|r| r.score == 0.0));
    }

    #[tokio::test]
    async fn test_seed_and_duplicates_are_dropped() {
        let mut mock = MockMusicCatalog::new();
        expect_tags(&mut mock, vec!["electronic"]);
        mock.expect_similar_tracks().times(1).returning(|_, _, _| {
            Ok(vec![
                // The seed itself, case/whitespace-mangled
                candidate("DAFT  PUNK", "one more time", Some(1.0)),
                candidate("Justice", "Genesis", Some(0.8)),
                // Duplicate of an earlier candidate
                candidate("justice", "GENESIS", Some(0.8)),
                // Unusable empty identity
                candidate("", "  ", Some(0.5)),
            ])
        });
        mock.expect_similar_artists()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        mock.expect_tag_top_tracks()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        mock.expect_chart_top_tracks().times(0);

        let engine = engine_with(mock);
        let discovery = engine
            .discover(&seed(), &HashSet::new(), DEFAULT_LIMIT)
            .await;

        assert_eq!(discovery.results.len(), 1);
        assert_eq!(discovery.results[0].track.title, "Genesis");
    }

    #[tokio::test]
    async fn test_artist_tag_fallback_when_track_has_none() {
        let mut mock = MockMusicCatalog::new();
        mock.expect_track_top_tags()
            .times(1)
            .returning(|_, _, _| Ok(vec![]));
        mock.expect_artist_top_tags()
            .times(1)
            .returning(|_, _| Ok(vec!["french house".to_string()]));
        mock.expect_similar_tracks().returning(|_, _, _| {
            Ok(vec![
                candidate("A", "1", Some(0.9)),
                candidate("B", "2", Some(0.8)),
                candidate("C", "3", Some(0.7)),
                candidate("D", "4", Some(0.6)),
                candidate("E", "5", Some(0.5)),
            ])
        });

        let engine = engine_with(mock);
        let discovery = engine
            .discover(&seed(), &HashSet::new(), DEFAULT_LIMIT)
            .await;

        assert_eq!(discovery.tags, vec!["french house"]);
    }
}
