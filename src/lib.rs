//! Constellation API — session-scoped music recommendation graphs.
//!
//! Identifies a track from raw audio, then grows a constellation of related
//! tracks around it using a tiered fallback search over the Last.fm catalog.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
