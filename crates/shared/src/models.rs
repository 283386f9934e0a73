//! Data models for the aggregation engine.
//!
//! `SourceRecord` is what a single catalog adapter produces for one title,
//! `MergedRecord` is the cross-platform record the merger builds out of them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Airing status, collapsed from every platform's native flags
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AnimeStatus {
    #[default]
    Ongoing,
    Completed,
    Upcoming,
}

impl std::fmt::Display for AnimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnimeStatus::Ongoing => write!(f, "ongoing"),
            AnimeStatus::Completed => write!(f, "completed"),
            AnimeStatus::Upcoming => write!(f, "upcoming"),
        }
    }
}

impl std::str::FromStr for AnimeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ongoing" => Ok(AnimeStatus::Ongoing),
            "completed" => Ok(AnimeStatus::Completed),
            "upcoming" => Ok(AnimeStatus::Upcoming),
            _ => Err(anyhow::anyhow!("Invalid anime status: {}", s)),
        }
    }
}

/// Canonical single-platform anime record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    pub id: String,                 // Platform-local ID
    pub source_platform: String,    // Platform tag, e.g. "bilibili"

    // Titles
    pub title: String,
    #[serde(default)]
    pub title_aliases: Vec<String>,

    #[serde(default)]
    pub cover_url: String,
    pub synopsis: Option<String>,
    pub rating: Option<f64>,        // 0.0 to 10.0
    pub play_count: Option<u64>,
    pub status: AnimeStatus,
    #[serde(default)]
    pub genres: Vec<String>,
    pub release_year: Option<i32>,
    pub episode_count: Option<u32>,
    pub latest_episode: Option<u32>,

    // Broadcast slot
    pub update_day: Option<u8>,     // 1 = Monday .. 7 = Sunday
    pub update_time: Option<String>,

    pub play_url: String,
}

impl SourceRecord {
    /// Start a record with the fields every adapter must fill in
    pub fn new(
        platform: impl Into<String>,
        id: impl Into<String>,
        title: impl Into<String>,
        play_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_platform: platform.into(),
            title: title.into(),
            play_url: play_url.into(),
            ..Default::default()
        }
    }
}

/// Cross-platform record, deduplicated by title similarity
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MergedRecord {
    /// Fields of the first contributing record, gaps filled by later ones
    #[serde(flatten)]
    pub record: SourceRecord,

    /// Platform tag -> that platform's play URL
    pub platform_links: BTreeMap<String, String>,
}

impl MergedRecord {
    /// Seed a merged record from its first contributor
    pub fn from_source(record: SourceRecord) -> Self {
        let mut platform_links = BTreeMap::new();
        platform_links.insert(record.source_platform.clone(), record.play_url.clone());
        Self {
            record,
            platform_links,
        }
    }

    /// Platforms that contributed to this record
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.platform_links.keys().map(String::as_str)
    }
}

impl std::ops::Deref for MergedRecord {
    type Target = SourceRecord;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}
