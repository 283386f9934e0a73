//! Cross-platform deduplication by title similarity.
//!
//! Records are clustered in a single left-to-right pass: an exact match on
//! the normalized title wins, otherwise the first cluster whose
//! representative title is similar enough absorbs the record. Input order is
//! therefore the tie-break when several clusters qualify.

use shared::{MergedRecord, SourceRecord};
use std::collections::HashMap;
use tracing::debug;

/// Default minimum similarity for two titles to be considered the same show
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Platform whose cover art replaces whatever a cluster already has
const PREFERRED_COVER_PLATFORM: &str = "bilibili";

/// Lowercase and keep only CJK ideographs, ASCII letters and digits
pub fn normalize(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || is_cjk_ideograph(*c))
        .collect()
}

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Classic edit distance with unit costs, counted in chars
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // matrix[i][j] = distance between b[..i] and a[..j]
    let mut matrix = vec![vec![0usize; a.len() + 1]; b.len() + 1];
    for (j, cell) in matrix[0].iter_mut().enumerate() {
        *cell = j;
    }
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }

    for i in 1..=b.len() {
        for j in 1..=a.len() {
            let substitution = if b[i - 1] == a[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j - 1] + substitution)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j] + 1);
        }
    }

    matrix[b.len()][a.len()]
}

/// Title similarity in [0, 1], computed on normalized titles
pub fn similarity(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);

    match (na.is_empty(), nb.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let longest = na.chars().count().max(nb.chars().count());
    1.0 - levenshtein(&na, &nb) as f64 / longest as f64
}

/// Folds per-platform records into cross-platform ones
#[derive(Debug, Clone)]
pub struct SimilarityMerger {
    threshold: f64,
}

impl Default for SimilarityMerger {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl SimilarityMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different clustering threshold, clamped to [0, 1]
    pub fn with_threshold(threshold: f64) -> Self {
        let threshold = if threshold.is_nan() {
            DEFAULT_SIMILARITY_THRESHOLD
        } else {
            threshold.clamp(0.0, 1.0)
        };
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Deduplicate and fuse records; output order is first-seen order
    pub fn merge(&self, records: Vec<SourceRecord>) -> Vec<MergedRecord> {
        let total = records.len();
        let mut clusters: Vec<MergedRecord> = Vec::new();
        let mut by_title: HashMap<String, usize> = HashMap::new();

        for record in records {
            let key = normalize(&record.title);

            let target = by_title.get(&key).copied().or_else(|| {
                clusters
                    .iter()
                    .position(|c| similarity(&record.title, &c.record.title) >= self.threshold)
            });

            match target {
                Some(idx) => {
                    debug!(
                        title = %record.title,
                        platform = %record.source_platform,
                        into = %clusters[idx].record.title,
                        "Folding record into cluster"
                    );
                    fold(&mut clusters[idx], record);
                    by_title.entry(key).or_insert(idx);
                }
                None => {
                    by_title.insert(key, clusters.len());
                    clusters.push(MergedRecord::from_source(record));
                }
            }
        }

        debug!(input = total, output = clusters.len(), "Merged records");
        clusters
    }
}

/// Fold `incoming` into `cluster`, filling only what the cluster lacks
fn fold(cluster: &mut MergedRecord, incoming: SourceRecord) {
    cluster
        .platform_links
        .insert(incoming.source_platform.clone(), incoming.play_url.clone());

    let target = &mut cluster.record;

    if !incoming.cover_url.is_empty()
        && (target.cover_url.is_empty() || incoming.source_platform == PREFERRED_COVER_PLATFORM)
    {
        target.cover_url = incoming.cover_url;
    }

    fill_text(&mut target.synopsis, incoming.synopsis);
    fill_text(&mut target.update_time, incoming.update_time);
    fill(&mut target.rating, incoming.rating);
    fill(&mut target.play_count, incoming.play_count);
    fill(&mut target.release_year, incoming.release_year);
    fill(&mut target.episode_count, incoming.episode_count);
    fill(&mut target.latest_episode, incoming.latest_episode);
    fill(&mut target.update_day, incoming.update_day);

    union_into(&mut target.title_aliases, incoming.title_aliases);
    union_into(&mut target.genres, incoming.genres);
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

fn fill_text(slot: &mut Option<String>, value: Option<String>) {
    let empty = slot.as_deref().map_or(true, str::is_empty);
    if empty && value.as_deref().is_some_and(|v| !v.is_empty()) {
        *slot = value;
    }
}

fn union_into(existing: &mut Vec<String>, incoming: Vec<String>) {
    for item in incoming {
        if !existing.contains(&item) {
            existing.push(item);
        }
    }
}
