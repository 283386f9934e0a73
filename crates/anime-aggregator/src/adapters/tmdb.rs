//! TMDB (The Movie Database) TV catalog, restricted to animation.

use super::coerce::{
    coerce_rating, collect_aliases, id_string, non_empty, parse_date, weekday_number,
};
use super::{check_page, HttpFetcher, SourceAdapter};
use crate::error::{Result, SourceError};
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate, Utc, Weekday};
use serde::Deserialize;
use serde_json::Value;
use shared::config::{HttpConfig, TmdbConfig};
use shared::{AnimeStatus, SourceRecord};
use tracing::{debug, info};

pub const PLATFORM: &str = "tmdb";

/// TMDB genre id for animation
const ANIMATION_GENRE: i64 = 16;

/// TMDB returns fixed pages of 20 results
const TMDB_PAGE_SIZE: u64 = 20;

/// TMDB refuses pages beyond 500
const TMDB_MAX_PAGE: u64 = 500;

/// Upstream pages fetched for a single list call at most
const MAX_PAGES_PER_CALL: u64 = 5;

/// TV genre ids as documented by TMDB
const GENRES: &[(i64, &str)] = &[
    (10759, "Action & Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (10762, "Kids"),
    (9648, "Mystery"),
    (10763, "News"),
    (10764, "Reality"),
    (10765, "Sci-Fi & Fantasy"),
    (10766, "Soap"),
    (10767, "Talk"),
    (10768, "War & Politics"),
    (37, "Western"),
];

/// TMDB API client
pub struct TmdbAdapter {
    http: HttpFetcher,
    base_url: String,
    image_base_url: String,
    language: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    total_pages: u64,
    results: Option<Vec<TvSummary>>,
}

/// Entry of discover / search / airing_today results
#[derive(Debug, Deserialize)]
struct TvSummary {
    id: Option<i64>,
    name: Option<String>,
    original_name: Option<String>,
    poster_path: Option<String>,
    overview: Option<String>,
    #[serde(default)]
    vote_average: Value,
    vote_count: Option<u64>,
    first_air_date: Option<String>,
    #[serde(default)]
    genre_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct TvDetail {
    id: Option<i64>,
    name: Option<String>,
    original_name: Option<String>,
    poster_path: Option<String>,
    overview: Option<String>,
    #[serde(default)]
    vote_average: Value,
    vote_count: Option<u64>,
    /// "Returning Series", "Ended", "Canceled", "In Production", "Planned"
    status: Option<String>,
    #[serde(default)]
    genres: Vec<Genre>,
    first_air_date: Option<String>,
    number_of_episodes: Option<u32>,
    last_episode_to_air: Option<Episode>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Episode {
    episode_number: Option<u32>,
}

impl TmdbAdapter {
    pub fn new(config: &TmdbConfig, http: &HttpConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(PLATFORM, http)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            image_base_url: config.image_base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            api_key,
        })
    }

    fn url(&self, path: &str, query: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(SourceError::MissingCredentials("TMDB API key"));
        }
        let mut url = format!(
            "{}{}?api_key={}&language={}",
            self.base_url,
            path,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&self.language)
        );
        if !query.is_empty() {
            url.push('&');
            url.push_str(query);
        }
        Ok(url)
    }

    fn translator(&self) -> Translator<'_> {
        Translator {
            image_base_url: &self.image_base_url,
            today: Utc::now().date_naive(),
        }
    }

    async fn discover_page(&self, page: u64) -> Result<Page> {
        let url = self.url(
            "/discover/tv",
            &format!(
                "with_genres={}&sort_by=popularity.desc&page={}",
                ANIMATION_GENRE, page
            ),
        )?;
        self.http.get_json(&url).await
    }
}

#[async_trait]
impl SourceAdapter for TmdbAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn fetch_list(&self, page: u32, page_size: u32) -> Result<Vec<SourceRecord>> {
        check_page(page, page_size)?;
        info!(page = page, page_size = page_size, "Fetching TMDB animation listing");

        let window = PageWindow::new(page, page_size);
        let mut summaries = Vec::new();

        for tmdb_page in window.first_page..=window.last_page {
            let response = self.discover_page(tmdb_page).await?;
            summaries.extend(response.results.unwrap_or_default());
            if tmdb_page >= response.total_pages {
                break;
            }
        }

        let translator = self.translator();
        Ok(summaries
            .into_iter()
            .skip(window.skip)
            .take(page_size as usize)
            .filter_map(|s| translator.from_summary(s))
            .collect())
    }

    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<SourceRecord>> {
        info!(keyword = keyword, limit = limit, "Searching TMDB");

        let url = self.url(
            "/search/tv",
            &format!("query={}&page=1", urlencoding::encode(keyword)),
        )?;
        let response: Page = self.http.get_json(&url).await?;

        let translator = self.translator();
        Ok(response
            .results
            .unwrap_or_default()
            .into_iter()
            .filter(is_animation)
            .filter_map(|s| translator.from_summary(s))
            .take(limit)
            .collect())
    }

    async fn fetch_detail(&self, id: &str) -> Result<Option<SourceRecord>> {
        let tv_id: u64 = id
            .trim()
            .parse()
            .map_err(|_| SourceError::InvalidArgument(format!("TMDB ids are numeric, got {:?}", id)))?;
        debug!(tv_id = tv_id, "Fetching TMDB show");

        let url = self.url(&format!("/tv/{}", tv_id), "")?;
        let detail: Option<TvDetail> = self.http.get_json_optional(&url).await?;

        Ok(detail.and_then(|d| self.translator().from_detail(d)))
    }

    async fn fetch_schedule(&self, day: Option<Weekday>) -> Result<Vec<SourceRecord>> {
        // airing_today only knows about today
        let today = Local::now().weekday();
        if day.is_some_and(|d| d != today) {
            debug!(day = ?day, today = ?today, "TMDB only reports today's airings");
            return Ok(Vec::new());
        }
        info!("Fetching TMDB airing today");

        let url = self.url("/tv/airing_today", "page=1")?;
        let response: Page = self.http.get_json(&url).await?;

        let translator = self.translator();
        Ok(response
            .results
            .unwrap_or_default()
            .into_iter()
            .filter(is_animation)
            .filter_map(|s| translator.from_summary(s))
            .map(|mut record| {
                record.update_day = Some(weekday_number(today));
                record
            })
            .collect())
    }
}

/// Which 20-item TMDB pages cover a caller's (page, page_size) window
#[derive(Debug, PartialEq, Eq)]
struct PageWindow {
    first_page: u64,
    last_page: u64,
    /// Items to drop from the start of `first_page`
    skip: usize,
}

impl PageWindow {
    fn new(page: u32, page_size: u32) -> Self {
        let start = u64::from(page - 1) * u64::from(page_size);
        let end = start + u64::from(page_size);

        let first_page = (start / TMDB_PAGE_SIZE + 1).min(TMDB_MAX_PAGE);
        let last_page = ((end - 1) / TMDB_PAGE_SIZE + 1)
            .min(first_page + MAX_PAGES_PER_CALL - 1)
            .min(TMDB_MAX_PAGE);
        let skip = (start - (first_page - 1) * TMDB_PAGE_SIZE) as usize;

        Self {
            first_page,
            last_page,
            skip,
        }
    }
}

/// Search results mix live action in; keep animation when genres are known
fn is_animation(summary: &TvSummary) -> bool {
    summary.genre_ids.is_empty() || summary.genre_ids.contains(&ANIMATION_GENRE)
}

fn genre_name(id: i64) -> Option<&'static str> {
    GENRES.iter().find(|(gid, _)| *gid == id).map(|(_, name)| *name)
}

fn status_from_tmdb(status: Option<&str>, first_air: Option<NaiveDate>, today: NaiveDate) -> AnimeStatus {
    match status {
        Some("Ended") | Some("Canceled") => AnimeStatus::Completed,
        Some("Planned") | Some("In Production") => AnimeStatus::Upcoming,
        _ if first_air.map_or(false, |date| date > today) => AnimeStatus::Upcoming,
        _ => AnimeStatus::Ongoing,
    }
}

/// A vote average of 0 with no votes means "unrated"
fn rating(vote_average: &Value, vote_count: Option<u64>) -> Option<f64> {
    if vote_count == Some(0) {
        return None;
    }
    coerce_rating(vote_average)
}

struct Translator<'a> {
    image_base_url: &'a str,
    today: NaiveDate,
}

impl Translator<'_> {
    fn cover(&self, poster_path: Option<String>) -> String {
        non_empty(poster_path)
            .map(|path| format!("{}{}", self.image_base_url, path))
            .unwrap_or_default()
    }

    fn from_summary(&self, summary: TvSummary) -> Option<SourceRecord> {
        let Some(id) = id_string(summary.id) else {
            debug!(name = ?summary.name, "Skipping TMDB result without id");
            return None;
        };

        let title = non_empty(summary.name)
            .or_else(|| non_empty(summary.original_name.clone()))
            .unwrap_or_default();
        let first_air = summary.first_air_date.as_deref().and_then(parse_date);

        let mut record = SourceRecord::new(PLATFORM, id.clone(), title, play_url(&id));
        record.title_aliases = collect_aliases(&record.title, [summary.original_name]);
        record.cover_url = self.cover(summary.poster_path);
        record.synopsis = non_empty(summary.overview);
        record.rating = rating(&summary.vote_average, summary.vote_count);
        record.genres = summary
            .genre_ids
            .iter()
            .filter_map(|id| genre_name(*id))
            .map(str::to_string)
            .collect();
        record.release_year = first_air.map(|d| d.year());
        record.status = status_from_tmdb(None, first_air, self.today);

        Some(record)
    }

    fn from_detail(&self, detail: TvDetail) -> Option<SourceRecord> {
        let Some(id) = id_string(detail.id) else {
            debug!(name = ?detail.name, "Skipping TMDB show without id");
            return None;
        };

        let title = non_empty(detail.name)
            .or_else(|| non_empty(detail.original_name.clone()))
            .unwrap_or_default();
        let first_air = detail.first_air_date.as_deref().and_then(parse_date);

        let mut record = SourceRecord::new(PLATFORM, id.clone(), title, play_url(&id));
        record.title_aliases = collect_aliases(&record.title, [detail.original_name]);
        record.cover_url = self.cover(detail.poster_path);
        record.synopsis = non_empty(detail.overview);
        record.rating = rating(&detail.vote_average, detail.vote_count);
        record.genres = detail.genres.into_iter().filter_map(|g| non_empty(g.name)).collect();
        record.release_year = first_air.map(|d| d.year());
        record.status = status_from_tmdb(detail.status.as_deref(), first_air, self.today);
        record.episode_count = detail.number_of_episodes.filter(|n| *n > 0);
        record.latest_episode = detail.last_episode_to_air.and_then(|e| e.episode_number);

        Some(record)
    }
}

fn play_url(id: &str) -> String {
    format!("https://www.themoviedb.org/tv/{}", id)
}
