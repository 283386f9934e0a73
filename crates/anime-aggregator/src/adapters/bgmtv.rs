//! Bangumi (bgm.tv) catalog.

use super::coerce::{
    coerce_rating, collect_aliases, id_string, non_empty, parse_date, weekday_from_number,
    weekday_number,
};
use super::{check_page, HttpFetcher, SourceAdapter};
use crate::error::{Result, SourceError};
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::config::{BgmtvConfig, HttpConfig};
use shared::{AnimeStatus, SourceRecord};
use tracing::{debug, info};

pub const PLATFORM: &str = "bgmtv";

/// Subject type for anime
const SUBJECT_TYPE_ANIME: u8 = 2;

/// Largest `limit` the v0 API accepts
const MAX_LIMIT: u32 = 50;

/// Tags kept as genres; bangumi tag lists run long
const MAX_GENRES: usize = 8;

/// bgm.tv API client
pub struct BgmtvAdapter {
    http: HttpFetcher,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct Paged {
    data: Option<Vec<Subject>>,
}

/// Subject as returned by /v0/subjects, /v0/search/subjects and /calendar
#[derive(Debug, Deserialize)]
struct Subject {
    id: Option<i64>,
    name: Option<String>,
    name_cn: Option<String>,
    summary: Option<String>,
    /// "YYYY-MM-DD"; the calendar calls it `air_date`
    #[serde(alias = "air_date")]
    date: Option<String>,
    images: Option<Images>,
    /// Search results carry a single image URL instead of `images`
    image: Option<String>,
    #[serde(default)]
    rating: Value,
    #[serde(default)]
    tags: Vec<Tag>,
    eps: Option<i64>,
    total_episodes: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Images {
    large: Option<String>,
    common: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarDay {
    weekday: CalendarWeekday,
    #[serde(default)]
    items: Vec<Subject>,
}

#[derive(Debug, Deserialize)]
struct CalendarWeekday {
    /// 1 = Monday .. 7 = Sunday
    id: u8,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    keyword: &'a str,
    filter: SearchFilter,
}

#[derive(Debug, Serialize)]
struct SearchFilter {
    #[serde(rename = "type")]
    subject_type: Vec<u8>,
}

impl BgmtvAdapter {
    pub fn new(config: &BgmtvConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(PLATFORM, http)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SourceAdapter for BgmtvAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn fetch_list(&self, page: u32, page_size: u32) -> Result<Vec<SourceRecord>> {
        check_page(page, page_size)?;
        info!(page = page, page_size = page_size, "Fetching bgm.tv subjects");

        let limit = page_size.min(MAX_LIMIT);
        let offset = u64::from(page - 1) * u64::from(page_size);
        let url = self.url(&format!(
            "/v0/subjects?type={}&sort=rank&limit={}&offset={}",
            SUBJECT_TYPE_ANIME, limit, offset
        ));
        let paged: Paged = self.http.get_json(&url).await?;

        let today = Utc::now().date_naive();
        Ok(paged
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| from_subject(s, today))
            .collect())
    }

    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<SourceRecord>> {
        info!(keyword = keyword, limit = limit, "Searching bgm.tv");

        let limit = search_limit(limit);
        let url = self.url(&format!("/v0/search/subjects?limit={}&offset=0", limit));
        let request = SearchRequest {
            keyword,
            filter: SearchFilter {
                subject_type: vec![SUBJECT_TYPE_ANIME],
            },
        };
        let paged: Paged = self.http.post_json(&url, &request).await?;

        let today = Utc::now().date_naive();
        Ok(paged
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| from_subject(s, today))
            .take(limit as usize)
            .collect())
    }

    async fn fetch_detail(&self, id: &str) -> Result<Option<SourceRecord>> {
        let subject_id: u64 = id.trim().parse().map_err(|_| {
            SourceError::InvalidArgument(format!("bgm.tv ids are numeric, got {:?}", id))
        })?;
        debug!(subject_id = subject_id, "Fetching bgm.tv subject");

        let url = self.url(&format!("/v0/subjects/{}", subject_id));
        let subject: Option<Subject> = self.http.get_json_optional(&url).await?;

        Ok(subject.and_then(|s| from_subject(s, Utc::now().date_naive())))
    }

    async fn fetch_schedule(&self, day: Option<Weekday>) -> Result<Vec<SourceRecord>> {
        info!(day = ?day, "Fetching bgm.tv calendar");

        let url = self.url("/calendar");
        let calendar: Vec<CalendarDay> = self.http.get_json(&url).await?;

        Ok(from_calendar(
            calendar,
            day.map(weekday_number),
            Utc::now().date_naive(),
        ))
    }
}

/// Infer airing status from the first air date and the episode count,
/// assuming one episode a week
fn status_from_air_date(air_date: Option<NaiveDate>, episodes: Option<u32>, today: NaiveDate) -> AnimeStatus {
    let Some(air_date) = air_date else {
        return AnimeStatus::Ongoing;
    };
    if air_date > today {
        return AnimeStatus::Upcoming;
    }
    match episodes {
        Some(episodes) if episodes > 0 => {
            // absurd episode counts push the finale past chrono's range
            match air_date.checked_add_signed(Duration::weeks(i64::from(episodes))) {
                Some(finale) if finale < today => AnimeStatus::Completed,
                _ => AnimeStatus::Ongoing,
            }
        }
        _ => AnimeStatus::Ongoing,
    }
}

/// Caller limit as an API `limit`, within 1..=MAX_LIMIT
fn search_limit(limit: usize) -> u32 {
    u32::try_from(limit).unwrap_or(MAX_LIMIT).clamp(1, MAX_LIMIT)
}

fn play_url(id: &str) -> String {
    format!("https://bgm.tv/subject/{}", id)
}

/// The calendar still serves plain-http image links
fn secure(url: String) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url,
    }
}

fn cover(images: Option<Images>, image: Option<String>) -> String {
    images
        .and_then(|i| non_empty(i.large).or_else(|| non_empty(i.common)))
        .or_else(|| non_empty(image))
        .map(secure)
        .unwrap_or_default()
}

fn episode_count(subject: &Subject) -> Option<u32> {
    subject
        .total_episodes
        .filter(|n| *n > 0)
        .or(subject.eps.filter(|n| *n > 0))
        .and_then(|n| u32::try_from(n).ok())
}

fn from_subject(subject: Subject, today: NaiveDate) -> Option<SourceRecord> {
    let Some(id) = id_string(subject.id) else {
        debug!(name = ?subject.name, "Skipping bgm.tv subject without id");
        return None;
    };

    let episodes = episode_count(&subject);
    let air_date = subject.date.as_deref().and_then(parse_date);
    let title = non_empty(subject.name_cn)
        .or_else(|| non_empty(subject.name.clone()))
        .unwrap_or_default();

    let mut record = SourceRecord::new(PLATFORM, id.clone(), title, play_url(&id));
    record.title_aliases = collect_aliases(&record.title, [subject.name]);
    record.cover_url = cover(subject.images, subject.image);
    record.synopsis = non_empty(subject.summary);
    record.rating = coerce_rating(&subject.rating).filter(|r| *r > 0.0);
    record.genres = subject
        .tags
        .into_iter()
        .filter_map(|t| non_empty(t.name))
        .take(MAX_GENRES)
        .collect();
    record.release_year = air_date.map(|d| d.year());
    record.episode_count = episodes;
    record.status = status_from_air_date(air_date, episodes, today);

    Some(record)
}

/// Calendar entries are airing by definition; only not-yet-started ones differ
fn from_calendar(calendar: Vec<CalendarDay>, only_day: Option<u8>, today: NaiveDate) -> Vec<SourceRecord> {
    calendar
        .into_iter()
        .filter(|day| weekday_from_number(day.weekday.id).is_some())
        .filter(|day| only_day.map_or(true, |d| d == day.weekday.id))
        .flat_map(|day| {
            let weekday = day.weekday.id;
            day.items.into_iter().filter_map(move |item| {
                let mut record = from_subject(item, today)?;
                if record.status == AnimeStatus::Completed {
                    record.status = AnimeStatus::Ongoing;
                }
                record.update_day = Some(weekday);
                Some(record)
            })
        })
        .collect()
}
