//! Bilibili bangumi catalog.
//!
//! Endpoints are the public PGC ones used by the web player: the season
//! index for listings, media search, season view for details and the weekly
//! timeline for the schedule. Every response is wrapped in a
//! `{code, message, data|result}` envelope.

use super::coerce::{
    coerce_rating, collect_aliases, id_string, non_empty, parse_latest_episode,
    parse_play_count, parse_year, strip_markup, weekday_number,
};
use super::{check_page, HttpFetcher, SourceAdapter};
use crate::error::{Result, SourceError};
use async_trait::async_trait;
use chrono::{Datelike, TimeZone, Utc, Weekday};
use serde::Deserialize;
use serde_json::Value;
use shared::config::{BilibiliConfig, HttpConfig};
use shared::{AnimeStatus, SourceRecord};
use tracing::{debug, info};

pub const PLATFORM: &str = "bilibili";

/// Envelope code bilibili uses for "no such season"
const CODE_NOT_FOUND: i64 = -404;

/// Bilibili API client
pub struct BilibiliAdapter {
    http: HttpFetcher,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
    result: Option<T>,
}

impl<T> Envelope<T> {
    /// Payload of a successful response; `Ok(None)` for "not found"
    fn into_payload(self) -> Result<Option<T>> {
        match self.code {
            0 => Ok(self.data.or(self.result)),
            CODE_NOT_FOUND => Ok(None),
            code => Err(SourceError::Api {
                status_code: code,
                message: self.message,
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct IndexPage {
    list: Option<Vec<IndexItem>>,
}

/// Season index entry (listing)
#[derive(Debug, Deserialize)]
struct IndexItem {
    season_id: Option<i64>,
    title: Option<String>,
    #[serde(default)]
    cover: String,
    index_show: Option<String>,
    is_finish: Option<i64>,
    link: Option<String>,
    /// Play count label, e.g. "1234.5万次播放"
    order: Option<String>,
    #[serde(default)]
    score: Value,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPage {
    result: Option<Vec<SearchItem>>,
}

/// Media search hit; titles carry `<em>` highlight markup
#[derive(Debug, Deserialize)]
struct SearchItem {
    season_id: Option<i64>,
    title: Option<String>,
    org_title: Option<String>,
    #[serde(default)]
    cover: String,
    #[serde(default)]
    media_score: Value,
    index_show: Option<String>,
    desc: Option<String>,
    /// Slash-separated genres, e.g. "奇幻/冒险"
    styles: Option<String>,
    url: Option<String>,
    /// Unix seconds
    pubtime: Option<i64>,
    ep_size: Option<u32>,
}

/// Season view (detail)
#[derive(Debug, Deserialize)]
struct SeasonDetail {
    season_id: Option<i64>,
    title: Option<String>,
    jp_title: Option<String>,
    alias: Option<String>,
    #[serde(default)]
    cover: String,
    evaluate: Option<String>,
    #[serde(default)]
    rating: Value,
    stat: Option<SeasonStat>,
    new_ep: Option<NewEpisode>,
    publish: Option<Publish>,
    #[serde(default)]
    styles: Vec<String>,
    link: Option<String>,
    total: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SeasonStat {
    views: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct NewEpisode {
    /// e.g. "已完结, 全25话" or "连载中, 更新至第5话"
    desc: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Publish {
    is_finish: Option<i64>,
    is_started: Option<i64>,
    pub_time: Option<String>,
}

/// One day of the weekly timeline
#[derive(Debug, Deserialize)]
struct TimelineDay {
    day_of_week: Option<u8>,
    #[serde(default)]
    episodes: Vec<TimelineEpisode>,
}

#[derive(Debug, Deserialize)]
struct TimelineEpisode {
    season_id: Option<i64>,
    title: Option<String>,
    #[serde(default)]
    cover: String,
    /// "HH:MM"
    pub_time: Option<String>,
    /// e.g. "第5话"
    pub_index: Option<String>,
    published: Option<i64>,
}

impl BilibiliAdapter {
    pub fn new(config: &BilibiliConfig, http: &HttpConfig) -> Result<Self> {
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
impl SourceAdapter for BilibiliAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn fetch_list(&self, page: u32, page_size: u32) -> Result<Vec<SourceRecord>> {
        check_page(page, page_size)?;
        info!(page = page, page_size = page_size, "Fetching bilibili season index");

        let url = self.url(&format!(
            "/pgc/season/index/result?season_type=1&type=1&order=3&st=1&sort=0&page={}&pagesize={}",
            page, page_size
        ));
        let envelope: Envelope<IndexPage> = self.http.get_json(&url).await?;
        let page = envelope.into_payload()?.unwrap_or_default();

        Ok(page
            .list
            .unwrap_or_default()
            .into_iter()
            .filter_map(from_index_item)
            .collect())
    }

    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<SourceRecord>> {
        info!(keyword = keyword, limit = limit, "Searching bilibili");

        let url = self.url(&format!(
            "/x/web-interface/search/type?search_type=media_bangumi&page=1&keyword={}",
            urlencoding::encode(keyword)
        ));
        let envelope: Envelope<SearchPage> = self.http.get_json(&url).await?;
        let page = envelope.into_payload()?.unwrap_or_default();

        Ok(page
            .result
            .unwrap_or_default()
            .into_iter()
            .filter_map(from_search_item)
            .take(limit)
            .collect())
    }

    async fn fetch_detail(&self, id: &str) -> Result<Option<SourceRecord>> {
        debug!(season_id = id, "Fetching bilibili season");

        let url = self.url(&format!(
            "/pgc/view/web/season?season_id={}",
            urlencoding::encode(id)
        ));
        let envelope: Option<Envelope<SeasonDetail>> = self.http.get_json_optional(&url).await?;

        Ok(match envelope {
            Some(envelope) => envelope.into_payload()?.and_then(from_season_detail),
            None => None,
        })
    }

    async fn fetch_schedule(&self, day: Option<Weekday>) -> Result<Vec<SourceRecord>> {
        info!(day = ?day, "Fetching bilibili timeline");

        let url = self.url("/pgc/web/timeline?types=1&before=6&after=6");
        let envelope: Envelope<Vec<TimelineDay>> = self.http.get_json(&url).await?;
        let days = envelope.into_payload()?.unwrap_or_default();

        Ok(from_timeline(days, day.map(weekday_number)))
    }
}

fn status_from_flags(is_finish: Option<i64>, is_started: Option<i64>) -> AnimeStatus {
    if is_finish == Some(1) {
        AnimeStatus::Completed
    } else if is_started == Some(0) {
        AnimeStatus::Upcoming
    } else {
        AnimeStatus::Ongoing
    }
}

/// Search hits carry no flags; infer from the progress label
fn status_from_label(label: &str) -> AnimeStatus {
    if label.contains('全') || label.contains("完结") {
        AnimeStatus::Completed
    } else if label.contains("即将") || label.contains("未开播") {
        AnimeStatus::Upcoming
    } else {
        AnimeStatus::Ongoing
    }
}

fn play_url(link: Option<String>, season_id: &str) -> String {
    non_empty(link).unwrap_or_else(|| format!("https://www.bilibili.com/bangumi/play/ss{}", season_id))
}

fn split_list(text: &str, separators: &[char]) -> Vec<String> {
    text.split(separators)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn from_index_item(item: IndexItem) -> Option<SourceRecord> {
    let Some(id) = id_string(item.season_id) else {
        debug!(title = ?item.title, "Skipping bilibili index item without season_id");
        return None;
    };

    let title = item.title.unwrap_or_default();
    let mut record = SourceRecord::new(PLATFORM, id.clone(), title, play_url(item.link, &id));
    record.cover_url = item.cover;
    record.rating = coerce_rating(&item.score);
    record.play_count = item.order.as_deref().and_then(parse_play_count);
    record.status = status_from_flags(item.is_finish, None);

    if let Some(label) = item.index_show.as_deref() {
        let episodes = parse_latest_episode(label);
        record.latest_episode = episodes;
        if record.status == AnimeStatus::Completed {
            record.episode_count = episodes;
        }
    }

    Some(record)
}

fn from_search_item(item: SearchItem) -> Option<SourceRecord> {
    let Some(id) = id_string(item.season_id) else {
        debug!(title = ?item.title, "Skipping bilibili search hit without season_id");
        return None;
    };

    let title = item.title.as_deref().map(strip_markup).unwrap_or_default();
    let org_title = item.org_title.as_deref().map(strip_markup);

    let mut record = SourceRecord::new(PLATFORM, id.clone(), title, play_url(item.url, &id));
    record.title_aliases = collect_aliases(&record.title, [org_title]);
    record.cover_url = item.cover;
    record.synopsis = non_empty(item.desc);
    record.rating = coerce_rating(&item.media_score);
    record.genres = item
        .styles
        .as_deref()
        .map(|s| split_list(s, &['/', ',']))
        .unwrap_or_default();
    record.release_year = item
        .pubtime
        .filter(|ts| *ts > 0)
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .map(|dt| dt.year());
    record.episode_count = item.ep_size.filter(|n| *n > 0);

    if let Some(label) = item.index_show.as_deref() {
        record.status = status_from_label(label);
        record.latest_episode = parse_latest_episode(label);
    }

    Some(record)
}

fn from_season_detail(detail: SeasonDetail) -> Option<SourceRecord> {
    let Some(id) = id_string(detail.season_id) else {
        debug!(title = ?detail.title, "Skipping bilibili season without season_id");
        return None;
    };

    let title = detail.title.unwrap_or_default();
    let alias_list = detail
        .alias
        .as_deref()
        .map(|a| split_list(a, &['/', ',', '，']))
        .unwrap_or_default();

    let mut record = SourceRecord::new(PLATFORM, id.clone(), title, play_url(detail.link, &id));
    record.title_aliases = collect_aliases(
        &record.title,
        std::iter::once(detail.jp_title).chain(alias_list.into_iter().map(Some)),
    );
    record.cover_url = detail.cover;
    record.synopsis = non_empty(detail.evaluate);
    record.rating = coerce_rating(&detail.rating);
    record.play_count = detail.stat.and_then(|s| s.views);
    record.genres = detail.styles;

    if let Some(publish) = detail.publish {
        record.status = status_from_flags(publish.is_finish, publish.is_started);
        record.release_year = publish.pub_time.as_deref().and_then(parse_year);
    }

    if let Some(new_ep) = detail.new_ep {
        record.latest_episode = new_ep
            .desc
            .as_deref()
            .and_then(|desc| desc.rsplit(',').next())
            .and_then(parse_latest_episode)
            .or_else(|| new_ep.title.as_deref().and_then(parse_latest_episode));
    }

    record.episode_count = detail
        .total
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
        .or(match record.status {
            AnimeStatus::Completed => record.latest_episode,
            _ => None,
        });

    Some(record)
}

/// Flatten the timeline, optionally keeping a single weekday
fn from_timeline(days: Vec<TimelineDay>, only_day: Option<u8>) -> Vec<SourceRecord> {
    let mut records = Vec::new();

    for day in days {
        let Some(day_of_week) = day.day_of_week.filter(|d| (1..=7).contains(d)) else {
            continue;
        };
        if only_day.is_some_and(|d| d != day_of_week) {
            continue;
        }

        for episode in day.episodes {
            let Some(id) = id_string(episode.season_id) else {
                continue;
            };
            // The timeline spans 13 days; keep each season once
            if records.iter().any(|r: &SourceRecord| r.id == id) {
                continue;
            }

            let title = episode.title.unwrap_or_default();
            let mut record = SourceRecord::new(PLATFORM, id.clone(), title, play_url(None, &id));
            record.cover_url = episode.cover;
            record.update_day = Some(day_of_week);
            record.update_time = non_empty(episode.pub_time);
            record.latest_episode = episode.pub_index.as_deref().and_then(parse_latest_episode);
            record.status = if episode.published == Some(0) && record.latest_episode == Some(1) {
                AnimeStatus::Upcoming
            } else {
                AnimeStatus::Ongoing
            };
            records.push(record);
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_item_translation() {
        let payload: Envelope<IndexPage> = serde_json::from_value(json!({
            "code": 0,
            "data": {
                "list": [
                    {
                        "season_id": 28220978,
                        "title": "葬送的芙莉莲",
                        "cover": "https://i0.hdslb.com/bfs/bangumi/frieren.jpg",
                        "index_show": "全28话",
                        "is_finish": 1,
                        "link": "https://www.bilibili.com/bangumi/play/ss28220978",
                        "order": "1234.5万次播放",
                        "score": "9.8"
                    },
                    { "title": "no id", "score": "9.0" }
                ]
            }
        }))
        .unwrap();

        let list = payload.into_payload().unwrap().unwrap().list.unwrap();
        let records: Vec<_> = list.into_iter().filter_map(from_index_item).collect();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.id, "28220978");
        assert_eq!(r.source_platform, "bilibili");
        assert_eq!(r.rating, Some(9.8));
        assert_eq!(r.play_count, Some(12_345_000));
        assert_eq!(r.status, AnimeStatus::Completed);
        assert_eq!(r.latest_episode, Some(28));
        assert_eq!(r.episode_count, Some(28));
    }

    #[test]
    fn test_envelope_codes() {
        let not_found: Envelope<SeasonDetail> =
            serde_json::from_value(json!({"code": -404, "message": "啥都木有"})).unwrap();
        assert!(not_found.into_payload().unwrap().is_none());

        let banned: Envelope<IndexPage> =
            serde_json::from_value(json!({"code": -412, "message": "请求被拦截"})).unwrap();
        assert!(matches!(
            banned.into_payload(),
            Err(SourceError::Api { status_code: -412, .. })
        ));
    }

    #[test]
    fn test_search_item_strips_markup() {
        let item: SearchItem = serde_json::from_value(json!({
            "season_id": 1,
            "title": "<em class=\"keyword\">进击</em>的巨人",
            "org_title": "進撃の巨人",
            "cover": "https://i0.hdslb.com/aot.jpg",
            "media_score": {"score": 9.7, "user_count": 100000},
            "index_show": "全25话",
            "desc": "  ",
            "styles": "奇幻/战斗",
            "url": "https://www.bilibili.com/bangumi/play/ss1",
            "pubtime": 1365264000,
            "ep_size": 25
        }))
        .unwrap();

        let r = from_search_item(item).unwrap();
        assert_eq!(r.title, "进击的巨人");
        assert_eq!(r.title_aliases, vec!["進撃の巨人"]);
        assert_eq!(r.synopsis, None);
        assert_eq!(r.rating, Some(9.7));
        assert_eq!(r.genres, vec!["奇幻", "战斗"]);
        assert_eq!(r.release_year, Some(2013));
        assert_eq!(r.status, AnimeStatus::Completed);
        assert_eq!(r.episode_count, Some(25));
    }

    #[test]
    fn test_season_detail_tolerates_missing_fields() {
        let detail: SeasonDetail = serde_json::from_value(json!({
            "season_id": 42,
            "title": "间谍过家家"
        }))
        .unwrap();

        let r = from_season_detail(detail).unwrap();
        assert_eq!(r.play_url, "https://www.bilibili.com/bangumi/play/ss42");
        assert_eq!(r.status, AnimeStatus::Ongoing);
        assert!(r.title_aliases.is_empty());
        assert_eq!(r.rating, None);
    }

    #[test]
    fn test_season_detail_full() {
        let detail: SeasonDetail = serde_json::from_value(json!({
            "season_id": 42,
            "title": "间谍过家家",
            "jp_title": "SPY×FAMILY",
            "alias": "间谍家家酒/SPY×FAMILY,",
            "cover": "https://i0.hdslb.com/spy.jpg",
            "evaluate": "为了维护和平……",
            "rating": {"score": 9.6, "count": 50000},
            "stat": {"views": 500000000u64},
            "new_ep": {"desc": "连载中, 更新至第5话", "title": "5"},
            "publish": {"is_finish": 0, "is_started": 1, "pub_time": "2022-04-09 23:00:00"},
            "styles": ["日常", "搞笑"],
            "total": -1
        }))
        .unwrap();

        let r = from_season_detail(detail).unwrap();
        assert_eq!(r.title_aliases, vec!["SPY×FAMILY", "间谍家家酒"]);
        assert_eq!(r.rating, Some(9.6));
        assert_eq!(r.play_count, Some(500_000_000));
        assert_eq!(r.status, AnimeStatus::Ongoing);
        assert_eq!(r.release_year, Some(2022));
        assert_eq!(r.latest_episode, Some(5));
        assert_eq!(r.episode_count, None);
    }

    #[test]
    fn test_status_flags() {
        assert_eq!(status_from_flags(Some(1), Some(1)), AnimeStatus::Completed);
        assert_eq!(status_from_flags(Some(0), Some(0)), AnimeStatus::Upcoming);
        assert_eq!(status_from_flags(Some(0), Some(1)), AnimeStatus::Ongoing);
        assert_eq!(status_from_flags(None, None), AnimeStatus::Ongoing);
    }

    #[test]
    fn test_timeline_filters_day_and_dedupes() {
        let days: Vec<TimelineDay> = serde_json::from_value(json!([
            {
                "day_of_week": 6,
                "episodes": [
                    {"season_id": 1, "title": "A", "pub_time": "23:00", "pub_index": "第5话", "published": 1},
                    {"season_id": 2, "title": "B", "pub_time": "", "pub_index": "第1话", "published": 0}
                ]
            },
            {
                "day_of_week": 7,
                "episodes": [{"season_id": 3, "title": "C", "pub_index": "第9话"}]
            },
            {
                "day_of_week": 6,
                "episodes": [{"season_id": 1, "title": "A", "pub_index": "第6话"}]
            }
        ]))
        .unwrap();

        let saturday = from_timeline(days, Some(6));
        assert_eq!(saturday.len(), 2);
        assert_eq!(saturday[0].update_day, Some(6));
        assert_eq!(saturday[0].update_time.as_deref(), Some("23:00"));
        assert_eq!(saturday[0].latest_episode, Some(5));
        assert_eq!(saturday[1].update_time, None);
        assert_eq!(saturday[1].status, AnimeStatus::Upcoming);
    }

    #[test]
    fn test_timeline_whole_week() {
        let days: Vec<TimelineDay> = serde_json::from_value(json!([
            {"day_of_week": 1, "episodes": [{"season_id": 1, "title": "A"}]},
            {"day_of_week": 9, "episodes": [{"season_id": 2, "title": "B"}]},
            {"episodes": [{"season_id": 3, "title": "C"}]}
        ]))
        .unwrap();

        let week = from_timeline(days, None);
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].update_day, Some(1));
    }
}
