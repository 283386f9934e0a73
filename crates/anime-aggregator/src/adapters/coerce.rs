//! Value coercion shared by the adapters.
//!
//! Catalog APIs disagree on how they spell the same thing: ratings arrive as
//! numbers, numeric strings or `{ "score": .. }` objects, episode progress is
//! buried in labels like "更新至第12话", and alias lists contain blanks.

use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("valid regex"));
static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static PLAY_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*(亿|万)?").expect("valid regex"));

/// Rating on the 0–10 scale from a number, numeric string or `{score}` object
pub fn coerce_rating(value: &Value) -> Option<f64> {
    let rating = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(map) => map.get("score").and_then(coerce_rating),
        _ => None,
    }?;

    (rating.is_finite() && (0.0..=10.0).contains(&rating)).then_some(rating)
}

/// First run of ASCII digits in a free-text episode label
pub fn parse_latest_episode(label: &str) -> Option<u32> {
    DIGIT_RUN
        .find(label)
        .and_then(|m| m.as_str().parse().ok())
}

/// Play count from labels like "1234.5万次播放" or "3.2亿播放"
pub fn parse_play_count(label: &str) -> Option<u64> {
    let caps = PLAY_COUNT.captures(label)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some("亿") => 100_000_000.0,
        Some("万") => 10_000.0,
        _ => 1.0,
    };
    Some((number * multiplier).round() as u64)
}

/// Deduplicated aliases, skipping blanks and the main title itself
pub fn collect_aliases<I, S>(title: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut aliases: Vec<String> = Vec::new();
    for candidate in candidates.into_iter().flatten() {
        let alias = candidate.as_ref().trim();
        if alias.is_empty() || alias == title || aliases.iter().any(|a| a == alias) {
            continue;
        }
        aliases.push(alias.to_string());
    }
    aliases
}

/// Remove HTML tags (search APIs highlight matches with `<em>`)
pub fn strip_markup(text: &str) -> String {
    MARKUP.replace_all(text, "").trim().to_string()
}

/// `Some(trimmed)` unless the value is missing or blank
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the leading `YYYY-MM-DD` of a date or datetime string
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let head = text.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Release year from a date string, falling back to a leading 4-digit year
pub fn parse_year(text: &str) -> Option<i32> {
    if let Some(date) = parse_date(text) {
        return Some(date.year());
    }
    let year = text.trim().get(..4)?;
    year.parse().ok().filter(|y| (1900..=2100).contains(y))
}

/// Monday = 1 .. Sunday = 7
pub fn weekday_number(day: Weekday) -> u8 {
    day.number_from_monday() as u8
}

/// Inverse of [`weekday_number`]
pub fn weekday_from_number(day: u8) -> Option<Weekday> {
    match day {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Positive numeric id as a string; platforms use 0/-1 for "none"
pub fn id_string(id: Option<i64>) -> Option<String> {
    id.filter(|id| *id > 0).map(|id| id.to_string())
}
