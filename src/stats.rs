//! Dashboard aggregates over a user's entries. Everything here is pure: the
//! caller passes in the entries and the calendar day it considers "today".

use serde::Serialize;
use time::{format_description::FormatItem, macros::format_description, Date, Duration};

use crate::entries::repo_types::{Entry, DATE_FORMAT};

pub const DEFAULT_CHART_DAYS: u32 = 7;
pub const RECENT_ACTIVITY_LEN: usize = 5;
pub const NO_CATEGORY: &str = "N/A";

const CHART_LABEL: &[FormatItem<'static>] =
    format_description!("[month repr:short] [day padding:none]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreLevel {
    High,
    Medium,
    Low,
}

impl ScoreLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            ScoreLevel::High
        } else if score >= 5.0 {
            ScoreLevel::Medium
        } else {
            ScoreLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub name: String, // e.g. "Jan 1"
    pub date: String, // YYYY-MM-DD
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_entries: usize,
    pub average_score: f64,
    pub today_score: f64,
    pub today_level: ScoreLevel,
    pub most_productive_category: String,
    pub chart: Vec<ChartPoint>,
    pub recent: Vec<Entry>,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn mean<'a>(entries: impl Iterator<Item = &'a Entry>) -> f64 {
    let (sum, count) = entries.fold((0i64, 0u32), |(s, c), e| (s + e.score as i64, c + 1));
    if count == 0 {
        0.0
    } else {
        round1(sum as f64 / count as f64)
    }
}

/// Mean score rounded to one decimal; 0 for no entries.
pub fn average_score(entries: &[Entry]) -> f64 {
    mean(entries.iter())
}

pub fn today_score(entries: &[Entry], today: Date) -> f64 {
    mean(entries.iter().filter(|e| e.date == today))
}

/// Category with the strictly highest mean score. Ties go to the category
/// seen first.
pub fn most_productive_category(entries: &[Entry]) -> String {
    let mut totals: Vec<(&str, i64, u32)> = Vec::new();
    for e in entries {
        match totals.iter_mut().find(|(c, _, _)| *c == e.category) {
            Some((_, total, count)) => {
                *total += e.score as i64;
                *count += 1;
            }
            None => totals.push((e.category.as_str(), e.score as i64, 1)),
        }
    }

    let mut best: Option<(&str, f64)> = None;
    for (category, total, count) in totals {
        let avg = total as f64 / count as f64;
        if best.map_or(true, |(_, b)| avg > b) {
            best = Some((category, avg));
        }
    }
    best.map_or_else(|| NO_CATEGORY.to_string(), |(c, _)| c.to_string())
}

/// One point per day for the trailing `days` days ending at `today`, oldest
/// first. A day's value is the mean of its scores, or 0 without entries.
pub fn chart_series(entries: &[Entry], today: Date, days: u32) -> Vec<ChartPoint> {
    (0..days)
        .rev()
        .map(|back| {
            let day = today.saturating_sub(Duration::days(back as i64));
            ChartPoint {
                name: day.format(CHART_LABEL).unwrap_or_default(),
                date: day.format(DATE_FORMAT).unwrap_or_default(),
                value: mean(entries.iter().filter(|e| e.date == day)),
            }
        })
        .collect()
}

/// The `n` most recently created entries, newest first. Equal creation times
/// fall back to the later entry date, then the entry id.
pub fn recent_activity(entries: &[Entry], n: usize) -> Vec<Entry> {
    let mut sorted: Vec<&Entry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.date.cmp(&a.date))
            .then_with(|| b.id.cmp(&a.id))
    });
    sorted.into_iter().take(n).cloned().collect()
}

pub fn summarize(entries: &[Entry], today: Date, days: u32) -> DashboardStats {
    let today_score = today_score(entries, today);
    DashboardStats {
        total_entries: entries.len(),
        average_score: average_score(entries),
        today_score,
        today_level: ScoreLevel::from_score(today_score),
        most_productive_category: most_productive_category(entries),
        chart: chart_series(entries, today, days),
        recent: recent_activity(entries, RECENT_ACTIVITY_LEN),
    }
}
