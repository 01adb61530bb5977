use super::{streak, StatsDocument};
use crate::session::SessionRecord;
use crate::util::mean;
use chrono::{DateTime, Datelike, Days, Local, Months, NaiveDate};
use itertools::Itertools;

/// Practice time on one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayPoint {
    pub date: NaiveDate,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
}

/// Practice totals for one day, ISO week or calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodPoint {
    pub start: NaiveDate,
    /// Inclusive
    pub end: NaiveDate,
    pub duration_seconds: u64,
    pub sessions: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TechniqueShare {
    pub technique_id: String,
    pub name: String,
    pub count: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakInfo {
    pub current: u32,
    pub max: u32,
    pub last_milestone: Option<u32>,
    pub next_milestone: Option<u32>,
}

impl StreakInfo {
    pub fn days_to_next(&self) -> Option<u32> {
        self.next_milestone.map(|m| m - self.current)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeSummary {
    pub total_sessions: u32,
    pub total_duration_seconds: u64,
    pub completed_sessions: u32,
    /// Percentage of sessions that ran to completion
    pub completion_rate: f64,
    pub average_session_seconds: Option<f64>,
    pub longest_session_seconds: u64,
    pub active_days: usize,
    pub last_session: Option<DateTime<Local>>,
}

/// Seconds and session count for a day. Reads the daily bucket and falls
/// back to the raw session list when the bucket is missing.
fn day_totals(doc: &StatsDocument, date: NaiveDate) -> (u64, u32) {
    match doc.daily_stats.get(&date) {
        Some(bucket) => (bucket.total_duration_seconds, bucket.sessions_count),
        None => doc
            .sessions
            .iter()
            .filter(|s| s.local_date() == date)
            .fold((0, 0), |(secs, n), s| (secs + s.duration_seconds, n + 1)),
    }
}

fn days_back(today: NaiveDate, n: u64) -> NaiveDate {
    today.checked_sub_days(Days::new(n)).unwrap_or(NaiveDate::MIN)
}

/// One point per day over the trailing `num_weeks * 7` days, oldest first,
/// today included, idle days reported as zero.
pub fn weekly_series(doc: &StatsDocument, num_weeks: u32, today: NaiveDate) -> Vec<DayPoint> {
    let days = num_weeks as u64 * 7;
    (0..days)
        .rev()
        .map(|offset| {
            let date = days_back(today, offset);
            DayPoint {
                date,
                duration_seconds: day_totals(doc, date).0,
            }
        })
        .collect()
}

fn period_bounds(period: Period, today: NaiveDate, offset: u32) -> (NaiveDate, NaiveDate) {
    match period {
        Period::Day => {
            let d = days_back(today, offset as u64);
            (d, d)
        }
        Period::Week => {
            let monday = days_back(today, today.weekday().num_days_from_monday() as u64);
            let start = days_back(monday, offset as u64 * 7);
            (start, start + Days::new(6))
        }
        Period::Month => {
            let first = today.with_day(1).unwrap_or(today);
            let start = first
                .checked_sub_months(Months::new(offset))
                .unwrap_or(NaiveDate::MIN);
            let end = start
                .checked_add_months(Months::new(1))
                .and_then(|next| next.pred_opt())
                .unwrap_or(start);
            (start, end)
        }
    }
}

/// The last `count` periods ending with the one containing `today`, oldest first
pub fn period_series(
    doc: &StatsDocument,
    period: Period,
    count: u32,
    today: NaiveDate,
) -> Vec<PeriodPoint> {
    (0..count)
        .rev()
        .map(|offset| {
            let (start, end) = period_bounds(period, today, offset);
            let (duration_seconds, sessions) = start
                .iter_days()
                .take_while(|d| *d <= end)
                .map(|d| day_totals(doc, d))
                .fold((0, 0), |(secs, n), (s, c)| (secs + s, n + c));
            PeriodPoint {
                start,
                end,
                duration_seconds,
                sessions,
            }
        })
        .collect()
}

/// Display name for a technique id, taken from its most recent session
fn technique_name(doc: &StatsDocument, id: &str) -> String {
    doc.sessions
        .iter()
        .rev()
        .find(|s| s.technique_id == id)
        .map(|s| s.technique_name.clone())
        .unwrap_or_else(|| id.to_string())
}

/// Usage share per technique, most used first
pub fn technique_distribution(doc: &StatsDocument) -> Vec<TechniqueShare> {
    let total: u32 = doc.favorite_techniques.values().sum();
    if total == 0 {
        return Vec::new();
    }

    doc.favorite_techniques
        .iter()
        .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
        .map(|(id, &count)| TechniqueShare {
            technique_id: id.clone(),
            name: technique_name(doc, id),
            count,
            percentage: 100.0 * count as f64 / total as f64,
        })
        .collect()
}

pub fn streak_info(doc: &StatsDocument) -> StreakInfo {
    StreakInfo {
        current: doc.streak,
        max: doc.max_streak,
        last_milestone: doc.last_streak_milestone,
        next_milestone: streak::next_milestone(doc.streak).map(|m| m.days),
    }
}

pub fn practice_summary(doc: &StatsDocument) -> PracticeSummary {
    let durations: Vec<f64> = doc
        .sessions
        .iter()
        .map(|s| s.duration_seconds as f64)
        .collect();
    let completed = doc.sessions.iter().filter(|s| s.completed).count() as u32;

    PracticeSummary {
        total_sessions: doc.total_sessions,
        total_duration_seconds: doc.total_duration_seconds,
        completed_sessions: completed,
        completion_rate: if doc.sessions.is_empty() {
            0.0
        } else {
            100.0 * completed as f64 / doc.sessions.len() as f64
        },
        average_session_seconds: mean(&durations),
        longest_session_seconds: doc
            .sessions
            .iter()
            .map(|s| s.duration_seconds)
            .max()
            .unwrap_or(0),
        active_days: doc.daily_stats.values().filter(|d| d.is_active()).count(),
        last_session: doc.last_session,
    }
}

/// Newest first
pub fn recent_sessions(doc: &StatsDocument, n: usize) -> Vec<&SessionRecord> {
    doc.sessions.iter().rev().take(n).collect()
}
