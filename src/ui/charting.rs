use chrono::Datelike;
use exhale::stats::views::DayPoint;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Bars for the daily practice chart: label and whole minutes (any practice
/// shows as at least one minute so short days stay visible)
pub fn daily_minute_bars(series: &[DayPoint]) -> Vec<(String, u64)> {
    series
        .iter()
        .map(|p| {
            let minutes = p.duration_seconds.div_ceil(60);
            (format!("{}", p.date.day()), minutes)
        })
        .collect()
}

/// Widest bar that still fits `bars` bars with a one-cell gap
pub fn bar_width(area_width: u16, bars: usize) -> u16 {
    if bars == 0 {
        return 1;
    }
    let per_bar = area_width.saturating_sub(2) / bars as u16;
    per_bar.saturating_sub(1).clamp(1, 6)
}

/// `mm:ss`
pub fn format_clock(ms: u64) -> String {
    let secs = ms.div_ceil(1000);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Cut `text` to at most `max` terminal columns, marking the cut with `…`
pub fn fit_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        used += w;
        out.push(ch);
    }
    if max > 0 {
        out.push('…');
    }
    out
}
