use super::DailyStat;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// A streak length worth celebrating once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub days: u32,
    pub message: &'static str,
}

pub const MILESTONES: [Milestone; 9] = [
    Milestone {
        days: 3,
        message: "Three days in a row. A habit is taking root.",
    },
    Milestone {
        days: 7,
        message: "One full week of daily breathing!",
    },
    Milestone {
        days: 14,
        message: "Two weeks strong. Your practice is steady.",
    },
    Milestone {
        days: 21,
        message: "21 days. They say that's what a habit takes.",
    },
    Milestone {
        days: 30,
        message: "A whole month of mindful breathing!",
    },
    Milestone {
        days: 60,
        message: "60 days. Breathing well is part of who you are now.",
    },
    Milestone {
        days: 90,
        message: "Three months without a break. Remarkable.",
    },
    Milestone {
        days: 180,
        message: "Half a year of daily practice!",
    },
    Milestone {
        days: 365,
        message: "One year. Every single day. Take a deep breath and be proud.",
    },
];

/// Consecutive active days ending today, or ending yesterday when today
/// has no practice yet. Dates are compared as calendar days, so DST shifts
/// and late-night sessions only matter through their local date.
pub fn current_streak(
    daily_stats: &BTreeMap<NaiveDate, DailyStat>,
    last_session: Option<NaiveDate>,
    today: NaiveDate,
) -> u32 {
    let Some(last) = last_session else {
        return 0;
    };
    let Some(yesterday) = today.pred_opt() else {
        return 0;
    };
    if last < yesterday {
        return 0;
    }

    let active = |date: NaiveDate| {
        date == last || daily_stats.get(&date).is_some_and(DailyStat::is_active)
    };

    let mut day = if active(today) { today } else { yesterday };
    let mut streak = 0;
    while active(day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

/// Smallest milestone crossed when the streak moves from `previous` to `current`
pub fn newly_reached(previous: u32, current: u32) -> Option<Milestone> {
    MILESTONES
        .iter()
        .find(|m| previous < m.days && m.days <= current)
        .copied()
}

/// First milestone above `streak`; None once all are behind
pub fn next_milestone(streak: u32) -> Option<Milestone> {
    MILESTONES.iter().find(|m| m.days > streak).copied()
}

pub fn milestone_for(days: u32) -> Option<Milestone> {
    MILESTONES.iter().find(|m| m.days == days).copied()
}
