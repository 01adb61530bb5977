use chrono::{Local, NaiveDate};
use std::sync::Mutex;

/// Source of "today" for streak calculations
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable date, for tests and replaying history
#[derive(Debug)]
pub struct ManualClock {
    today: Mutex<NaiveDate>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        if let Ok(mut guard) = self.today.lock() {
            *guard = today;
        }
    }

    pub fn advance_days(&self, days: u64) {
        if let Ok(mut guard) = self.today.lock() {
            *guard = *guard + chrono::Days::new(days);
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        match self.today.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}
