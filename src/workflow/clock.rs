//! Calendar source for resolving relative draft dates.

use std::sync::Mutex;

use chrono::{Days, Local, NaiveDate};

/// Supplies "today" when a draft's date offset is resolved
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the running machine
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Manually advanced clock
#[derive(Debug)]
pub struct FixedClock {
    today: Mutex<NaiveDate>,
}

impl FixedClock {
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

    /// Move the clock forward by whole days
    pub fn advance_days(&self, days: u64) {
        if let Ok(mut guard) = self.today.lock() {
            if let Some(next) = guard.checked_add_days(Days::new(days)) {
                *guard = next;
            }
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        match self.today.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
        clock.advance_days(2);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }
}
