//! Consecutive-day activity streaks
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Streak state after recording activity on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakUpdate {
    pub streak: u32,
    pub last_active_date: NaiveDate,
}

/// Apply today's activity to a stored streak.
///
/// Activity the day after `last_active` extends the streak, activity on the
/// same day leaves it alone, and anything else (a gap, a date in the future,
/// or no history) starts over at 1. The caller supplies `today`.
#[must_use]
pub fn advance_streak(last_active: Option<NaiveDate>, streak: u32, today: NaiveDate) -> StreakUpdate {
    let streak = match last_active {
        Some(last) if last == today => streak,
        Some(last) if last.succ_opt() == Some(today) => streak.saturating_add(1),
        _ => 1,
    };
    StreakUpdate {
        streak,
        last_active_date: today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    #[test]
    fn yesterday_extends_the_streak() {
        let yesterday = today() - Days::new(1);
        let update = advance_streak(Some(yesterday), 3, today());
        assert_eq!(update.streak, 4);
        assert_eq!(update.last_active_date, today());
    }

    #[test]
    fn gap_resets_to_one() {
        let three_days_ago = today() - Days::new(3);
        assert_eq!(advance_streak(Some(three_days_ago), 5, today()).streak, 1);
        let two_days_ago = today() - Days::new(2);
        assert_eq!(advance_streak(Some(two_days_ago), 5, today()).streak, 1);
    }

    #[test]
    fn same_day_is_unchanged() {
        let update = advance_streak(Some(today()), 4, today());
        assert_eq!(update.streak, 4);
        assert_eq!(update, advance_streak(Some(today()), 4, today()));
    }

    #[test]
    fn first_activity_and_future_dates_start_over() {
        assert_eq!(advance_streak(None, 0, today()).streak, 1);
        let tomorrow = today() + Days::new(1);
        let update = advance_streak(Some(tomorrow), 9, today());
        assert_eq!(update.streak, 1);
        assert_eq!(update.last_active_date, today());
    }

    #[test]
    fn month_and_year_boundaries_count_as_consecutive() {
        let feb_end = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let mar_first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(advance_streak(Some(feb_end), 1, mar_first).streak, 2);

        let new_years_eve = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let new_year = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(advance_streak(Some(new_years_eve), 7, new_year).streak, 8);
    }
}
