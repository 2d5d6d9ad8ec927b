//! Fetch window planning for incremental hotspot activity sync.
//!
//! Each window spans from the day before the watermark's day to the day after
//! it. The one-day overlap on both edges covers upstream records that land
//! slightly out of order around midnight; duplicates this produces are
//! absorbed by the idempotent document write.

use chrono::{DateTime, Utc};
use std::fmt;

use super::time_utils::{one_day, start_of_day, to_utc_string};

/// Half-open `[min_date, max_date)` range fetched in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub min_date: DateTime<Utc>,
    pub max_date: DateTime<Utc>,
    /// Window reaches the run timestamp; no further pass needed
    pub is_final: bool,
}

impl fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            to_utc_string(self.min_date),
            to_utc_string(self.max_date)
        )
    }
}

/// Plan the next window for a hotspot.
///
/// Expects `born_at <= processed_at <= run_at`. `min_date` never exceeds
/// `max_date` even when `processed_at` lies past `run_at`.
pub fn plan_window(
    processed_at: DateTime<Utc>,
    born_at: DateTime<Utc>,
    run_at: DateTime<Utc>,
) -> SyncWindow {
    let day = start_of_day(processed_at);

    let max_date = (day + one_day()).min(run_at);
    let min_date = (day - one_day()).max(born_at).min(max_date);

    SyncWindow {
        min_date,
        max_date,
        is_final: max_date >= run_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_first_window_is_clamped_to_birth() {
        let born = utc(2021, 1, 1, 0);
        let window = plan_window(born, born, utc(2021, 1, 5, 0));

        assert_eq!(window.min_date, utc(2021, 1, 1, 0));
        assert_eq!(window.max_date, utc(2021, 1, 2, 0));
        assert!(!window.is_final);
    }

    #[test]
    fn test_windows_walk_forward_to_run_date() {
        let born = utc(2021, 1, 1, 0);
        let run_at = utc(2021, 1, 5, 0);
        let mut processed = born;
        let mut windows = Vec::new();

        loop {
            let window = plan_window(processed, born, run_at);
            windows.push(window);
            processed = window.max_date;
            if window.is_final {
                break;
            }
        }

        let bounds: Vec<_> = windows.iter().map(|w| (w.min_date, w.max_date)).collect();
        assert_eq!(
            bounds,
            vec![
                (utc(2021, 1, 1, 0), utc(2021, 1, 2, 0)),
                (utc(2021, 1, 1, 0), utc(2021, 1, 3, 0)),
                (utc(2021, 1, 2, 0), utc(2021, 1, 4, 0)),
                (utc(2021, 1, 3, 0), utc(2021, 1, 5, 0)),
            ]
        );
        assert!(windows.last().unwrap().is_final);
    }

    #[test]
    fn test_max_date_clamped_to_run_date() {
        let window = plan_window(utc(2021, 3, 10, 6), utc(2021, 1, 1, 0), utc(2021, 3, 10, 9));

        assert_eq!(window.min_date, utc(2021, 3, 9, 0));
        assert_eq!(window.max_date, utc(2021, 3, 10, 9));
        assert!(window.is_final);
    }

    #[test]
    fn test_mid_day_birth_keeps_lower_bound() {
        let born = utc(2021, 2, 1, 15);
        let window = plan_window(born, born, utc(2021, 2, 9, 0));

        assert_eq!(window.min_date, born);
        assert_eq!(window.max_date, utc(2021, 2, 2, 0));
    }

    #[test]
    fn test_processed_past_run_date_never_inverts() {
        let window = plan_window(utc(2021, 5, 10, 0), utc(2021, 1, 1, 0), utc(2021, 5, 1, 0));
        assert!(window.min_date <= window.max_date);
        assert!(window.is_final);
    }

    #[test]
    fn test_bounds_hold_across_watermark_states() {
        let born = utc(2021, 1, 1, 13);
        let run_at = utc(2021, 2, 1, 7);

        let mut processed = born;
        while processed <= run_at {
            let window = plan_window(processed, born, run_at);
            assert!(window.min_date <= window.max_date, "{}", window);
            assert!(window.min_date >= born, "{}", window);
            assert!(window.max_date <= run_at, "{}", window);
            assert!(window.max_date > processed || window.is_final, "{}", window);
            processed += Duration::minutes(317);
        }
    }
}
