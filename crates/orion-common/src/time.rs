//! Small time helpers shared across periodic services.

use chrono::{DateTime, Duration, Utc};

/// Window `[now - lookback, now]`, used by collectors and correlators
/// that poll the log store on a fixed lookback (spec §4.E, §4.G).
pub fn lookback_window(now: DateTime<Utc>, lookback: Duration) -> (DateTime<Utc>, DateTime<Utc>) {
    (now - lookback, now)
}

/// Clamp a restart high-water-mark to `now - max_age` to avoid replay
/// storms after a long outage (spec §4.J).
pub fn clamp_high_water_mark(
    stored: DateTime<Utc>,
    now: DateTime<Utc>,
    max_age: Duration,
) -> DateTime<Utc> {
    let floor = now - max_age;
    stored.max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_stale_high_water_mark() {
        let now = Utc::now();
        let stale = now - Duration::days(10);
        let clamped = clamp_high_water_mark(stale, now, Duration::hours(24));
        assert_eq!(clamped, now - Duration::hours(24));
    }

    #[test]
    fn recent_high_water_mark_unchanged() {
        let now = Utc::now();
        let recent = now - Duration::hours(1);
        let clamped = clamp_high_water_mark(recent, now, Duration::hours(24));
        assert_eq!(clamped, recent);
    }
}
