//! Progress line rendering for the single-threaded runner: percentage
//! complete, hex `i`/`t`, and a relative+absolute ETA, printed once per
//! batch to stderr with a carriage return so the line updates in place.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Render one progress line to stderr, overwriting the previous one.
pub fn show(i: u64, t: u64, elapsed_secs_since_start: f64) {
    let fraction = i as f64 / t as f64;
    let eta = estimate_remaining(i, t, elapsed_secs_since_start)
        .map(|remaining| human_time_both(remaining))
        .unwrap_or_else(|| "unknown".to_string());
    eprint!(
        "\r\x1b[K{:9.6}% ({:#014x} / {:#014x}) ETA: {}",
        fraction * 100.0,
        i,
        t,
        eta
    );
}

/// Print the final "calculation complete" line, clearing any in-progress
/// percentage line first.
pub fn show_complete() {
    eprintln!("\rCalculation complete.");
}

fn estimate_remaining(i: u64, t: u64, elapsed_secs: f64) -> Option<Duration> {
    if i == 0 || elapsed_secs <= 0.0 {
        return None;
    }
    let rate = i as f64 / elapsed_secs;
    if rate <= 0.0 {
        return None;
    }
    let remaining_steps = (t - i) as f64;
    Some(Duration::from_secs_f64(remaining_steps / rate))
}

/// Relative duration, in the style of the original puzzle clients:
/// seconds below two, then plain seconds, then H:M:S, then days, years.
pub fn human_time_relative(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 2.0 {
        return format!("{:.1} second", secs);
    }
    let secs = duration.as_secs();
    if secs < 60 {
        return format!("{} seconds", secs);
    }
    if secs < 86400 {
        let h = secs / 3600;
        let m = (secs % 3600) / 60;
        let s = secs % 60;
        return format!("{:02}:{:02}:{:02}", h, m, s);
    }
    let days_total = secs / 86400;
    let h = (secs % 86400) / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if days_total < 365 {
        if days_total == 1 {
            return format!("1 day {:02}:{:02}:{:02}", h, m, s);
        }
        return format!("{} days {:02}:{:02}:{:02}", days_total, h, m, s);
    }
    let years = days_total / 365;
    let days = days_total % 365;
    if years < 2 {
        return format!("1 year {} days", days);
    }
    format!("{} years {} days", years, days)
}

/// Absolute point in time `duration` from now, rendered as a calendar
/// date (or date+time if within the next day).
pub fn human_time_absolute(duration: Duration) -> String {
    let target = SystemTime::now() + duration;
    let secs_since_epoch = target
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    format_unix_timestamp(secs_since_epoch, duration.as_secs() < 86400)
}

fn format_unix_timestamp(secs_since_epoch: u64, with_time: bool) -> String {
    const DAYS_PER_400_YEARS: u64 = 146097;
    let days = secs_since_epoch / 86400;
    let time_of_day = secs_since_epoch % 86400;

    // civil_from_days (Howard Hinnant's algorithm), proleptic Gregorian.
    let z = days as i64 + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / DAYS_PER_400_YEARS as i64;
    let doe = (z - era * DAYS_PER_400_YEARS as i64) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };

    if with_time {
        let h = time_of_day / 3600;
        let min = (time_of_day % 3600) / 60;
        let s = time_of_day % 60;
        format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s)
    } else {
        format!("{:04}-{:02}-{:02}", y, m, d)
    }
}

/// Relative and absolute ETA combined, e.g. "2 days 03:14:07 (2026-07-30
/// 09:12:00)".
pub fn human_time_both(duration: Duration) -> String {
    format!(
        "{} ({})",
        human_time_relative(duration),
        human_time_absolute(duration)
    )
}
