//! Acceptance window for reported timestamps.
use thiserror::Error;

/// Reports may be at most this far from the server's clock, either way.
pub const MAX_SKEW_SECS: i64 = 3600;
/// The read path covers this much history.
pub const LIVE_WINDOW_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("OUTDATED TIME - Data not stored.")]
    Outdated { reported: i64, earliest: i64 },
    #[error("FUTURE TIME - Data not stored.")]
    Future { reported: i64, latest: i64 },
}

/// Reads an integer epoch value the lenient way reporters expect: leading
/// whitespace and an optional sign, then as many digits as are present.
/// Anything without digits is 0; overflow saturates.
pub fn parse_epoch(raw: &str) -> i64 {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        let d = i64::from(b - b'0');
        let next = value
            .checked_mul(10)
            .and_then(|v| if negative { v.checked_sub(d) } else { v.checked_add(d) });
        match next {
            Some(v) => value = v,
            None => return if negative { i64::MIN } else { i64::MAX },
        }
    }
    value
}

/// Accepts `raw` iff it lies within `now ± MAX_SKEW_SECS`, both bounds inclusive.
pub fn check_window(raw: &str, now: i64) -> Result<i64, WindowError> {
    let reported = parse_epoch(raw);
    let earliest = now.saturating_sub(MAX_SKEW_SECS);
    let latest = now.saturating_add(MAX_SKEW_SECS);

    if reported < earliest {
        return Err(WindowError::Outdated { reported, earliest });
    }
    if reported > latest {
        return Err(WindowError::Future { reported, latest });
    }
    Ok(reported)
}

pub fn live_cutoff(now: i64) -> i64 {
    now.saturating_sub(LIVE_WINDOW_SECS)
}
