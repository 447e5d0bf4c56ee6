//! Compact duration expressions such as `3d2h`, `-30m` or `+1d 12h`.
//!
//! An expression is an optional sign followed by up to four components in
//! strict day → hour → minute → second order. Components are
//! case-insensitive and may be separated by whitespace. Expressions whose
//! magnitude is zero are rejected, so `0s` is not a valid adjustment.
//!
//! [`format`] produces the inverse rendering (`3d 2h 15m`). Zero renders as
//! [`ZERO_SENTINEL`], which callers special-case (a zero package duration
//! means "permanent", see [`format_lifetime`]).

use crate::error::DurationError;

pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
pub const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Rendering of a zero duration.
pub const ZERO_SENTINEL: &str = "0s";

/// Label shown for durations of zero when they mean "never expires".
pub const PERMANENT_LABEL: &str = "permanent";

/// Units in the order they must appear in an expression.
const UNITS: [(char, i64); 4] = [
    ('d', SECONDS_PER_DAY),
    ('h', SECONDS_PER_HOUR),
    ('m', SECONDS_PER_MINUTE),
    ('s', 1),
];

/// Parses a duration expression into signed seconds.
///
/// # Examples
///
/// ```rust
/// use pcv_sync::duration;
///
/// assert_eq!(duration::parse("3d2h").unwrap(), 266_400);
/// assert_eq!(duration::parse("-30m").unwrap(), -1_800);
/// assert!(duration::parse("5m3h").is_err());
/// ```
pub fn parse(expr: &str) -> Result<i64, DurationError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let (negative, body) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut chars = body.char_indices().peekable();
    let mut next_unit = 0usize;
    let mut components = 0usize;
    let mut magnitude: i128 = 0;

    loop {
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some(&(start, first)) = chars.peek() else {
            break;
        };
        if !first.is_ascii_digit() {
            return Err(DurationError::UnexpectedChar { ch: first, position: start });
        }

        let mut value: i128 = 0;
        while let Some((_, digit)) = chars.next_if(|(_, c)| c.is_ascii_digit()) {
            value = value * 10 + i128::from(digit as u8 - b'0');
            if value > i128::from(u64::MAX) {
                return Err(DurationError::Overflow);
            }
        }

        let Some((position, unit)) = chars.next() else {
            return Err(DurationError::MissingUnit);
        };
        let unit = unit.to_ascii_lowercase();
        let Some(index) = UNITS.iter().position(|(u, _)| *u == unit) else {
            return Err(DurationError::UnexpectedChar { ch: unit, position });
        };
        if index < next_unit {
            return Err(DurationError::OutOfOrder { unit });
        }
        next_unit = index + 1;
        components += 1;

        magnitude += value * i128::from(UNITS[index].1);
        if magnitude > i128::from(i64::MAX) + 1 {
            return Err(DurationError::Overflow);
        }
    }

    if components == 0 {
        return Err(DurationError::Empty);
    }
    if magnitude == 0 {
        return Err(DurationError::Zero);
    }

    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).map_err(|_| DurationError::Overflow)
}

/// Renders signed seconds as `3d 2h 15m`, omitting zero-valued units.
///
/// Negative values carry a single leading `-` for the whole expression.
pub fn format(seconds: i64) -> String {
    if seconds == 0 {
        return ZERO_SENTINEL.to_string();
    }

    let mut remaining = seconds.unsigned_abs();
    let mut parts = Vec::with_capacity(UNITS.len());
    for (unit, size) in UNITS {
        let size = size as u64;
        let count = remaining / size;
        remaining %= size;
        if count > 0 {
            parts.push(format!("{count}{unit}"));
        }
    }

    let rendered = parts.join(" ");
    if seconds < 0 {
        format!("-{rendered}")
    } else {
        rendered
    }
}

/// Like [`format`], but renders zero as [`PERMANENT_LABEL`].
pub fn format_lifetime(seconds: i64) -> String {
    if seconds == 0 {
        PERMANENT_LABEL.to_string()
    } else {
        format(seconds)
    }
}
