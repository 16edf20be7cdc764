//! Human duration strings (`"10s"`, `"2h"`, `"inf"`) and RFC3339 timestamps.
//!
//! The grammar is intentionally narrower than general-purpose duration
//! crates accept: `<integer><unit>` with `unit` one of `s, m, h, d, w`, plus
//! the literals `"0"` and `"inf"`. Anything else is a `MalformedDuration`.

use chrono::{DateTime, Utc};

use crate::error::Dp3Error;

/// A parsed duration field. `None` represents the `"inf"` literal — no
/// expiration / no upper bound.
pub type MaybeDuration = Option<chrono::Duration>;

/// Parse a duration string per the grammar above.
///
/// `"inf"` yields `Ok(None)`. `"0"` yields `Ok(Some(Duration::zero()))`.
/// Everything else must be a positive integer followed by exactly one of
/// `s`, `m`, `h`, `d`, `w`.
pub fn parse_duration(input: &str) -> Result<MaybeDuration, Dp3Error> {
    let trimmed = input.trim();
    if trimmed == "inf" {
        return Ok(None);
    }
    if trimmed == "0" {
        return Ok(Some(chrono::Duration::zero()));
    }

    let malformed = || Dp3Error::MalformedDuration(input.to_string());

    if trimmed.is_empty() {
        return Err(malformed());
    }
    let (digits, unit) = trimmed.split_at(trimmed.len() - 1);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let amount: i64 = digits.parse().map_err(|_| malformed())?;

    let seconds_per_unit: i64 = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        _ => return Err(malformed()),
    };

    Ok(Some(chrono::Duration::seconds(amount * seconds_per_unit)))
}

/// Parse an RFC3339 timestamp (`YYYY-MM-DDThh:mm:ss[.fff][Z|+-hh:mm]`).
pub fn parse_rfc3339(input: &str) -> Result<DateTime<Utc>, Dp3Error> {
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Dp3Error::MalformedTimestamp(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_units() {
        assert_eq!(parse_duration("0").unwrap(), Some(chrono::Duration::zero()));
        assert_eq!(parse_duration("1s").unwrap(), Some(chrono::Duration::seconds(1)));
        assert_eq!(parse_duration("90m").unwrap(), Some(chrono::Duration::seconds(5400)));
        assert_eq!(parse_duration("2h").unwrap(), Some(chrono::Duration::seconds(7200)));
        assert_eq!(parse_duration("7d").unwrap(), Some(chrono::Duration::seconds(604_800)));
        assert_eq!(parse_duration("1w").unwrap(), Some(chrono::Duration::seconds(604_800)));
        assert_eq!(parse_duration("inf").unwrap(), None);
    }

    #[test]
    fn rejects_unknown_units_and_garbage() {
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("h10").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("1.5h").is_err());
    }

    #[test]
    fn rfc3339_round_trip() {
        let t = parse_rfc3339("2024-01-01T00:01:30Z").unwrap();
        assert_eq!(t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true), "2024-01-01T00:01:30Z");
    }

    #[test]
    fn rfc3339_rejects_malformed() {
        assert!(parse_rfc3339("2024-01-01 00:01:30").is_err());
        assert!(parse_rfc3339("not a time").is_err());
    }
}
