use std::time::Duration;

use crate::error::{DurationError, DurationResult};

/// Parses a duration string into a number of milliseconds.
///
/// The string is a sequence of `<digits><unit>` pairs where unit is one of `s`, `m`, `h` or
/// `d`, for example `1h30m`. Returns `None` on malformed input or overflow.
///
/// # Examples
///
/// ```
/// use sleet_utils::time::parse_duration_millis;
///
/// assert_eq!(parse_duration_millis("1m30s"), Some(90_000));
/// ```
pub fn parse_duration_millis(input: &str) -> Option<u128> {
    let mut total: u128 = 0;
    let mut chars = input.trim().chars().peekable();

    if chars.peek().is_none() {
        return None;
    }

    while chars.peek().is_some() {
        let mut number_str = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_digit() {
                number_str.push(chars.next()?);
            } else {
                break;
            }
        }

        if number_str.is_empty() {
            return None;
        }

        let number: u128 = number_str.parse().ok()?;
        let multiplier = match chars.next()? {
            's' => 1000,
            'm' => 60 * 1000,
            'h' => 60 * 60 * 1000,
            'd' => 24 * 60 * 60 * 1000,
            _ => return None,
        };

        total = total.checked_add(number.checked_mul(multiplier)?)?;
    }

    Some(total)
}

/// Parses a duration string such as `30s` or `1h30m` into a [`Duration`].
///
/// # Errors
///
/// * [`DurationError::Invalid`] if the string is not a valid duration.
pub fn parse_duration(input: &str) -> DurationResult<Duration> {
    parse_duration_millis(input)
        .and_then(|millis| u64::try_from(millis).ok())
        .map(Duration::from_millis)
        .ok_or_else(|| {
            DurationError::Invalid {
                input: input.to_string(),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_millis() {
        assert_eq!(parse_duration_millis("1s"), Some(1000));
        assert_eq!(parse_duration_millis("1m"), Some(60 * 1000));
        assert_eq!(parse_duration_millis("1h"), Some(60 * 60 * 1000));
        assert_eq!(parse_duration_millis("1d"), Some(24 * 60 * 60 * 1000));
        assert_eq!(
            parse_duration_millis("1h1m1s"),
            Some(60 * 60 * 1000 + 60 * 1000 + 1000)
        );
        assert_eq!(parse_duration_millis("0s"), Some(0));
    }

    #[test]
    fn test_parse_duration_millis_invalid() {
        assert_eq!(parse_duration_millis(""), None);
        assert_eq!(parse_duration_millis("10"), None);
        assert_eq!(parse_duration_millis("1x"), None);
        assert_eq!(parse_duration_millis("m"), None);
        assert_eq!(parse_duration_millis("fail"), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(30 * 60));
        assert!(matches!(
            parse_duration("soon"),
            Err(DurationError::Invalid { .. })
        ));
    }
}
