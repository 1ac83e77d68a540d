// ABOUTME: Typed readers for numeric and list environment variables
// ABOUTME: Out-of-range or unparsable values fall back to the default with a warning

use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;
use tracing::warn;

/// Read a numeric variable, falling back to `default` when unset, unparsable
/// or outside `range`.
pub fn parse_in_range<T>(name: &str, default: T, range: RangeInclusive<T>) -> T
where
    T: FromStr + PartialOrd + Copy + std::fmt::Display,
{
    let Ok(raw) = env::var(name) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if range.contains(&value) => value,
        Ok(value) => {
            warn!(
                "{}={} is outside {}..={}, using default {}",
                name,
                value,
                range.start(),
                range.end(),
                default
            );
            default
        }
        Err(_) => {
            warn!("{}={:?} is not a valid number, using default {}", name, raw, default);
            default
        }
    }
}

/// Read a string variable, treating empty values as unset
pub fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma separated variable into trimmed, non-empty items
pub fn list(name: &str) -> Vec<String> {
    non_empty(name)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name so they can run in parallel.

    #[test]
    fn test_parse_in_range_default_when_unset() {
        env::remove_var("RUNBOX_TEST_UNSET");
        assert_eq!(parse_in_range("RUNBOX_TEST_UNSET", 7u64, 1..=10), 7);
    }

    #[test]
    fn test_parse_in_range_accepts_valid() {
        env::set_var("RUNBOX_TEST_VALID", " 9 ");
        assert_eq!(parse_in_range("RUNBOX_TEST_VALID", 7u64, 1..=10), 9);
    }

    #[test]
    fn test_parse_in_range_rejects_out_of_range_and_garbage() {
        env::set_var("RUNBOX_TEST_RANGE", "11");
        assert_eq!(parse_in_range("RUNBOX_TEST_RANGE", 7u64, 1..=10), 7);

        env::set_var("RUNBOX_TEST_GARBAGE", "ten");
        assert_eq!(parse_in_range("RUNBOX_TEST_GARBAGE", 7u64, 1..=10), 7);
    }

    #[test]
    fn test_list_splits_and_trims() {
        env::set_var("RUNBOX_TEST_LIST", "a=1, b=2,, ");
        assert_eq!(list("RUNBOX_TEST_LIST"), vec!["a=1", "b=2"]);

        env::set_var("RUNBOX_TEST_EMPTY_LIST", "  ");
        assert!(list("RUNBOX_TEST_EMPTY_LIST").is_empty());
        assert!(non_empty("RUNBOX_TEST_EMPTY_LIST").is_none());
    }
}
