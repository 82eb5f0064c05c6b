//! Page Cache Keys
//!
//! A listing page is identified by its `(offset, limit)` pair, serialized as
//! `"<offset>:<limit>"`. The same string names the local cache entry and the
//! ordered collection in the shared store.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Separator between the offset and limit segments
pub const KEY_SEPARATOR: char = ':';

/// Pagination request identifying one cached page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub offset: u32,
    pub limit: u32,
}

impl PageKey {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// Canonical string form of this page
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.offset, KEY_SEPARATOR, self.limit)
    }

    /// Parse and validate a page key.
    ///
    /// Accepts exactly two ASCII-digit segments with a non-zero limit; signs,
    /// whitespace and overflowing values are rejected.
    pub fn decode(key: &str) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::invalid_key(key, "key is empty"));
        }

        let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        if parts.len() != 2 {
            return Err(Error::invalid_key(
                key,
                format!("expected 2 segments, found {}", parts.len()),
            ));
        }

        let offset = parse_segment(key, "offset", parts[0])?;
        let limit = parse_segment(key, "limit", parts[1])?;
        if limit == 0 {
            return Err(Error::invalid_key(key, "limit must be greater than zero"));
        }

        Ok(Self { offset, limit })
    }
}

fn parse_segment(key: &str, name: &str, segment: &str) -> Result<u32> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_key(
            key,
            format!("{} is not a non-negative integer", name),
        ));
    }
    segment
        .parse::<u32>()
        .map_err(|e| Error::invalid_key(key, format!("{} out of range: {}", name, e)))
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.offset, KEY_SEPARATOR, self.limit)
    }
}

impl FromStr for PageKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn test_encode_format() {
        assert_eq!(PageKey::new(0, 10).encode(), "0:10");
        assert_eq!(PageKey::new(20, 10).to_string(), "20:10");
    }

    #[test]
    fn test_decode_valid() {
        assert_eq!(PageKey::decode("30:15").unwrap(), PageKey::new(30, 15));
        assert_eq!("0:1".parse::<PageKey>().unwrap(), PageKey::new(0, 1));
    }

    #[test]
    fn test_decode_empty() {
        assert_matches!(PageKey::decode(""), Err(Error::InvalidKey { .. }));
    }

    #[test]
    fn test_decode_wrong_segment_count() {
        for key in ["10", "1:2:3", ":", "0:10:", "::"] {
            assert_matches!(PageKey::decode(key), Err(Error::InvalidKey { .. }), "{}", key);
        }
    }

    #[test]
    fn test_decode_non_numeric() {
        for key in ["a:10", "0:b", "-1:10", "0:-5", "+1:10", " 1:10", "1:10 ", "1.5:10"] {
            assert_matches!(PageKey::decode(key), Err(Error::InvalidKey { .. }), "{}", key);
        }
    }

    #[test]
    fn test_decode_zero_limit() {
        assert_matches!(PageKey::decode("0:0"), Err(Error::InvalidKey { .. }));
    }

    #[test]
    fn test_decode_overflow() {
        assert_matches!(PageKey::decode("99999999999:10"), Err(Error::InvalidKey { .. }));
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trip(offset in any::<u32>(), limit in 1u32..) {
            let key = PageKey::new(offset, limit);
            prop_assert_eq!(PageKey::decode(&key.encode()).unwrap(), key);
        }

        #[test]
        fn prop_non_digit_segment_rejected(
            offset in any::<u32>(),
            junk in "[a-zA-Z_ .-]{1,6}",
        ) {
            let key = format!("{}:{}", offset, junk);
            prop_assert!(PageKey::decode(&key).is_err());
        }
    }
}
