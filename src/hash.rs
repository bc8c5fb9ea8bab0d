//! Shard hashing: maps a key's first byte to a shard index.
//!
//! Deliberately a pure function of the first byte only (not a hash of the
//! whole key) — this is a preserved wire/behavioral compatibility choice,
//! not an oversight; widening it would change which keys collide, which
//! no external observer depends on, but the "invalid first byte" rejection
//! is load-bearing for SUBSCRIBE's "no such key" boundary case.

use crate::consts::N_SHARDS;

/// Shard index for `key`, or `None` if its first byte is not `a..z` or `0..9`.
#[inline]
pub fn shard_of(key: &str) -> Option<usize> {
    let first = key.as_bytes().first().copied()?;
    let lower = first.to_ascii_lowercase();
    match lower {
        b'a'..=b'z' => Some((lower - b'a') as usize),
        b'0'..=b'9' => Some((lower - b'0') as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_map_to_0_25() {
        assert_eq!(shard_of("apple"), Some(0));
        assert_eq!(shard_of("zebra"), Some(25));
        assert_eq!(shard_of("Zebra"), Some(25));
    }

    #[test]
    fn digits_map_to_0_9() {
        assert_eq!(shard_of("0value"), Some(0));
        assert_eq!(shard_of("9value"), Some(9));
    }

    #[test]
    fn invalid_first_byte_is_none() {
        assert_eq!(shard_of("!bad"), None);
        assert_eq!(shard_of(""), None);
    }

    #[test]
    fn shard_indices_fit_table() {
        for b in b'a'..=b'z' {
            let k = String::from_utf8(vec![b]).unwrap();
            assert!(shard_of(&k).unwrap() < N_SHARDS);
        }
    }
}
