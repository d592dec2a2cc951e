//! Reversible byte encoding and hexastore key construction (C1).
//!
//! `encode`/`decode` guarantee `decode(encode(v)) == v` for any byte string,
//! including ones that contain the separator or escape byte themselves.
//! Index keys are built as fixed-order concatenations of encoded fields,
//! always prefixed by a 3-byte ASCII tag identifying which of the six
//! hexastore orderings the key belongs to.

use thiserror::Error;

/// Two-byte separator token. Both bytes are identical so that escaping its
/// first byte is sufficient to remove every unescaped occurrence.
pub const SEPARATOR: &[u8] = b"::";
const SEP_HEAD: u8 = b':';
const ESCAPE: u8 = b'\\';

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("dangling escape byte at end of encoded value")]
    DanglingEscape,
    #[error("invalid escape sequence")]
    InvalidEscape,
}

/// Escapes `value` so the result never contains an unescaped separator byte.
pub fn encode(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for &b in value {
        match b {
            ESCAPE => out.extend_from_slice(&[ESCAPE, ESCAPE]),
            SEP_HEAD => out.extend_from_slice(&[ESCAPE, SEP_HEAD]),
            _ => out.push(b),
        }
    }
    out
}

/// Inverse of [`encode`].
pub fn decode(encoded: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(encoded.len());
    let mut iter = encoded.iter().copied();
    while let Some(b) = iter.next() {
        if b == ESCAPE {
            match iter.next() {
                Some(ESCAPE) => out.push(ESCAPE),
                Some(SEP_HEAD) => out.push(SEP_HEAD),
                Some(_) => return Err(CodecError::InvalidEscape),
                None => return Err(CodecError::DanglingEscape),
            }
        } else {
            out.push(b);
        }
    }
    Ok(out)
}

/// Appends `‖ SEPARATOR ‖ encode(field)` to `out` for a single key field.
pub fn push_field(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(SEPARATOR);
    out.extend_from_slice(&encode(field));
}

/// Builds a full index key: `tag ‖ S ‖ encode(a) ‖ S ‖ encode(b) ‖ S ‖ encode(c)`.
pub fn build_key(tag: &[u8], fields: [&[u8]; 3]) -> Vec<u8> {
    let mut out = Vec::with_capacity(tag.len() + fields.iter().map(|f| f.len() + 4).sum::<usize>());
    out.extend_from_slice(tag);
    for field in fields {
        push_field(&mut out, field);
    }
    out
}

/// Builds the scan prefix for a partially-bound key: only the leading
/// `n_exact` fields are appended, matching C1's "stop at the first
/// non-Exact position" rule.
pub fn build_prefix(tag: &[u8], leading_exact: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(tag.len() + leading_exact.iter().map(|f| f.len() + 4).sum::<usize>());
    out.extend_from_slice(tag);
    for field in leading_exact {
        push_field(&mut out, field);
    }
    out
}

/// The lexicographic successor of `prefix`: the smallest byte string that is
/// strictly greater than every string starting with `prefix`.
///
/// Returns `None` when `prefix` has no successor (it's empty, or entirely
/// `0xFF` bytes) — callers should treat that as an unbounded upper edge of
/// the keyspace.
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut successor = prefix.to_vec();
    while let Some(&last) = successor.last() {
        if last == 0xFF {
            successor.pop();
        } else {
            *successor.last_mut().unwrap() += 1;
            return Some(successor);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn roundtrip_plain_value() {
        let v = b"alice".to_vec();
        assert_eq!(decode(&encode(&v)).unwrap(), v);
    }

    #[test]
    fn roundtrip_value_with_separator_and_escape() {
        let v = b"a:b\\c::d".to_vec();
        let encoded = encode(&v);
        assert!(!contains_unescaped_separator(&encoded));
        assert_eq!(decode(&encoded).unwrap(), v);
    }

    fn contains_unescaped_separator(encoded: &[u8]) -> bool {
        let mut i = 0;
        while i < encoded.len() {
            if encoded[i] == ESCAPE {
                i += 2;
                continue;
            }
            if encoded[i] == SEP_HEAD {
                return true;
            }
            i += 1;
        }
        false
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_bytes(v in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assert_eq!(decode(&encode(&v)).unwrap(), v);
        }
    }

    #[test]
    fn prefix_successor_increments_last_byte() {
        assert_eq!(prefix_upper_bound(b"spo"), Some(b"spp".to_vec()));
    }

    #[test]
    fn prefix_successor_handles_trailing_ff() {
        assert_eq!(prefix_upper_bound(&[1, 0xFF, 0xFF]), Some(vec![2]));
    }

    #[test]
    fn prefix_successor_none_for_all_ff() {
        assert_eq!(prefix_upper_bound(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn build_key_matches_layout() {
        let key = build_key(b"spo", [b"a", b"b", b"c"]);
        assert_eq!(key, b"spo::a::b::c".to_vec());
    }
}
