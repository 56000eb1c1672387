//! Key encoding utilities for `RocksDB`.
//!
//! User ids are variable length, so any key that continues past a user id is
//! prefixed with the id's length to keep prefixes unambiguous.

use jarvas_core::{GenerationId, UserId};

/// Create an account key from a user ID.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create the prefix shared by all per-user keys.
///
/// Format: `len (u16 big-endian) || user_id`
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    let bytes = user_id.as_bytes();
    // MAX_USER_ID_LEN fits in a u16
    let len = u16::try_from(bytes.len()).unwrap_or(u16::MAX);
    let mut key = Vec::with_capacity(2 + bytes.len() + 16);
    key.extend_from_slice(&len.to_be_bytes());
    key.extend_from_slice(bytes);
    key
}

/// Create a generation key.
///
/// Format: `user_prefix || generation_id (16 bytes)`
///
/// Since ULIDs are time-ordered, generations for a user sort by creation time.
#[must_use]
pub fn generation_key(user_id: &UserId, generation_id: &GenerationId) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(&generation_id.to_bytes());
    key
}

/// The largest possible generation key for a user.
///
/// Format: `user_prefix || 0xFF * 16`; seeking backwards from here lands on
/// the user's newest generation.
#[must_use]
pub fn user_generations_end(user_id: &UserId) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(&[0xFF; 16]);
    key
}

/// Create a processed-event key from a processor event ID.
#[must_use]
pub fn processed_event_key(event_id: &str) -> Vec<u8> {
    event_id.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn generation_key_format() {
        let user_id = uid("abc");
        let gen_id = GenerationId::generate();
        let key = generation_key(&user_id, &gen_id);

        assert_eq!(key.len(), 2 + 3 + 16);
        assert_eq!(&key[..2], &[0, 3]);
        assert_eq!(&key[2..5], b"abc");
        assert_eq!(&key[5..], gen_id.to_bytes());
    }

    #[test]
    fn generations_end_bounds_every_generation_key() {
        let user_id = uid("abc");
        let end = user_generations_end(&user_id);

        assert!(end.starts_with(&user_prefix(&user_id)));
        assert!(generation_key(&user_id, &GenerationId::generate()) <= end);
    }

    #[test]
    fn prefixes_do_not_overlap_for_prefix_ids() {
        // "ab" must not be a key-prefix of "abc"
        let short = user_prefix(&uid("ab"));
        let long = user_prefix(&uid("abc"));
        assert!(!long.starts_with(&short));
    }
}
