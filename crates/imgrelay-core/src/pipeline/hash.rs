//! Content fingerprints for correlating redeliveries of the same source.

use blake3::Hasher;

/// BLAKE3 digest of `data` as lowercase hex.
pub fn content_digest(data: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(content_digest(b"cat"), content_digest(b"cat"));
        assert_eq!(content_digest(b"cat").len(), 64);
    }

    #[test]
    fn test_digest_differs_per_content() {
        assert_ne!(content_digest(b"cat"), content_digest(b"dog"));
    }
}
