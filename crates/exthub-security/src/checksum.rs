use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// First `len` hex characters of the sha256 digest, used for content-addressed ids.
pub fn short_digest(bytes: &[u8], len: usize) -> String {
    let mut digest = sha256_hex(bytes);
    digest.truncate(len.min(digest.len()));
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_matches_known_digest() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn short_digest_truncates_and_clamps() {
        assert_eq!(short_digest(b"", 16), "e3b0c44298fc1c14");
        assert_eq!(short_digest(b"", 500).len(), 64);
    }
}
