use sha2::{Digest, Sha256};
use url::Url;

/// Width of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 64;

/// Canonical form of an article URL: trimmed, fragment removed, scheme and
/// host lowercased by the parser. Unparseable input is only trimmed.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

/// SHA-256 hex digest of the normalized URL. This is the dedup key.
pub fn fingerprint(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(url).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_and_whitespace_do_not_change_fingerprint() {
        let a = fingerprint("https://www.bbc.co.uk/news/world-1");
        let b = fingerprint("  HTTPS://WWW.BBC.CO.UK/news/world-1#comments ");
        assert_eq!(a, b);
    }

    #[test]
    fn path_case_is_significant() {
        assert_ne!(
            fingerprint("https://example.com/Story"),
            fingerprint("https://example.com/story")
        );
    }
}
