use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Stable file name for a cached download, derived from its URL or path.
/// Blake3 truncated to 16 bytes, base64url without padding (~22 characters).
pub fn cache_key(reference: &str) -> String {
    let hash = blake3::hash(reference.as_bytes());
    URL_SAFE_NO_PAD.encode(&hash.as_bytes()[..16])
}
