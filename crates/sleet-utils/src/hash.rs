use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha512};

/// Name of the algorithm reported alongside [`sha512_base64`] digests.
pub const HASH_ALGORITHM: &str = "SHA512";

/// Computes the SHA-512 digest of `bytes` encoded as standard base64.
///
/// This is the `packageHash` format used by NuGet catalog and registration documents.
///
/// # Example
///
/// ```
/// use sleet_utils::hash::sha512_base64;
///
/// let hash = sha512_base64(b"");
/// assert!(hash.starts_with("z4PhNX7vuL3x"));
/// ```
pub fn sha512_base64(bytes: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(bytes);
    STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha512_of_empty_input() {
        assert_eq!(
            sha512_base64(b""),
            "z4PhNX7vuL3xVChQ1m2AB9Yg5AULVxXcg/SpIdNs6c5H0NE8XYXysP+DGNKHfuwvY7kxvUdBeoGlODJ6+SfaPg=="
        );
    }
}
