use sha2::{Digest, Sha256};

/// Digest of the raw upload bytes, used as the receipt dedup key.
///
/// Hashing always consumes a complete, immutable buffer. Callers that read
/// an upload from a stream must collect it into memory first and hand the
/// same buffer to the hasher and to downstream consumers.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
