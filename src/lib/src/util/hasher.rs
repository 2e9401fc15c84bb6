//! Content hashing. Chunk addresses are SHA-512 truncated to 20 bytes;
//! equality of address is equality of content.

use sha2::{Digest, Sha512};

use crate::model::Hash;

pub fn hash_buffer(buffer: &[u8]) -> Hash {
    let digest = Sha512::digest(buffer);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Hash(bytes)
}

pub fn hash_buffers(buffers: &[&[u8]]) -> Hash {
    let mut hasher = Sha512::new();
    for b in buffers {
        hasher.update(b);
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Hash(bytes)
}

/// Stable 64-bit hash used for column tag allocation. Derived from the same
/// digest family as chunk addresses so tags are reproducible across builds.
pub fn hash_u64(buffer: &[u8]) -> u64 {
    let digest = Sha512::digest(buffer);
    u64::from_be_bytes(digest[..8].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_buffer_is_deterministic() {
        assert_eq!(hash_buffer(b"hello"), hash_buffer(b"hello"));
        assert_ne!(hash_buffer(b"hello"), hash_buffer(b"world"));
    }

    #[test]
    fn test_hash_buffers_matches_concatenation() {
        assert_eq!(hash_buffers(&[b"foo", b"bar"]), hash_buffer(b"foobar"));
    }
}
