//! Block digests
//!
//! The processor only sees a [`HashFunction`]; the map stores whatever string
//! it returns and compares those strings byte for byte. Two digests ship:
//! SHA-1 (40 hex chars, the default map format) and BLAKE3 (64 hex chars).

use blockdiff_core::{BlockdiffResult, HashAlgorithm};
use sha1::{Digest, Sha1};

/// Turns one block into the string recorded in the block map
pub trait HashFunction {
    fn hash_block(&self, block: &[u8]) -> BlockdiffResult<String>;
}

impl<F> HashFunction for F
where
    F: Fn(&[u8]) -> BlockdiffResult<String>,
{
    fn hash_block(&self, block: &[u8]) -> BlockdiffResult<String> {
        self(block)
    }
}

/// SHA-1, lowercase hex
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1Hasher;

impl HashFunction for Sha1Hasher {
    fn hash_block(&self, block: &[u8]) -> BlockdiffResult<String> {
        Ok(sha1_hex(block))
    }
}

/// BLAKE3, lowercase hex
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl HashFunction for Blake3Hasher {
    fn hash_block(&self, block: &[u8]) -> BlockdiffResult<String> {
        Ok(blake3_hex(block))
    }
}

/// Either built-in digest, selected at runtime from config
#[derive(Debug, Clone, Copy)]
pub struct AlgorithmHasher(pub HashAlgorithm);

impl HashFunction for AlgorithmHasher {
    fn hash_block(&self, block: &[u8]) -> BlockdiffResult<String> {
        match self.0 {
            HashAlgorithm::Sha1 => Sha1Hasher.hash_block(block),
            HashAlgorithm::Blake3 => Blake3Hasher.hash_block(block),
        }
    }
}

pub fn sha1_hex(data: &[u8]) -> String {
    format!("{:x}", Sha1::digest(data))
}

pub fn blake3_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockdiff_core::BlockdiffError;
    use proptest::prelude::*;

    #[test]
    fn sha1_known_vector() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(sha1_hex(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn digest_lengths() {
        assert_eq!(Sha1Hasher.hash_block(b"block").unwrap().len(), 40);
        assert_eq!(Blake3Hasher.hash_block(b"block").unwrap().len(), 64);
    }

    #[test]
    fn algorithm_hasher_dispatches() {
        let data = b"hello blockdiff";
        assert_eq!(
            AlgorithmHasher(HashAlgorithm::Sha1).hash_block(data).unwrap(),
            sha1_hex(data)
        );
        assert_eq!(
            AlgorithmHasher(HashAlgorithm::Blake3).hash_block(data).unwrap(),
            blake3_hex(data)
        );
    }

    #[test]
    fn closures_are_hash_functions() {
        let len_hasher = |block: &[u8]| -> BlockdiffResult<String> { Ok(block.len().to_string()) };
        assert_eq!(len_hasher.hash_block(&[0u8; 12]).unwrap(), "12");

        let failing = |_: &[u8]| -> BlockdiffResult<String> {
            Err(BlockdiffError::Other(anyhow::anyhow!("digest unavailable")))
        };
        assert!(failing.hash_block(b"x").is_err());
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(sha1_hex(b"foo"), sha1_hex(b"bar"));
        assert_ne!(blake3_hex(b"foo"), blake3_hex(b"bar"));
    }

    proptest! {
        #[test]
        fn hex_is_lowercase(data in proptest::collection::vec(any::<u8>(), 0..=1024)) {
            for hex in [sha1_hex(&data), blake3_hex(&data)] {
                prop_assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
            }
        }
    }
}
