//! Cryptography provider interface for the chain core.
//!
//! Consensus and store code depend only on this narrow interface, never on a
//! concrete hash or signature backend directly — that keeps the consensus
//! crate free of a hard dependency on any one crypto library and gives
//! callers (tests, alternate backends) a seam to substitute at.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("digest must be 32 bytes")]
    BadDigestLength,
}

/// Narrow crypto surface the consensus-critical core depends on.
///
/// `name_hash` is the one-way function binding a UTF-8 name to its 32-byte
/// trie key (blake2b-256 of the lowercased name, matching the upstream
/// network's `hash-name` construction). `blake2b_256`/`blake2b_512` back the
/// trie's node hashing and the block/tx id functions. `verify_secp256k1`
/// backs P2PKH/P2SH-style witness verification for standard outputs.
pub trait CryptoProvider: Send + Sync {
    fn blake2b_256(&self, input: &[u8]) -> [u8; 32];
    fn blake2b_512(&self, input: &[u8]) -> [u8; 64];
    fn sha256(&self, input: &[u8]) -> [u8; 32];
    fn hash160(&self, input: &[u8]) -> [u8; 20];

    fn name_hash(&self, name: &str) -> [u8; 32] {
        self.blake2b_256(name.to_ascii_lowercase().as_bytes())
    }

    fn verify_secp256k1(
        &self,
        pubkey: &[u8],
        sig: &[u8],
        digest32: &[u8; 32],
    ) -> Result<bool, CryptoError>;
}

/// Production crypto provider backed by `blake2`, `sha2`, and `secp256k1`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCryptoProvider;

impl CryptoProvider for DefaultCryptoProvider {
    fn blake2b_256(&self, input: &[u8]) -> [u8; 32] {
        use blake2::Digest;
        let mut h = blake2::Blake2b::<blake2::digest::consts::U32>::new();
        h.update(input);
        let out = h.finalize();
        let mut r = [0u8; 32];
        r.copy_from_slice(&out);
        r
    }

    fn blake2b_512(&self, input: &[u8]) -> [u8; 64] {
        use blake2::Digest;
        let mut h = blake2::Blake2b512::new();
        h.update(input);
        let out = h.finalize();
        let mut r = [0u8; 64];
        r.copy_from_slice(&out);
        r
    }

    fn sha256(&self, input: &[u8]) -> [u8; 32] {
        use sha2::Digest;
        let mut h = sha2::Sha256::new();
        h.update(input);
        let out = h.finalize();
        let mut r = [0u8; 32];
        r.copy_from_slice(&out);
        r
    }

    fn hash160(&self, input: &[u8]) -> [u8; 20] {
        // blake2b-256 then truncate the way this network derives 20-byte
        // program hashes (bitcoin-style ripemd160(sha256(x)) is not used here).
        let inner = self.blake2b_256(input);
        let outer = self.sha256(&inner);
        let mut r = [0u8; 20];
        r.copy_from_slice(&outer[..20]);
        r
    }

    fn verify_secp256k1(
        &self,
        pubkey: &[u8],
        sig: &[u8],
        digest32: &[u8; 32],
    ) -> Result<bool, CryptoError> {
        let pk =
            secp256k1::PublicKey::from_slice(pubkey).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = secp256k1::ecdsa::Signature::from_der(sig)
            .or_else(|_| secp256k1::ecdsa::Signature::from_compact(sig))
            .map_err(|_| CryptoError::InvalidSignature)?;
        let msg =
            secp256k1::Message::from_slice(digest32).map_err(|_| CryptoError::BadDigestLength)?;
        Ok(secp256k1::global::SECP256K1
            .verify_ecdsa(&msg, &sig, &pk)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hash_is_case_insensitive() {
        let p = DefaultCryptoProvider;
        assert_eq!(p.name_hash("Example"), p.name_hash("example"));
    }

    #[test]
    fn blake2b_256_is_deterministic_and_32_bytes() {
        let p = DefaultCryptoProvider;
        let a = p.blake2b_256(b"hello");
        let b = p.blake2b_256(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, p.blake2b_256(b"hellp"));
    }

    #[test]
    fn hash160_is_20_bytes_and_deterministic() {
        let p = DefaultCryptoProvider;
        let a = p.hash160(b"program");
        assert_eq!(a.len(), 20);
        assert_eq!(a, p.hash160(b"program"));
    }
}
