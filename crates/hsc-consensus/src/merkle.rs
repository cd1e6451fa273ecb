//! Merkle root computation over transaction ids and witness ids.

use hsc_crypto::CryptoProvider;

use crate::Hash;

/// Bitcoin-style merkle root: duplicate the last node on an odd level.
/// Returns the zero hash for an empty leaf set.
pub fn merkle_root(provider: &dyn CryptoProvider, leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(&pair[0]);
                buf.extend_from_slice(&pair[1]);
                provider.blake2b_256(&buf)
            })
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsc_crypto::DefaultCryptoProvider;

    #[test]
    fn single_leaf_is_its_own_root() {
        let p = DefaultCryptoProvider;
        let leaf = p.blake2b_256(b"leaf");
        assert_eq!(merkle_root(&p, &[leaf]), leaf);
    }

    #[test]
    fn odd_count_duplicates_last() {
        let p = DefaultCryptoProvider;
        let a = p.blake2b_256(b"a");
        let b = p.blake2b_256(b"b");
        let c = p.blake2b_256(b"c");
        let with_dup = merkle_root(&p, &[a, b, c, c]);
        let without = merkle_root(&p, &[a, b, c]);
        assert_eq!(with_dup, without);
    }

    #[test]
    fn empty_is_zero_hash() {
        let p = DefaultCryptoProvider;
        assert_eq!(merkle_root(&p, &[]), [0u8; 32]);
    }
}
