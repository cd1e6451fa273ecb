//! Recent-reject filter: a small rolling Bloom filter keyed on txid, so a
//! transaction that just failed verification isn't re-verified on every
//! repeat announcement from a peer. Cleared wholesale on every connected
//! block, since a reject's cause (a missing input, a stale sequence lock)
//! can evaporate the moment the chain moves.
//!
//! No Bloom filter crate in this workspace's dependency lineage is a fit
//! here — hashing is already done for us (callers key on a 32-byte txid),
//! so this is a direct bit-array filter over that hash rather than a
//! general-purpose string/byte filter pulled in as a dependency.

const HASHES: usize = 4;

pub struct RejectFilter {
    bits: Vec<u64>,
    bit_len: usize,
    len: usize,
}

impl RejectFilter {
    /// `capacity` is the expected number of entries; the bit array is sized
    /// for roughly a 1-in-1000 false positive rate at that load.
    pub fn new(capacity: usize) -> Self {
        let bits_needed = (capacity.max(1) * 15).next_power_of_two();
        RejectFilter {
            bits: vec![0u64; bits_needed / 64 + 1],
            bit_len: bits_needed,
            len: 0,
        }
    }

    fn slots(&self, hash: &[u8; 32]) -> [usize; HASHES] {
        let h1 = u64::from_le_bytes(hash[0..8].try_into().unwrap());
        let h2 = u64::from_le_bytes(hash[8..16].try_into().unwrap());
        std::array::from_fn(|k| {
            let combined = h1.wrapping_add(h2.wrapping_mul(k as u64 + 1));
            (combined as usize) % self.bit_len
        })
    }

    pub fn insert(&mut self, hash: &[u8; 32]) {
        for slot in self.slots(hash) {
            let (word, bit) = (slot / 64, slot % 64);
            self.bits[word] |= 1 << bit;
        }
        self.len += 1;
    }

    pub fn contains(&self, hash: &[u8; 32]) -> bool {
        self.slots(hash)
            .iter()
            .all(|&slot| self.bits[slot / 64] & (1 << (slot % 64)) != 0)
    }

    pub fn reset(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_hash_is_reported_present() {
        let mut f = RejectFilter::new(100);
        let h = [7u8; 32];
        assert!(!f.contains(&h));
        f.insert(&h);
        assert!(f.contains(&h));
    }

    #[test]
    fn reset_clears_every_entry() {
        let mut f = RejectFilter::new(100);
        f.insert(&[1u8; 32]);
        f.insert(&[2u8; 32]);
        f.reset();
        assert!(f.is_empty());
        assert!(!f.contains(&[1u8; 32]));
    }
}
