//! Bloom filter used as the cheap pre-check in front of the exact
//! watched-address set
//!
//! Sizing:
//! - m = ceil(-n * ln(p) / ln(2)^2)
//! - k = ceil((m / n) * ln(2))
//!
//! Positions use double hashing over MurmurHash3: h(i) = h1 + i * h2.

use bitvec::prelude::*;
use std::f64::consts::LN_2;
use std::io::Cursor;

/// Probabilistic set membership. No false negatives.
#[derive(Clone, Debug)]
pub struct BloomFilter {
    bits: BitVec<u64, Lsb0>,
    /// Number of hash functions (k)
    k: usize,
    /// Size in bits (m)
    m: usize,
}

impl BloomFilter {
    /// Create an empty filter with `m` bits and `k` hash functions.
    pub fn new(m: usize, k: usize) -> Self {
        let m = m.max(1);
        Self {
            bits: bitvec![u64, Lsb0; 0; m],
            k: k.max(1),
            m,
        }
    }

    /// Create an empty filter sized for `expected` items at false
    /// positive rate `p`. `expected` is clamped to at least 1.
    pub fn with_rate(expected: usize, p: f64) -> Self {
        let (m, k) = optimal_parameters(expected, p);
        Self::new(m, k)
    }

    pub fn insert(&mut self, item: &[u8]) {
        for pos in positions(item, self.k, self.m) {
            self.bits.set(pos, true);
        }
    }

    /// `false` means the item was definitely never inserted.
    pub fn contains(&self, item: &[u8]) -> bool {
        positions(item, self.k, self.m).all(|pos| self.bits[pos])
    }

    pub fn size_bits(&self) -> usize {
        self.m
    }

    pub fn hash_count(&self) -> usize {
        self.k
    }

    pub fn bits_set(&self) -> usize {
        self.bits.count_ones()
    }
}

/// Bit-array size and hash count for `n` items at rate `p`.
pub fn optimal_parameters(n: usize, p: f64) -> (usize, usize) {
    let n = n.max(1) as f64;
    let m = (-n * p.ln() / (LN_2 * LN_2)).ceil().max(1.0);
    let k = ((m / n) * LN_2).ceil().max(1.0);
    (m as usize, k as usize)
}

fn murmur_hash(item: &[u8], seed: u32) -> u64 {
    let mut cursor = Cursor::new(item);
    // Reading from an in-memory cursor cannot fail
    murmur3::murmur3_x64_128(&mut cursor, seed).unwrap_or(0) as u64
}

fn positions(item: &[u8], k: usize, m: usize) -> impl Iterator<Item = usize> {
    let h1 = murmur_hash(item, 0);
    let h2 = murmur_hash(item, 1);
    (0..k).map(move |i| {
        let hash = h1.wrapping_add((i as u64).wrapping_mul(h2));
        (hash % m as u64) as usize
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimal_parameters() {
        // n = 1000, p = 0.01 -> m = 9586, k = 7
        assert_eq!(optimal_parameters(1000, 0.01), (9586, 7));
        // empty set is sized as a single item
        assert_eq!(optimal_parameters(0, 0.01), optimal_parameters(1, 0.01));
    }

    #[test]
    fn test_no_false_negatives() {
        for &(n, p) in &[(1usize, 0.5), (10, 0.1), (500, 0.01), (2000, 0.001)] {
            let mut bloom = BloomFilter::with_rate(n, p);
            let items: Vec<String> = (0..n).map(|i| format!("item-{}", i)).collect();
            for item in &items {
                bloom.insert(item.as_bytes());
            }
            for item in &items {
                assert!(bloom.contains(item.as_bytes()), "n={} p={} lost {}", n, p, item);
            }
        }
    }

    #[test]
    fn test_empty_filter_contains_nothing() {
        let bloom = BloomFilter::with_rate(0, 0.01);
        assert!(!bloom.contains(b"anything"));
        assert_eq!(bloom.bits_set(), 0);
    }

    #[test]
    fn test_degenerate_sizes_clamped() {
        let bloom = BloomFilter::new(0, 0);
        assert_eq!(bloom.size_bits(), 1);
        assert_eq!(bloom.hash_count(), 1);
    }
}
