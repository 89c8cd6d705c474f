//! First-fit packer (spec.md §4.2).
//!
//! A small state machine whose only private store is a multimap keyed
//! by remaining free space. `assign` is a best-fit-by-least-remainder
//! search over that multimap: a first-fit over a sorted structure.

use std::collections::BTreeMap;

use super::BinId;
use crate::settings::Config;

/// The first-fit packer's persistent state across a sequence of
/// `assign` calls within one module-level invocation (spec.md §5).
pub struct FirstFitPacker {
    capacity: u32,
    min_function_size: u32,
    /// Remaining free space -> bins currently holding that much free
    /// space. A `Vec` handles the tie-break case (spec.md §4.2: "when
    /// multiple entries share the same free space, any may be chosen").
    by_remainder: BTreeMap<u32, Vec<BinId>>,
    next_bin: u32,
}

impl FirstFitPacker {
    pub fn new(config: &Config) -> Self {
        FirstFitPacker {
            capacity: config.bin_capacity,
            min_function_size: config.min_function_size,
            by_remainder: BTreeMap::new(),
            next_bin: 1,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Assign `size` bytes to a bin, per spec.md §4.2's five-step
    /// algorithm. Deterministic in call order; never returns bin `0`;
    /// bin ids are monotonically allocated and never reused.
    pub fn assign(&mut self, size: u32) -> BinId {
        // Step 1: find the entry with the smallest remaining free space
        // >= `size`.
        let found = self
            .by_remainder
            .range(size..)
            .next()
            .map(|(&free, _)| free);

        let (bin, free_after) = if let Some(free) = found {
            // Step 2: pop that entry.
            let bins = self.by_remainder.get_mut(&free).expect("range hit a real key");
            let bin = bins.pop().expect("multimap entries are never empty");
            if bins.is_empty() {
                self.by_remainder.remove(&free);
            }
            (bin, free - size)
        } else {
            // Step 3: no existing bin fits; force a fresh one. An
            // oversize function is not rejected — it simply claims (and
            // may overflow) a brand new bin.
            let bin = BinId::new(self.next_bin);
            self.next_bin += 1;
            let rem = size % self.capacity;
            let free = if rem == 0 { 0 } else { self.capacity - rem };
            (bin, free)
        };

        // Step 4: reinsert the bin under its new remaining free space,
        // unless that space is too small to ever hold another function.
        if free_after >= self.min_function_size {
            self.by_remainder.entry(free_after).or_default().push(bin);
        }

        bin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packer(capacity: u32) -> FirstFitPacker {
        FirstFitPacker::new(&Config::with_capacity(capacity))
    }

    /// spec.md §8 concrete scenario 4.
    #[test]
    fn first_fit_scenario() {
        let mut p = packer(4096);
        let bins: Vec<u32> = [3000u32, 3001, 3000, 100]
            .iter()
            .map(|&s| p.assign(s).as_u32())
            .collect();
        assert_eq!(bins, vec![1, 2, 3, 2]);
    }

    /// spec.md §8 concrete scenario 5.
    #[test]
    fn oversize_functions_each_claim_a_fresh_bin() {
        let mut p = packer(4096);
        let bins: Vec<u32> = [4096u32, 8192, 1]
            .iter()
            .map(|&s| p.assign(s).as_u32())
            .collect();
        assert_eq!(bins, vec![1, 2, 3]);
    }

    /// spec.md §8 P7: bin ids are never zero, and never reused.
    #[test]
    fn bin_ids_are_nonzero_and_monotonic() {
        let mut p = packer(4096);
        let mut seen = Vec::new();
        for size in [10, 4090, 10, 4000, 50] {
            let bin = p.assign(size);
            assert_ne!(bin.as_u32(), 0);
            seen.push(bin.as_u32());
        }
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        sorted.dedup();
        // Every newly-forced bin strictly increases `next_bin`; reused
        // bins (co-packed requests) repeat a prior id rather than
        // skipping or going backwards.
        assert!(sorted.windows(2).all(|w| w[0] < w[1]));
    }

    /// spec.md §8 P7: two requests sharing a bin never together exceed
    /// capacity, unless one of them was already oversize on its own.
    #[test]
    fn shared_bins_never_overflow_capacity() {
        let capacity = 4096u32;
        let mut p = packer(capacity);
        let sizes = [3000u32, 3001, 3000, 100, 50, 4096, 1];
        let mut per_bin: std::collections::HashMap<u32, Vec<u32>> = std::collections::HashMap::new();
        for &size in &sizes {
            let bin = p.assign(size).as_u32();
            per_bin.entry(bin).or_default().push(size);
        }
        for sizes_in_bin in per_bin.values() {
            if sizes_in_bin.len() < 2 {
                continue;
            }
            if sizes_in_bin.iter().any(|&s| s >= capacity) {
                continue;
            }
            let total: u32 = sizes_in_bin.iter().sum();
            assert!(total <= capacity, "bin holds {sizes_in_bin:?} summing to {total}");
        }
    }
}
