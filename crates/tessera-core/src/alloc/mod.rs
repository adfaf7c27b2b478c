//! Allocation and collection types.
//!
//! - Re-exports of hash collections using AHash
//! - [`SparseSet`](sparse_set::SparseSet), a slab addressed by generational handles

pub mod sparse_set;

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};
pub use sparse_set::{IndexSlot, SparseSet};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_keyed_by_slot() {
        let mut map = HashMap::new();
        let slot = IndexSlot::new(3, 7);
        map.insert(slot, "op");
        assert_eq!(map.get(&slot), Some(&"op"));
        assert_eq!(map.get(&IndexSlot::new(4, 7)), None);
    }
}
