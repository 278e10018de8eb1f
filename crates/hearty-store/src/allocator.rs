// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Block allocator. Scans the descriptor table in index order and picks a
//! target block for a write: first free slot, else first used slot whose
//! `file_path` matches (an idempotent replacement of an existing object),
//! else no slot.

use crate::metadata::BlockDescriptor;

/// Result of a block allocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// A previously-unused block, picked by lowest index.
    Free(usize),
    /// A used block whose `file_path` matches the candidate: the put is an
    /// idempotent replacement and the existing `object_id` is reassigned.
    Replace(usize),
}

impl Allocation {
    pub fn block_index(&self) -> usize {
        match self {
            Allocation::Free(i) | Allocation::Replace(i) => *i,
        }
    }
}

/// Chooses a target block for `file_path` against `descriptors`, scanning
/// `0..NUM_BLOCKS` in order. Lowest index wins within each tier.
pub fn allocate(descriptors: &[BlockDescriptor], file_path: &str) -> Option<Allocation> {
    for (i, d) in descriptors.iter().enumerate() {
        if !d.is_used {
            return Some(Allocation::Free(i));
        }
    }
    for (i, d) in descriptors.iter().enumerate() {
        if d.is_used && d.file_path == file_path {
            return Some(Allocation::Replace(i));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::NUM_BLOCKS;

    fn used(file_path: &str) -> BlockDescriptor {
        BlockDescriptor {
            is_used: true,
            object_id: "x".to_string(),
            data_size: 1,
            timestamp: 0,
            file_path: file_path.to_string(),
        }
    }

    #[test]
    fn picks_first_free_slot() {
        let mut descriptors = vec![BlockDescriptor::empty(); NUM_BLOCKS];
        descriptors[0] = used("/a");
        descriptors[1] = used("/b");
        assert_eq!(allocate(&descriptors, "/c"), Some(Allocation::Free(2)));
    }

    #[test]
    fn falls_back_to_path_reuse_when_full() {
        let mut descriptors: Vec<_> = (0..NUM_BLOCKS).map(|i| used(&format!("/f{i}"))).collect();
        descriptors[5].file_path = "/p".to_string();
        assert_eq!(allocate(&descriptors, "/p"), Some(Allocation::Replace(5)));
    }

    #[test]
    fn reports_no_capacity() {
        let descriptors: Vec<_> = (0..NUM_BLOCKS).map(|i| used(&format!("/f{i}"))).collect();
        assert_eq!(allocate(&descriptors, "/new"), None);
    }

    #[test]
    fn lowest_index_wins_on_tie() {
        let mut descriptors = vec![BlockDescriptor::empty(); NUM_BLOCKS];
        descriptors[10] = BlockDescriptor::empty();
        assert_eq!(allocate(&descriptors, "/anything"), Some(Allocation::Free(0)));
    }
}
