//! Radix tree based PID registry
//!
//! PID allocation, recycling, and pid-to-slot lookup. A bitmap tracks
//! which pids are in use; a fixed-pool radix tree maps live pids to
//! their arena slots in O(levels).
//!
//! The tree uses 16-way branching (4 bits per level, 3 levels), which
//! exactly covers the `0..=MAX_PID` space. Leaf nodes are returned to
//! a free list on removal, so the pool is sized once and can never be
//! exhausted by pid churn.
//!
//! Allocation marches forward from a rotating hint and wraps, so a
//! freed pid is not handed out again until the rest of the space has
//! been used. That keeps stale pid holders from silently addressing a
//! fresh task.

use static_assertions::const_assert_eq;

use crate::config::{MAX_PID, MAX_TASKS};
use crate::errno::{Errno, KernResult};
use crate::kwarn;
use crate::sched::types::{Pid, TaskId};

/// Words in the allocation bitmap; 64 pids per word.
const PID_BITMAP_WORDS: usize = 64;

/// Bits consumed per radix tree level.
const RADIX_BITS: usize = 4;

/// Children per node (2^4 = 16).
const RADIX_CHILDREN: usize = 1 << RADIX_BITS;

/// Mask for extracting one level's radix index.
const RADIX_MASK: u32 = (RADIX_CHILDREN - 1) as u32;

/// Interior levels walked before the leaf (12 bits / 4 bits = 3).
const RADIX_LEVELS: usize = 3;

/// Node pool size: every possible interior node plus one leaf per
/// live task. Leaves are recycled, so this bound is permanent.
const MAX_RADIX_NODES: usize =
    1 + RADIX_CHILDREN + RADIX_CHILDREN * RADIX_CHILDREN + MAX_TASKS;

/// Leaf marker for "no slot stored".
const NO_SLOT: u16 = u16::MAX;

// The bitmap and the tree must agree on the pid space.
const_assert_eq!(PID_BITMAP_WORDS * 64, (MAX_PID as usize) + 1);
const_assert_eq!(1usize << (RADIX_BITS * RADIX_LEVELS), (MAX_PID as usize) + 1);

// ============================================================
// Bitmap allocator
// ============================================================

struct PidAllocator {
    /// One bit per pid; set = allocated.
    bitmap: [u64; PID_BITMAP_WORDS],
    /// Where the next forward search starts.
    next_hint: Pid,
    allocated_count: u32,
}

impl PidAllocator {
    const fn new() -> Self {
        Self {
            bitmap: [0u64; PID_BITMAP_WORDS],
            next_hint: 0,
            allocated_count: 0,
        }
    }

    #[inline]
    fn is_allocated(&self, pid: Pid) -> bool {
        if pid > MAX_PID {
            return false;
        }
        let word_idx = (pid / 64) as usize;
        let bit_idx = pid % 64;
        (self.bitmap[word_idx] & (1 << bit_idx)) != 0
    }

    #[inline]
    fn mark_allocated(&mut self, pid: Pid) -> bool {
        if pid > MAX_PID {
            return false;
        }
        let word_idx = (pid / 64) as usize;
        let bit_idx = pid % 64;
        if (self.bitmap[word_idx] & (1 << bit_idx)) != 0 {
            return false;
        }
        self.bitmap[word_idx] |= 1 << bit_idx;
        self.allocated_count += 1;
        true
    }

    #[inline]
    fn mark_free(&mut self, pid: Pid) -> bool {
        if pid > MAX_PID {
            return false;
        }
        let word_idx = (pid / 64) as usize;
        let bit_idx = pid % 64;
        if (self.bitmap[word_idx] & (1 << bit_idx)) == 0 {
            return false;
        }
        self.bitmap[word_idx] &= !(1 << bit_idx);
        self.allocated_count -= 1;
        // The hint is not pulled back: freed pids wait for wraparound.
        true
    }

    /// Finds and allocates the next free pid at or after the hint,
    /// wrapping around once.
    fn allocate_next(&mut self) -> Option<Pid> {
        let start_word = (self.next_hint / 64) as usize;
        let start_bit = self.next_hint % 64;

        // Forward pass. Bits below the hint in the start word are
        // treated as taken so recently freed pids age before reuse.
        for word_idx in start_word..PID_BITMAP_WORDS {
            let mut word = self.bitmap[word_idx];
            if word_idx == start_word && start_bit != 0 {
                word |= (1u64 << start_bit) - 1;
            }
            if word == u64::MAX {
                continue;
            }
            let bit = (!word).trailing_zeros() as Pid;
            let pid = (word_idx as Pid) * 64 + bit;
            if self.mark_allocated(pid) {
                self.advance_hint(pid);
                return Some(pid);
            }
        }

        // Wraparound pass over the whole map, picking up anything the
        // masked start word skipped.
        for word_idx in 0..=start_word {
            let word = self.bitmap[word_idx];
            if word == u64::MAX {
                continue;
            }
            let bit = (!word).trailing_zeros() as Pid;
            let pid = (word_idx as Pid) * 64 + bit;
            if self.mark_allocated(pid) {
                self.advance_hint(pid);
                return Some(pid);
            }
        }

        None
    }

    #[inline]
    fn advance_hint(&mut self, pid: Pid) {
        self.next_hint = if pid == MAX_PID { 0 } else { pid + 1 };
    }

    #[inline]
    fn count(&self) -> u32 {
        self.allocated_count
    }
}

// ============================================================
// Radix tree
// ============================================================

#[derive(Clone, Copy)]
struct RadixNode {
    /// Child node indices; 0 means empty (node 0 is the root, which
    /// is never a child).
    children: [u16; RADIX_CHILDREN],
    /// Arena slot stored at this node (leaf nodes only).
    slot: u16,
}

impl RadixNode {
    const fn empty() -> Self {
        Self {
            children: [0; RADIX_CHILDREN],
            slot: NO_SLOT,
        }
    }
}

struct PidRadixTree {
    nodes: [RadixNode; MAX_RADIX_NODES],
    /// High-water mark; node 0 is always the root.
    node_count: usize,
    /// Head of the freed-leaf list, chained through `children[0]`.
    /// 0 means the list is empty.
    free_head: u16,
}

impl PidRadixTree {
    const fn new() -> Self {
        Self {
            nodes: [RadixNode::empty(); MAX_RADIX_NODES],
            node_count: 1,
            free_head: 0,
        }
    }

    fn alloc_node(&mut self) -> Option<u16> {
        if self.free_head != 0 {
            let idx = self.free_head;
            self.free_head = self.nodes[idx as usize].children[0];
            self.nodes[idx as usize] = RadixNode::empty();
            return Some(idx);
        }
        if self.node_count >= MAX_RADIX_NODES {
            return None;
        }
        let idx = self.node_count;
        self.nodes[idx] = RadixNode::empty();
        self.node_count += 1;
        Some(idx as u16)
    }

    fn free_node(&mut self, idx: u16) {
        self.nodes[idx as usize] = RadixNode::empty();
        self.nodes[idx as usize].children[0] = self.free_head;
        self.free_head = idx;
    }

    /// Radix index of `pid` at `level` (0 = most significant).
    #[inline]
    fn radix_index(pid: Pid, level: usize) -> usize {
        let shift = (RADIX_LEVELS - 1 - level) * RADIX_BITS;
        ((pid >> shift) & RADIX_MASK) as usize
    }

    /// Inserts a pid -> slot mapping, creating path nodes as needed.
    fn insert(&mut self, pid: Pid, slot: u16) -> bool {
        let mut node_idx: usize = 0;

        for level in 0..(RADIX_LEVELS - 1) {
            let radix_idx = Self::radix_index(pid, level);
            let child_idx = self.nodes[node_idx].children[radix_idx];

            if child_idx == 0 {
                let Some(new_idx) = self.alloc_node() else {
                    return false;
                };
                self.nodes[node_idx].children[radix_idx] = new_idx;
                node_idx = new_idx as usize;
            } else {
                node_idx = child_idx as usize;
            }
        }

        let leaf_radix_idx = Self::radix_index(pid, RADIX_LEVELS - 1);
        let child_idx = self.nodes[node_idx].children[leaf_radix_idx];

        if child_idx == 0 {
            let Some(new_idx) = self.alloc_node() else {
                return false;
            };
            self.nodes[new_idx as usize].slot = slot;
            self.nodes[node_idx].children[leaf_radix_idx] = new_idx;
        } else {
            self.nodes[child_idx as usize].slot = slot;
        }

        true
    }

    fn lookup(&self, pid: Pid) -> Option<u16> {
        let mut node_idx: usize = 0;

        for level in 0..RADIX_LEVELS {
            let radix_idx = Self::radix_index(pid, level);
            let child_idx = self.nodes[node_idx].children[radix_idx];

            if child_idx == 0 {
                return None;
            }
            node_idx = child_idx as usize;
        }

        let slot = self.nodes[node_idx].slot;
        if slot == NO_SLOT {
            None
        } else {
            Some(slot)
        }
    }

    /// Removes a pid mapping and recycles its leaf node. Interior
    /// nodes stay; their total is bounded by the tree geometry.
    fn remove(&mut self, pid: Pid) -> Option<u16> {
        let mut node_idx: usize = 0;
        let mut parent_idx: usize = 0;
        let mut parent_radix = 0usize;

        for level in 0..RADIX_LEVELS {
            let radix_idx = Self::radix_index(pid, level);
            let child_idx = self.nodes[node_idx].children[radix_idx];

            if child_idx == 0 {
                return None;
            }
            parent_idx = node_idx;
            parent_radix = radix_idx;
            node_idx = child_idx as usize;
        }

        let old_slot = self.nodes[node_idx].slot;
        if old_slot == NO_SLOT {
            return None;
        }
        self.nodes[parent_idx].children[parent_radix] = 0;
        self.free_node(node_idx as u16);
        Some(old_slot)
    }
}

// ============================================================
// Registry
// ============================================================

/// Combined pid allocator and lookup tree, owned by the scheduler
/// state and mutated only inside the critical section.
pub struct PidRegistry {
    allocator: PidAllocator,
    tree: PidRadixTree,
}

impl PidRegistry {
    pub const fn new() -> Self {
        Self {
            allocator: PidAllocator::new(),
            tree: PidRadixTree::new(),
        }
    }

    /// Allocates a fresh pid and maps it to `slot`.
    pub fn allocate(&mut self, slot: TaskId) -> KernResult<Pid> {
        let Some(pid) = self.allocator.allocate_next() else {
            kwarn!("pid space exhausted ({} live)", self.allocator.count());
            return Err(Errno::TryAgain);
        };
        if !self.tree.insert(pid, slot.0) {
            self.allocator.mark_free(pid);
            return Err(Errno::OutOfMemory);
        }
        Ok(pid)
    }

    /// Claims a specific pid (idle task bring-up). Fails with `EBUSY`
    /// if the pid is already taken.
    pub fn allocate_specific(&mut self, pid: Pid, slot: TaskId) -> KernResult<()> {
        if pid > MAX_PID {
            return Err(Errno::InvalidArgument);
        }
        if !self.allocator.mark_allocated(pid) {
            return Err(Errno::Busy);
        }
        if !self.tree.insert(pid, slot.0) {
            self.allocator.mark_free(pid);
            return Err(Errno::OutOfMemory);
        }
        Ok(())
    }

    /// Releases a pid for eventual reuse and drops its mapping.
    pub fn free(&mut self, pid: Pid) {
        if self.allocator.mark_free(pid) {
            self.tree.remove(pid);
        }
    }

    /// Resolves a live pid to its arena slot. Out-of-range pids miss;
    /// the radix walk only sees the low bits, so without this bound a
    /// stale pid above `MAX_PID` would alias onto a live one.
    pub fn lookup(&self, pid: Pid) -> Option<TaskId> {
        if pid > MAX_PID {
            return None;
        }
        self.tree.lookup(pid).map(TaskId)
    }

    pub fn is_allocated(&self, pid: Pid) -> bool {
        self.allocator.is_allocated(pid)
    }

    pub fn live_count(&self) -> u32 {
        self.allocator.count()
    }
}
