//! Scheduler type definitions
//!
//! Core vocabulary shared by the scheduler modules: id types, state
//! enums, the CPU affinity mask, and per-task flag bits.

use bitflags::bitflags;

/// Process/thread ID. Unique among live tasks; recycled slowly after
/// release (see `sched::pid`).
pub type Pid = u32;

/// Handle to a slot in the task arena. "Next task in list" is one of
/// these, never a pointer, so list links cannot dangle past a
/// `reap_task`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u16);

impl TaskId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Task state enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// On a CPU's assigned list, not at the head.
    Ready,
    /// At the head of a CPU's assigned list.
    Running,
    /// Waiting on a semaphore, message queue, or sleep; on no list.
    Blocked,
    /// Explicitly stopped; on no list until resumed.
    Suspended,
    /// Exited; slot held only until reaped.
    Terminated,
}

/// Runtime state of one CPU.
///
/// Only `Running` CPUs accept task assignments; `Halted` and `Hotplug`
/// CPUs keep their idle task and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Running,
    Halted,
    Hotplug,
}

bitflags! {
    /// Per-task flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TcbFlags: u8 {
        /// This is a CPU's idle task, the permanent tail of its list.
        const IDLE = 1 << 0;
        /// Asynchronous cancellation requested; the task observes the
        /// flag at its next cancellation point.
        const CANCEL_PENDING = 1 << 1;
    }
}

/// CPU affinity mask, bit `i` = CPU `i` allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuMask(u32);

impl CpuMask {
    pub const EMPTY: Self = Self(0);

    /// Mask allowing the first `ncpus` CPUs, saturating at the mask
    /// width.
    pub const fn all(ncpus: usize) -> Self {
        if ncpus >= 32 {
            Self(u32::MAX)
        } else {
            Self((1u32 << ncpus) - 1)
        }
    }

    /// Mask allowing exactly one CPU. Out-of-width indices give the
    /// empty mask.
    pub const fn single(cpu: usize) -> Self {
        if cpu < 32 {
            Self(1u32 << cpu)
        } else {
            Self::EMPTY
        }
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_set(self, cpu: usize) -> bool {
        cpu < 32 && self.0 & (1u32 << cpu) != 0
    }

    pub fn set(&mut self, cpu: usize) {
        if cpu < 32 {
            self.0 |= 1u32 << cpu;
        }
    }

    pub fn clear(&mut self, cpu: usize) {
        if cpu < 32 {
            self.0 &= !(1u32 << cpu);
        }
    }

    pub const fn first_set(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates the set bit positions in ascending order.
    pub fn iter_set(self) -> SetBits {
        SetBits(self.0)
    }
}

/// Iterator over the set bits of a [`CpuMask`].
pub struct SetBits(u32);

impl Iterator for SetBits {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}
