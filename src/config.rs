//! Compile-time capacities and runtime scheduler configuration
//!
//! All tables in this crate are fixed-size: the task arena, the PID
//! space, the per-CPU slots, and the IRQ vector table are dimensioned
//! here and never grow at runtime.

use static_assertions::const_assert;

use crate::errno::{Errno, KernResult};

// ============================================================
// CPU limits
// ============================================================

/// Maximum number of CPUs a build can address. The affinity mask is a
/// `u32`, so this cannot exceed 32.
#[cfg(feature = "smp")]
pub const MAX_CPUS: usize = 32;

/// Single-core builds shrink every per-CPU table to one entry.
#[cfg(not(feature = "smp"))]
pub const MAX_CPUS: usize = 1;

const_assert!(MAX_CPUS >= 1);
const_assert!(MAX_CPUS <= 32);

// ============================================================
// Task limits
// ============================================================

/// Maximum number of live tasks (arena capacity), idle tasks included.
pub const MAX_TASKS: usize = 64;

/// Highest PID value the registry can hand out. PIDs occupy
/// `0..=MAX_PID`; the bitmap and radix tree in `sched::pid` are sized
/// from this.
pub const MAX_PID: u32 = 4095;

// TaskId handles are u16; the arena must stay addressable.
const_assert!(MAX_TASKS <= u16::MAX as usize);
const_assert!(MAX_TASKS <= (MAX_PID as usize) + 1);

// ============================================================
// Priorities
// ============================================================

/// Priority reserved for per-CPU idle tasks. No other task may use it.
pub const PRIORITY_IDLE: u8 = 0;

/// Lowest priority a regular task can hold.
pub const PRIORITY_MIN: u8 = 1;

/// Default priority for tasks that do not ask for one.
pub const PRIORITY_DEFAULT: u8 = 100;

/// Highest task priority.
pub const PRIORITY_MAX: u8 = 255;

// ============================================================
// Interrupts
// ============================================================

/// Number of IRQ vectors the dispatch table holds.
pub const NR_IRQS: usize = 64;

// ============================================================
// Runtime configuration
// ============================================================

/// Scheduler bring-up parameters, validated once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// Number of CPUs to schedule across. Must be in `1..=MAX_CPUS`.
    pub ncpus: usize,
}

impl SchedConfig {
    pub const fn new(ncpus: usize) -> Self {
        Self { ncpus }
    }

    /// Checks the configuration against the compile-time limits.
    pub fn validate(&self) -> KernResult<()> {
        if self.ncpus == 0 || self.ncpus > MAX_CPUS {
            return Err(Errno::InvalidArgument);
        }
        // One pid per idle task is reserved up front.
        if self.ncpus > MAX_TASKS {
            return Err(Errno::InvalidArgument);
        }
        Ok(())
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::new(1)
    }
}
