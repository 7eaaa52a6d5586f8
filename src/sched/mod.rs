//! Scheduler subsystem
//!
//! Priority-preemptive SMP scheduling over fixed-capacity tables.
//! Each CPU owns an assigned-task list whose head is the task running
//! there and whose tail is that CPU's idle task; placement decisions
//! go through a two-pass affinity-then-anywhere CPU scan.
//!
//! ## Per-CPU list discipline
//!
//! - Entries are ordered by descending priority, FIFO among equals
//! - The head is `Running`, everything behind it is `Ready`
//! - The idle task (priority 0) never leaves the tail
//! - Insertion at the head is a preemption and demotes the old head
//!
//! ## Module Organization
//!
//! - `types`: id types, state enums, affinity mask, flag bits
//! - `tcb`: task control block and owned snapshots
//! - `pid`: PID bitmap allocator and pid-to-slot radix tree
//! - `cpu`: per-CPU slot (list anchor, CPU state, counters)
//! - `queue`: assigned-list insert/unlink/rotate discipline
//! - `select`: two-pass CPU selection
//! - `group`: cancellation, group kill, task restart
//! - `state`: the scheduler state arena and the locked facade
//! - `stats`: statistics snapshots and debug dumps

mod cpu;
mod group;
pub mod pid;
mod queue;
mod select;
pub mod state;
pub mod stats;
pub mod tcb;
pub mod types;

// Re-export the working set for external use
pub use state::{Scheduler, SchedulerState};
pub use stats::{CpuStats, SchedStats};
pub use tcb::{TaskInfo, Tcb};
pub use types::{CpuMask, CpuState, Pid, TaskId, TaskState, TcbFlags};
