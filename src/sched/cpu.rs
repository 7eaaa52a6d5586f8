//! Per-CPU scheduler state
//!
//! One [`CpuSlot`] per configured CPU. The slot anchors that CPU's
//! assigned-task list and carries its runtime state plus switch
//! accounting. Counters are plain integers; every writer already
//! holds the scheduler critical section.

use crate::sched::types::{CpuState, TaskId};

/// Scheduler-side record for one CPU. Cache-line sized so adjacent
/// slots do not share a line.
#[derive(Debug, Clone, Copy)]
#[repr(C, align(64))]
pub struct CpuSlot {
    /// Head of the assigned-task list: the task running on this CPU.
    pub head: TaskId,
    /// This CPU's idle task, permanently the list tail.
    pub idle: TaskId,
    pub state: CpuState,
    /// Times a new task reached the head of this CPU's list.
    pub switches: u64,
    /// Head replacements: a higher-priority arrival displaced the
    /// running task back to `Ready`.
    pub preemptions: u64,
}

impl CpuSlot {
    /// A slot starts with its idle task as both head and tail.
    pub fn new(idle: TaskId) -> Self {
        Self {
            head: idle,
            idle,
            state: CpuState::Running,
            switches: 0,
            preemptions: 0,
        }
    }

    /// Whether this CPU may receive task assignments.
    pub fn is_schedulable(&self) -> bool {
        self.state == CpuState::Running
    }
}
