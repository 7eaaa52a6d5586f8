//! Task control block
//!
//! One [`Tcb`] per schedulable unit, stored by value in the arena.
//! The scheduler links and unlinks slots; it never owns the execution
//! context behind them. Entries are `Copy` so lookups can hand out
//! owned snapshots instead of borrows into the locked table.

use crate::config::{PRIORITY_IDLE, PRIORITY_MIN};
use crate::errno::{Errno, KernResult};
use crate::sched::types::{CpuMask, Pid, TaskId, TaskState, TcbFlags};

/// Per-task scheduler state.
#[derive(Debug, Clone, Copy)]
pub struct Tcb {
    /// Unique id while the task is live.
    pub pid: Pid,
    /// Pid of the group leader; a leader's `group` is its own pid.
    pub group: Pid,
    /// Current scheduling priority. 0 is reserved for idle tasks.
    pub priority: u8,
    /// Priority the task was created with; restart resets to this.
    pub base_priority: u8,
    /// CPUs this task may be assigned to.
    pub affinity: CpuMask,
    pub state: TaskState,
    pub flags: TcbFlags,
    /// CPU whose assigned list holds this task. Meaningful only while
    /// `state` is `Ready` or `Running`.
    pub cpu: u16,
    /// Next task in the owning CPU's assigned list.
    pub link: Option<TaskId>,
}

impl Tcb {
    /// Builds a regular (non-idle) TCB. Priority 0 belongs to idle
    /// tasks and is rejected here; the upper bound is the type's.
    pub fn new(pid: Pid, group: Pid, priority: u8, affinity: CpuMask) -> KernResult<Self> {
        if priority < PRIORITY_MIN {
            return Err(Errno::InvalidArgument);
        }
        if affinity.is_empty() {
            return Err(Errno::InvalidArgument);
        }
        Ok(Self {
            pid,
            group,
            priority,
            base_priority: priority,
            affinity,
            state: TaskState::Ready,
            flags: TcbFlags::empty(),
            cpu: 0,
            link: None,
        })
    }

    /// Builds the idle TCB for `cpu`. Idle tasks are their own group
    /// leaders, pinned to their CPU, and permanently `Running` when
    /// nothing else is assigned.
    pub fn idle(pid: Pid, cpu: u16) -> Self {
        Self {
            pid,
            group: pid,
            priority: PRIORITY_IDLE,
            base_priority: PRIORITY_IDLE,
            affinity: CpuMask::single(cpu as usize),
            state: TaskState::Running,
            flags: TcbFlags::IDLE,
            cpu,
            link: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.flags.contains(TcbFlags::IDLE)
    }

    pub fn cancel_pending(&self) -> bool {
        self.flags.contains(TcbFlags::CANCEL_PENDING)
    }

    /// True while the task occupies a position on some CPU's list.
    pub fn on_list(&self) -> bool {
        matches!(self.state, TaskState::Ready | TaskState::Running)
    }
}

/// Owned snapshot of one task, safe to hold outside the critical
/// section. The `slot` handle stays stable for the task's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct TaskInfo {
    pub pid: Pid,
    pub group: Pid,
    pub priority: u8,
    pub base_priority: u8,
    pub affinity: CpuMask,
    pub state: TaskState,
    pub flags: TcbFlags,
    pub cpu: u16,
    pub slot: TaskId,
}

impl TaskInfo {
    pub(crate) fn snapshot(slot: TaskId, tcb: &Tcb) -> Self {
        Self {
            pid: tcb.pid,
            group: tcb.group,
            priority: tcb.priority,
            base_priority: tcb.base_priority,
            affinity: tcb.affinity,
            state: tcb.state,
            flags: tcb.flags,
            cpu: tcb.cpu,
            slot,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.flags.contains(TcbFlags::IDLE)
    }

    pub fn cancel_pending(&self) -> bool {
        self.flags.contains(TcbFlags::CANCEL_PENDING)
    }
}
