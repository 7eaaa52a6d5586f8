//! Group and child lifecycle
//!
//! Tasks that share a leader form a group; membership is recorded on
//! each TCB and discovered by walking the arena, so there is no
//! separate membership list to keep consistent. The group-kill path
//! exists for task restart: every child must go, the restarted task
//! must survive.

use crate::config::MAX_TASKS;
use crate::errno::{Errno, KernResult};
use crate::sched::state::SchedulerState;
use crate::sched::types::{Pid, TaskId, TaskState, TcbFlags};
use crate::{kdebug, kinfo, kwarn};

impl SchedulerState {
    /// Requests asynchronous cancellation of a task. The request is a
    /// flag the target observes at its next cancellation point; this
    /// call never waits. Blocked or suspended targets are made ready
    /// so they can get there.
    pub fn cancel_task(&mut self, pid: Pid) -> KernResult<()> {
        let id = self.gettcb(pid).ok_or(Errno::NoSuchProcess)?;
        self.cancel_slot(id)
    }

    pub(crate) fn cancel_slot(&mut self, id: TaskId) -> KernResult<()> {
        let tcb = *self.tcb(id);
        if tcb.is_idle() {
            return Err(Errno::OperationNotPermitted);
        }
        match tcb.state {
            TaskState::Terminated => Err(Errno::NoSuchProcess),
            TaskState::Blocked | TaskState::Suspended => {
                self.mark_cancel(id);
                let cpu = self.select_cpu_counted(tcb.affinity);
                self.insert_task(cpu, id);
                kdebug!("cancel pending for pid={}, woken on cpu{}", tcb.pid, cpu);
                Ok(())
            }
            TaskState::Ready | TaskState::Running => {
                self.mark_cancel(id);
                kdebug!("cancel pending for pid={}", tcb.pid);
                Ok(())
            }
        }
    }

    /// Cancels every member of `retain`'s group except `retain`
    /// itself. One member failing does not stop the walk; the first
    /// failure is reported after every member has been visited.
    pub fn group_killchildren(&mut self, retain: Pid) -> KernResult<()> {
        let retain_id = self.gettcb(retain).ok_or(Errno::NoSuchProcess)?;
        let group = self.tcb(retain_id).group;

        let mut first_err = None;
        for idx in 0..MAX_TASKS {
            let Some(tcb) = self.tasks[idx] else { continue };
            if tcb.group != group || tcb.pid == retain {
                continue;
            }
            if let Err(e) = self.cancel_slot(TaskId(idx as u16)) {
                kwarn!("group {}: cancel of pid={} failed: {}", group, tcb.pid, e);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Restarts a task: its group's children are cancelled, its
    /// priority returns to the creation value, any pending
    /// cancellation is dropped, and it requeues as ready on a freshly
    /// selected CPU. A failure while cancelling children does not
    /// stop the restart, but is reported.
    pub fn restart_task(&mut self, pid: Pid) -> KernResult<()> {
        let id = self.gettcb(pid).ok_or(Errno::NoSuchProcess)?;
        let tcb = *self.tcb(id);
        if tcb.is_idle() {
            return Err(Errno::OperationNotPermitted);
        }
        if tcb.state == TaskState::Terminated {
            return Err(Errno::NoSuchProcess);
        }

        let kill_result = self.group_killchildren(pid);

        if self.tcb(id).on_list() {
            self.unlink_task(id);
        }
        {
            let t = self.tcb_mut(id);
            t.priority = t.base_priority;
            t.flags.remove(TcbFlags::CANCEL_PENDING);
        }
        let cpu = self.select_cpu_counted(tcb.affinity);
        self.insert_task(cpu, id);
        kinfo!("task pid={} restarted on cpu{}", pid, cpu);
        kill_result
    }
}
