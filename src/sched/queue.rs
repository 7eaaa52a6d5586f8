//! Assigned-task list discipline
//!
//! Each CPU's list is a singly-linked chain of arena handles: head is
//! the task running on that CPU, the tail is always that CPU's idle
//! task, and the entries in between are ready tasks in descending
//! priority order. Equal priorities keep FIFO order, which is what
//! makes a yield rotate through peers.
//!
//! Nothing here allocates; every operation is a handful of index
//! relinks done inside the critical section.

use crate::ktrace;
use crate::sched::state::SchedulerState;
use crate::sched::tcb::TaskInfo;
use crate::sched::types::{TaskId, TaskState};

impl SchedulerState {
    /// Inserts `id` into `cpu`'s list at its priority position. The
    /// task becomes `Running` if it displaces the head, `Ready`
    /// otherwise; a displaced non-idle head is preemption.
    pub(crate) fn insert_task(&mut self, cpu: usize, id: TaskId) {
        let prio = self.tcb(id).priority;
        let head_id = self.cpus[cpu].head;
        let head_prio = self.tcb(head_id).priority;

        self.tcb_mut(id).cpu = cpu as u16;

        if prio > head_prio {
            let head_was_idle = self.tcb(head_id).is_idle();
            self.tcb_mut(id).link = Some(head_id);
            self.tcb_mut(id).state = TaskState::Running;
            self.tcb_mut(head_id).state = TaskState::Ready;
            self.cpus[cpu].head = id;
            self.cpus[cpu].switches += 1;
            if !head_was_idle {
                self.cpus[cpu].preemptions += 1;
                ktrace!(
                    "pid={} prio={} preempts cpu{} head",
                    self.tcb(id).pid,
                    prio,
                    cpu
                );
            }
            return;
        }

        // Walk to the last entry at or above the new priority. The
        // idle tail sits at priority 0 and always terminates the walk.
        let mut prev = head_id;
        loop {
            match self.tcb(prev).link {
                Some(next) if self.tcb(next).priority >= prio => prev = next,
                _ => break,
            }
        }
        let tail = self.tcb(prev).link;
        self.tcb_mut(id).link = tail;
        self.tcb_mut(id).state = TaskState::Ready;
        self.tcb_mut(prev).link = Some(id);
    }

    /// Removes `id` from its CPU's list. Removing the head promotes
    /// its successor to `Running`. The caller decides the removed
    /// task's next state.
    ///
    /// Unlinking the idle task, or a task that is not on the list it
    /// claims, is list corruption and fatal.
    pub(crate) fn unlink_task(&mut self, id: TaskId) {
        let cpu = self.tcb(id).cpu as usize;
        if self.tcb(id).is_idle() {
            panic!("idle task cannot leave cpu{} list", cpu);
        }
        let head_id = self.cpus[cpu].head;
        if head_id == id {
            let next = match self.tcb(id).link {
                Some(next) => next,
                None => panic!("non-idle head of cpu{} has no successor", cpu),
            };
            self.cpus[cpu].head = next;
            self.tcb_mut(next).state = TaskState::Running;
            self.cpus[cpu].switches += 1;
        } else {
            let mut prev = head_id;
            loop {
                match self.tcb(prev).link {
                    Some(next) if next == id => break,
                    Some(next) => prev = next,
                    None => panic!("pid {} missing from cpu{} list", self.tcb(id).pid, cpu),
                }
            }
            let rest = self.tcb(id).link;
            self.tcb_mut(prev).link = rest;
        }
        self.tcb_mut(id).link = None;
    }

    /// Rotates `cpu`'s head behind ready tasks of equal priority.
    /// Returns whether a rotation happened; with no equal-priority
    /// peer waiting the head keeps running.
    pub(crate) fn rotate_head(&mut self, cpu: usize) -> bool {
        let head_id = self.cpus[cpu].head;
        let head = self.tcb(head_id);
        if head.is_idle() {
            return false;
        }
        let Some(next) = head.link else {
            return false;
        };
        if self.tcb(next).priority < head.priority {
            return false;
        }
        self.unlink_task(head_id);
        self.insert_task(cpu, head_id);
        true
    }

    /// Walks `cpu`'s assigned list head-to-tail, yielding owned
    /// snapshots. Empty for out-of-range CPUs.
    pub fn assigned_tasks(&self, cpu: usize) -> impl Iterator<Item = TaskInfo> + '_ {
        let mut next = if cpu < self.ncpus {
            Some(self.cpus[cpu].head)
        } else {
            None
        };
        core::iter::from_fn(move || {
            let id = next?;
            let tcb = self.tcb(id);
            next = tcb.link;
            Some(TaskInfo::snapshot(id, tcb))
        })
    }
}
