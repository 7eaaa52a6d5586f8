//! Scheduler statistics and debugging
//!
//! Copy-out snapshots of global and per-CPU counters, plus a kinfo
//! task-table dump for console debugging.

use crate::config::MAX_TASKS;
use crate::kinfo;
use crate::sched::state::SchedulerState;
use crate::sched::types::{CpuState, Pid, TaskState};

/// Whole-scheduler counters, gathered under the critical section.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedStats {
    pub ncpus: usize,
    /// CPUs currently accepting assignments.
    pub online_cpus: usize,
    /// Occupied arena slots, idle tasks included.
    pub total_tasks: usize,
    pub ready: usize,
    pub running: usize,
    pub blocked: usize,
    pub suspended: usize,
    pub terminated: usize,
    pub live_pids: u32,
    pub selections: u64,
    pub fallback_selections: u64,
    pub cancels: u64,
    /// Head changes summed over all CPUs.
    pub switches: u64,
    pub preemptions: u64,
}

/// Counters for a single CPU.
#[derive(Debug, Clone, Copy)]
pub struct CpuStats {
    pub cpu: usize,
    pub state: CpuState,
    /// Pid at the head of the assigned list.
    pub head_pid: Pid,
    /// List length including the idle tail.
    pub queue_len: usize,
    pub switches: u64,
    pub preemptions: u64,
}

fn state_str(state: TaskState) -> &'static str {
    match state {
        TaskState::Ready => "Ready",
        TaskState::Running => "Running",
        TaskState::Blocked => "Blocked",
        TaskState::Suspended => "Suspended",
        TaskState::Terminated => "Terminated",
    }
}

impl SchedulerState {
    pub fn stats(&self) -> SchedStats {
        let mut stats = SchedStats {
            ncpus: self.ncpus,
            live_pids: self.pids.live_count(),
            selections: self.selections,
            fallback_selections: self.fallback_selections,
            cancels: self.cancels,
            ..SchedStats::default()
        };

        for slot in self.tasks.iter() {
            let Some(tcb) = slot else { continue };
            stats.total_tasks += 1;
            match tcb.state {
                TaskState::Ready => stats.ready += 1,
                TaskState::Running => stats.running += 1,
                TaskState::Blocked => stats.blocked += 1,
                TaskState::Suspended => stats.suspended += 1,
                TaskState::Terminated => stats.terminated += 1,
            }
        }
        for cpu in 0..self.ncpus {
            let slot = &self.cpus[cpu];
            if slot.is_schedulable() {
                stats.online_cpus += 1;
            }
            stats.switches += slot.switches;
            stats.preemptions += slot.preemptions;
        }
        stats
    }

    pub fn cpu_stats(&self, cpu: usize) -> Option<CpuStats> {
        if cpu >= self.ncpus {
            return None;
        }
        let slot = &self.cpus[cpu];
        Some(CpuStats {
            cpu,
            state: slot.state,
            head_pid: self.tcb(slot.head).pid,
            queue_len: self.assigned_tasks(cpu).count(),
            switches: slot.switches,
            preemptions: slot.preemptions,
        })
    }

    /// Dumps the task table to the kernel log.
    pub fn log_tasks(&self) {
        kinfo!("=== Task List ===");
        kinfo!(
            "{:<6} {:<6} {:<5} {:<11} {:<4} {:<10} {:<5}",
            "PID", "GROUP", "PRIO", "STATE", "CPU", "AFFINITY", "FLAGS"
        );
        for idx in 0..MAX_TASKS {
            let Some(tcb) = &self.tasks[idx] else { continue };
            kinfo!(
                "{:<6} {:<6} {:<5} {:<11} {:<4} {:#010x} {}{}",
                tcb.pid,
                tcb.group,
                tcb.priority,
                state_str(tcb.state),
                tcb.cpu,
                tcb.affinity.bits(),
                if tcb.is_idle() { "I" } else { "-" },
                if tcb.cancel_pending() { "C" } else { "-" },
            );
        }
        let stats = self.stats();
        kinfo!("=== Scheduler Statistics ===");
        kinfo!("Context switches: {}", stats.switches);
        kinfo!("Preemptions: {}", stats.preemptions);
        kinfo!("CPU selections: {} ({} fallback)", stats.selections, stats.fallback_selections);
        kinfo!("Cancellations issued: {}", stats.cancels);
    }
}
