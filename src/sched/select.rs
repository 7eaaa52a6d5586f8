//! CPU selection
//!
//! Decides which CPU should receive a newly-runnable or
//! re-prioritized task. Affinity is honored when any permitted CPU
//! can take work; when the whole permitted set is offline or
//! masked out, progress wins and the scan repeats without the mask.

use crate::config::PRIORITY_MAX;
use crate::kdebug;
use crate::sched::state::SchedulerState;
use crate::sched::types::CpuMask;

impl SchedulerState {
    /// Picks the best CPU for a task restricted to `affinity`.
    ///
    /// First pass scans the permitted, schedulable CPUs: a CPU whose
    /// head is its idle task wins immediately (no preemption needed);
    /// otherwise the CPU running the lowest-priority head is
    /// remembered. If the permitted set yielded nothing, a second
    /// pass repeats the scan over every CPU, still skipping halted
    /// and hot-unplugged ones.
    ///
    /// Pure query; the caller holds the critical section. Panics if
    /// no CPU at all is schedulable, which [`halt_cpu`] makes
    /// unreachable by refusing to take down the last one.
    ///
    /// [`halt_cpu`]: SchedulerState::halt_cpu
    pub fn select_cpu(&self, affinity: CpuMask) -> usize {
        self.select_cpu_inner(affinity).0
    }

    pub(crate) fn select_cpu_inner(&self, affinity: CpuMask) -> (usize, bool) {
        let mut minprio = PRIORITY_MAX as u16 + 1;
        let mut best = None;

        for cpu in 0..self.ncpus {
            if !affinity.is_set(cpu) {
                continue;
            }
            let slot = &self.cpus[cpu];
            if !slot.is_schedulable() {
                continue;
            }
            let head = self.tcb(slot.head);
            if head.is_idle() {
                return (cpu, false);
            }
            if (head.priority as u16) < minprio {
                minprio = head.priority as u16;
                best = Some(cpu);
            }
        }
        if let Some(cpu) = best {
            return (cpu, false);
        }

        // Nothing in the permitted set can take work; scan everything.
        minprio = PRIORITY_MAX as u16 + 1;
        for cpu in 0..self.ncpus {
            let slot = &self.cpus[cpu];
            if !slot.is_schedulable() {
                continue;
            }
            let head = self.tcb(slot.head);
            if head.is_idle() {
                return (cpu, true);
            }
            if (head.priority as u16) < minprio {
                minprio = head.priority as u16;
                best = Some(cpu);
            }
        }
        match best {
            Some(cpu) => (cpu, true),
            None => panic!(
                "no schedulable cpu (ncpus={}, affinity={:#010x})",
                self.ncpus,
                affinity.bits()
            ),
        }
    }

    /// Selection on behalf of a mutating operation: same result as
    /// [`select_cpu`](Self::select_cpu), plus accounting.
    pub(crate) fn select_cpu_counted(&mut self, affinity: CpuMask) -> usize {
        let (cpu, fell_back) = self.select_cpu_inner(affinity);
        self.selections += 1;
        if fell_back {
            self.fallback_selections += 1;
            kdebug!(
                "affinity {:#x} unavailable, falling back to cpu{}",
                affinity.bits(),
                cpu
            );
        }
        cpu
    }
}
