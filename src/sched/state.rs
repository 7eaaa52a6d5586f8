//! Scheduler state and task lifecycle
//!
//! [`SchedulerState`] owns everything the scheduler knows: the task
//! arena, the PID registry, and the per-CPU slots. It has no global
//! instance; the embedding kernel (or a test) constructs as many
//! independent schedulers as it wants and threads them through
//! explicitly.
//!
//! All mutating methods expect the caller to be inside the critical
//! section. The [`Scheduler`] facade pairs the state with a
//! [`CsLock`] and is the form the rest of the kernel uses.

use crate::config::{SchedConfig, MAX_CPUS, MAX_TASKS, PRIORITY_MIN};
use crate::errno::{Errno, KernResult};
use crate::sched::cpu::CpuSlot;
use crate::sched::pid::PidRegistry;
use crate::sched::tcb::{TaskInfo, Tcb};
use crate::sched::types::{CpuMask, CpuState, Pid, TaskId, TaskState, TcbFlags};
use crate::sync::CsLock;
use crate::{kdebug, kerror, kinfo};

/// All scheduler-internal mutable state.
pub struct SchedulerState {
    /// Task arena. Idle tasks occupy slots `0..ncpus` for the life of
    /// the scheduler; other slots are reused as tasks come and go.
    pub(crate) tasks: [Option<Tcb>; MAX_TASKS],
    pub(crate) pids: PidRegistry,
    pub(crate) cpus: [CpuSlot; MAX_CPUS],
    pub(crate) ncpus: usize,
    /// CPU selections performed on behalf of mutating operations.
    pub(crate) selections: u64,
    /// Selections that had to ignore the affinity mask to make
    /// progress.
    pub(crate) fallback_selections: u64,
    /// Cancellation requests issued.
    pub(crate) cancels: u64,
}

impl SchedulerState {
    /// Builds a scheduler for `config.ncpus` CPUs. Each CPU gets an
    /// idle task (pid = CPU index) pinned to it and installed as the
    /// head and tail of its assigned list.
    pub fn new(config: SchedConfig) -> KernResult<Self> {
        if let Err(e) = config.validate() {
            kerror!("rejected scheduler config: ncpus={} ({})", config.ncpus, e);
            return Err(e);
        }

        let mut state = Self {
            tasks: [None; MAX_TASKS],
            pids: PidRegistry::new(),
            cpus: [CpuSlot::new(TaskId(0)); MAX_CPUS],
            ncpus: config.ncpus,
            selections: 0,
            fallback_selections: 0,
            cancels: 0,
        };

        for cpu in 0..config.ncpus {
            let id = TaskId(cpu as u16);
            state.pids.allocate_specific(cpu as Pid, id)?;
            state.tasks[cpu] = Some(Tcb::idle(cpu as Pid, cpu as u16));
            state.cpus[cpu] = CpuSlot::new(id);
        }
        // Unconfigured slots are permanently out of service.
        for cpu in config.ncpus..MAX_CPUS {
            state.cpus[cpu].state = CpuState::Hotplug;
        }

        kinfo!(
            "scheduler online: {} cpus, {} task slots",
            config.ncpus,
            MAX_TASKS
        );
        Ok(state)
    }

    pub fn ncpus(&self) -> usize {
        self.ncpus
    }

    // ============================================================
    // Arena access
    // ============================================================

    /// Borrow the TCB behind a handle. A vacant slot here means a
    /// list or registry still references a reaped task, which is
    /// unrecoverable corruption.
    pub(crate) fn tcb(&self, id: TaskId) -> &Tcb {
        match &self.tasks[id.index()] {
            Some(tcb) => tcb,
            None => panic!("vacant arena slot {} referenced", id.0),
        }
    }

    pub(crate) fn tcb_mut(&mut self, id: TaskId) -> &mut Tcb {
        match &mut self.tasks[id.index()] {
            Some(tcb) => tcb,
            None => panic!("vacant arena slot {} referenced", id.0),
        }
    }

    fn free_slot(&self) -> Option<usize> {
        self.tasks.iter().position(|slot| slot.is_none())
    }

    // ============================================================
    // Lookup
    // ============================================================

    /// Resolves a pid to its arena handle. Unknown or out-of-range
    /// pids resolve to `None`. For a live pid the same handle comes
    /// back every time until the task is reaped.
    pub fn gettcb(&self, pid: Pid) -> Option<TaskId> {
        let id = self.pids.lookup(pid)?;
        if self.tasks[id.index()].is_none() {
            panic!("pid registry maps pid {} to vacant slot {}", pid, id.0);
        }
        Some(id)
    }

    /// Owned snapshot of a task's scheduler state.
    pub fn task_info(&self, pid: Pid) -> Option<TaskInfo> {
        let id = self.gettcb(pid)?;
        Some(TaskInfo::snapshot(id, self.tcb(id)))
    }

    /// Pid of the task currently at the head of `cpu`'s list.
    pub fn current(&self, cpu: usize) -> Option<Pid> {
        if cpu >= self.ncpus {
            return None;
        }
        Some(self.tcb(self.cpus[cpu].head).pid)
    }

    pub fn cpu_state(&self, cpu: usize) -> Option<CpuState> {
        if cpu >= self.ncpus {
            return None;
        }
        Some(self.cpus[cpu].state)
    }

    // ============================================================
    // Task lifecycle
    // ============================================================

    /// Creates a task and places it on the CPU chosen by
    /// [`select_cpu`](Self::select_cpu).
    ///
    /// `group` joins the new task to an existing task's group (the
    /// leader is resolved transitively); `None` makes it the leader
    /// of its own group.
    pub fn attach_task(
        &mut self,
        priority: u8,
        affinity: CpuMask,
        group: Option<Pid>,
    ) -> KernResult<Pid> {
        if priority < PRIORITY_MIN {
            return Err(Errno::InvalidArgument);
        }
        let clipped = CpuMask::from_bits(affinity.bits() & CpuMask::all(self.ncpus).bits());
        if clipped.is_empty() {
            return Err(Errno::InvalidArgument);
        }
        let group_pid = match group {
            None => None,
            Some(g) => {
                let gid = self.gettcb(g).ok_or(Errno::NoSuchProcess)?;
                let leader = self.tcb(gid);
                if leader.is_idle() {
                    return Err(Errno::OperationNotPermitted);
                }
                if leader.state == TaskState::Terminated {
                    return Err(Errno::NoSuchProcess);
                }
                Some(leader.group)
            }
        };

        let slot = self.free_slot().ok_or(Errno::TryAgain)?;
        let id = TaskId(slot as u16);
        let pid = self.pids.allocate(id)?;
        let tcb = match Tcb::new(pid, group_pid.unwrap_or(pid), priority, clipped) {
            Ok(tcb) => tcb,
            Err(e) => {
                self.pids.free(pid);
                return Err(e);
            }
        };
        self.tasks[slot] = Some(tcb);

        let cpu = self.select_cpu_counted(clipped);
        self.insert_task(cpu, id);
        kinfo!("task pid={} prio={} attached on cpu{}", pid, priority, cpu);
        Ok(pid)
    }

    /// Marks a task terminated and takes it off its CPU's list. The
    /// pid stays resolvable until [`reap_task`](Self::reap_task).
    pub fn exit_task(&mut self, pid: Pid) -> KernResult<()> {
        let id = self.gettcb(pid).ok_or(Errno::NoSuchProcess)?;
        let tcb = *self.tcb(id);
        if tcb.is_idle() {
            return Err(Errno::OperationNotPermitted);
        }
        if tcb.state == TaskState::Terminated {
            return Err(Errno::NoSuchProcess);
        }
        if tcb.on_list() {
            self.unlink_task(id);
        }
        self.tcb_mut(id).state = TaskState::Terminated;
        kdebug!("task pid={} exited", pid);
        Ok(())
    }

    /// Releases a terminated task's slot and pid.
    pub fn reap_task(&mut self, pid: Pid) -> KernResult<()> {
        let id = self.gettcb(pid).ok_or(Errno::NoSuchProcess)?;
        let tcb = self.tcb(id);
        if tcb.is_idle() {
            return Err(Errno::OperationNotPermitted);
        }
        if tcb.state != TaskState::Terminated {
            return Err(Errno::Busy);
        }
        self.pids.free(pid);
        self.tasks[id.index()] = None;
        kdebug!("task pid={} reaped", pid);
        Ok(())
    }

    /// Blocks a task on some wait object; it leaves its CPU's list
    /// until [`unblock_task`](Self::unblock_task).
    pub fn block_task(&mut self, pid: Pid) -> KernResult<()> {
        let id = self.gettcb(pid).ok_or(Errno::NoSuchProcess)?;
        let tcb = *self.tcb(id);
        if tcb.is_idle() {
            return Err(Errno::OperationNotPermitted);
        }
        if !tcb.on_list() {
            return Err(Errno::InvalidArgument);
        }
        self.unlink_task(id);
        self.tcb_mut(id).state = TaskState::Blocked;
        Ok(())
    }

    /// Makes a blocked task runnable again on a freshly selected CPU.
    pub fn unblock_task(&mut self, pid: Pid) -> KernResult<()> {
        let id = self.gettcb(pid).ok_or(Errno::NoSuchProcess)?;
        let tcb = *self.tcb(id);
        if tcb.state != TaskState::Blocked {
            return Err(Errno::InvalidArgument);
        }
        let cpu = self.select_cpu_counted(tcb.affinity);
        self.insert_task(cpu, id);
        Ok(())
    }

    /// Stops a ready or running task until resumed.
    pub fn suspend_task(&mut self, pid: Pid) -> KernResult<()> {
        let id = self.gettcb(pid).ok_or(Errno::NoSuchProcess)?;
        let tcb = *self.tcb(id);
        if tcb.is_idle() {
            return Err(Errno::OperationNotPermitted);
        }
        if !tcb.on_list() {
            return Err(Errno::InvalidArgument);
        }
        self.unlink_task(id);
        self.tcb_mut(id).state = TaskState::Suspended;
        Ok(())
    }

    pub fn resume_task(&mut self, pid: Pid) -> KernResult<()> {
        let id = self.gettcb(pid).ok_or(Errno::NoSuchProcess)?;
        let tcb = *self.tcb(id);
        if tcb.state != TaskState::Suspended {
            return Err(Errno::InvalidArgument);
        }
        let cpu = self.select_cpu_counted(tcb.affinity);
        self.insert_task(cpu, id);
        Ok(())
    }

    /// Voluntary yield: rotates the caller behind ready tasks of the
    /// same priority on its CPU. A no-op when nothing of equal
    /// priority is waiting.
    pub fn yield_task(&mut self, pid: Pid) -> KernResult<()> {
        let id = self.gettcb(pid).ok_or(Errno::NoSuchProcess)?;
        let tcb = *self.tcb(id);
        if tcb.state != TaskState::Running {
            return Err(Errno::InvalidArgument);
        }
        self.rotate_head(tcb.cpu as usize);
        Ok(())
    }

    /// Changes a task's priority. Tasks on a list are repositioned,
    /// which may migrate them to a better CPU; blocked or suspended
    /// tasks pick the new priority up when they requeue.
    pub fn set_priority(&mut self, pid: Pid, priority: u8) -> KernResult<()> {
        if priority < PRIORITY_MIN {
            return Err(Errno::InvalidArgument);
        }
        let id = self.gettcb(pid).ok_or(Errno::NoSuchProcess)?;
        let tcb = *self.tcb(id);
        if tcb.is_idle() {
            return Err(Errno::OperationNotPermitted);
        }
        if tcb.state == TaskState::Terminated {
            return Err(Errno::NoSuchProcess);
        }
        if !tcb.on_list() {
            self.tcb_mut(id).priority = priority;
            return Ok(());
        }
        self.unlink_task(id);
        self.tcb_mut(id).priority = priority;
        let cpu = self.select_cpu_counted(tcb.affinity);
        self.insert_task(cpu, id);
        Ok(())
    }

    // ============================================================
    // CPU hotplug
    // ============================================================

    /// Takes a CPU out of service for scheduling and migrates its
    /// assigned tasks elsewhere. The last schedulable CPU cannot be
    /// halted.
    pub fn halt_cpu(&mut self, cpu: usize) -> KernResult<()> {
        self.offline_cpu(cpu, CpuState::Halted)
    }

    /// Like [`halt_cpu`](Self::halt_cpu) but marks the CPU as being
    /// hot-unplugged.
    pub fn hotplug_cpu(&mut self, cpu: usize) -> KernResult<()> {
        self.offline_cpu(cpu, CpuState::Hotplug)
    }

    fn offline_cpu(&mut self, cpu: usize, target: CpuState) -> KernResult<()> {
        if cpu >= self.ncpus {
            return Err(Errno::InvalidArgument);
        }
        if self.cpus[cpu].state == target {
            return Ok(());
        }
        if self.cpus[cpu].is_schedulable() {
            let schedulable = (0..self.ncpus)
                .filter(|&c| self.cpus[c].is_schedulable())
                .count();
            if schedulable <= 1 {
                return Err(Errno::Busy);
            }
        }
        self.cpus[cpu].state = target;

        // Push everything except the idle task to other CPUs. The
        // selection below can no longer pick this CPU.
        let mut migrated = 0u32;
        loop {
            let head = self.cpus[cpu].head;
            if self.tcb(head).is_idle() {
                break;
            }
            let affinity = self.tcb(head).affinity;
            self.unlink_task(head);
            let dest = self.select_cpu_counted(affinity);
            self.insert_task(dest, head);
            migrated += 1;
        }
        kinfo!(
            "cpu{} offline ({:?}), {} tasks migrated",
            cpu,
            target,
            migrated
        );
        Ok(())
    }

    /// Returns a halted or hot-unplugged CPU to service. Tasks drift
    /// back through normal selection.
    pub fn resume_cpu(&mut self, cpu: usize) -> KernResult<()> {
        if cpu >= self.ncpus {
            return Err(Errno::InvalidArgument);
        }
        if self.cpus[cpu].state != CpuState::Running {
            self.cpus[cpu].state = CpuState::Running;
            kinfo!("cpu{} back in service", cpu);
        }
        Ok(())
    }

    // ============================================================
    // Cancellation bookkeeping
    // ============================================================

    pub(crate) fn mark_cancel(&mut self, id: TaskId) {
        self.tcb_mut(id).flags.insert(TcbFlags::CANCEL_PENDING);
        self.cancels += 1;
    }
}

/// Thread-safe scheduler handle: [`SchedulerState`] behind the
/// critical-section lock. This is the interface the rest of the
/// kernel links against.
pub struct Scheduler {
    state: CsLock<SchedulerState>,
}

impl Scheduler {
    pub fn new(config: SchedConfig) -> KernResult<Self> {
        Ok(Self {
            state: CsLock::new(SchedulerState::new(config)?),
        })
    }

    /// Runs `f` inside the scheduler critical section. Composite
    /// operations that must observe or mutate consistent state go
    /// through here.
    pub fn critical_section<R>(&self, f: impl FnOnce(&mut SchedulerState) -> R) -> R {
        self.state.with(f)
    }

    pub fn select_cpu(&self, affinity: CpuMask) -> usize {
        self.state.with(|s| s.select_cpu(affinity))
    }

    pub fn attach_task(
        &self,
        priority: u8,
        affinity: CpuMask,
        group: Option<Pid>,
    ) -> KernResult<Pid> {
        self.state.with(|s| s.attach_task(priority, affinity, group))
    }

    pub fn exit_task(&self, pid: Pid) -> KernResult<()> {
        self.state.with(|s| s.exit_task(pid))
    }

    pub fn reap_task(&self, pid: Pid) -> KernResult<()> {
        self.state.with(|s| s.reap_task(pid))
    }

    pub fn block_task(&self, pid: Pid) -> KernResult<()> {
        self.state.with(|s| s.block_task(pid))
    }

    pub fn unblock_task(&self, pid: Pid) -> KernResult<()> {
        self.state.with(|s| s.unblock_task(pid))
    }

    pub fn suspend_task(&self, pid: Pid) -> KernResult<()> {
        self.state.with(|s| s.suspend_task(pid))
    }

    pub fn resume_task(&self, pid: Pid) -> KernResult<()> {
        self.state.with(|s| s.resume_task(pid))
    }

    pub fn yield_task(&self, pid: Pid) -> KernResult<()> {
        self.state.with(|s| s.yield_task(pid))
    }

    pub fn set_priority(&self, pid: Pid, priority: u8) -> KernResult<()> {
        self.state.with(|s| s.set_priority(pid, priority))
    }

    pub fn cancel_task(&self, pid: Pid) -> KernResult<()> {
        self.state.with(|s| s.cancel_task(pid))
    }

    pub fn group_killchildren(&self, retain: Pid) -> KernResult<()> {
        self.state.with(|s| s.group_killchildren(retain))
    }

    pub fn restart_task(&self, pid: Pid) -> KernResult<()> {
        self.state.with(|s| s.restart_task(pid))
    }

    pub fn halt_cpu(&self, cpu: usize) -> KernResult<()> {
        self.state.with(|s| s.halt_cpu(cpu))
    }

    pub fn hotplug_cpu(&self, cpu: usize) -> KernResult<()> {
        self.state.with(|s| s.hotplug_cpu(cpu))
    }

    pub fn resume_cpu(&self, cpu: usize) -> KernResult<()> {
        self.state.with(|s| s.resume_cpu(cpu))
    }

    pub fn gettcb(&self, pid: Pid) -> Option<TaskId> {
        self.state.with(|s| s.gettcb(pid))
    }

    pub fn task_info(&self, pid: Pid) -> Option<TaskInfo> {
        self.state.with(|s| s.task_info(pid))
    }

    pub fn current(&self, cpu: usize) -> Option<Pid> {
        self.state.with(|s| s.current(cpu))
    }

    pub fn cpu_state(&self, cpu: usize) -> Option<CpuState> {
        self.state.with(|s| s.cpu_state(cpu))
    }

    pub fn stats(&self) -> crate::sched::stats::SchedStats {
        self.state.with(|s| s.stats())
    }

    pub fn cpu_stats(&self, cpu: usize) -> Option<crate::sched::stats::CpuStats> {
        self.state.with(|s| s.cpu_stats(cpu))
    }
}
