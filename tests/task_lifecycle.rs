//! Task Lifecycle Integration Tests
//!
//! Tests for attach/exit/reap, the pid registry behavior visible
//! through the public API, blocking and suspension transitions, and
//! priority changes.

use nimbus_sched::{
    CpuMask, Errno, SchedConfig, Scheduler, TaskInfo, TaskState,
};

fn sched(ncpus: usize) -> Scheduler {
    Scheduler::new(SchedConfig::new(ncpus)).unwrap()
}

fn list(sched: &Scheduler, cpu: usize) -> Vec<TaskInfo> {
    sched.critical_section(|s| s.assigned_tasks(cpu).collect())
}

/// Asserts the permanent shape of one CPU's assigned list: running
/// head, ready body in descending priority, exactly one idle task and
/// it is the tail.
fn assert_list_shape(infos: &[TaskInfo]) {
    assert!(!infos.is_empty());
    assert!(infos.last().unwrap().is_idle());
    assert_eq!(infos.iter().filter(|t| t.is_idle()).count(), 1);
    assert_eq!(infos[0].state, TaskState::Running);
    for t in &infos[1..] {
        assert_eq!(t.state, TaskState::Ready);
    }
    for pair in infos.windows(2) {
        assert!(pair[0].priority >= pair[1].priority);
    }
}

// ============================================================================
// Attach and lookup
// ============================================================================

#[test]
fn test_task_attach_and_lookup() {
    let s = sched(2);
    let pid = s.attach_task(100, CpuMask::all(2), None).unwrap();

    // Idle tasks hold pids 0..ncpus, so the first real task gets 2.
    assert_eq!(pid, 2);

    let info = s.task_info(pid).unwrap();
    assert_eq!(info.priority, 100);
    assert_eq!(info.base_priority, 100);
    assert_eq!(info.group, pid);
    assert_eq!(info.state, TaskState::Running);
    assert!(!info.is_idle());
}

#[test]
fn test_task_gettcb_is_idempotent() {
    let s = sched(1);
    let pid = s.attach_task(50, CpuMask::all(1), None).unwrap();

    let first = s.gettcb(pid).unwrap();
    let second = s.gettcb(pid).unwrap();
    assert_eq!(first, second);

    // A pid never handed out resolves to nothing.
    assert!(s.gettcb(4000).is_none());
    assert!(s.task_info(4000).is_none());
}

#[test]
fn test_task_gettcb_rejects_out_of_range() {
    let s = sched(1);
    let pid = s.attach_task(50, CpuMask::all(1), None).unwrap();

    // A pid beyond the registry space shares its low bits with a live
    // pid; it must miss, not resolve to that task.
    let alias = pid + 4096;
    assert!(s.gettcb(alias).is_none());
    assert!(s.task_info(alias).is_none());
    assert!(s.gettcb(u32::MAX).is_none());
    assert!(s.task_info(u32::MAX).is_none());

    // Lifecycle operations keyed by the stale pid bounce off instead
    // of reaching the live task.
    assert_eq!(s.exit_task(alias).unwrap_err(), Errno::NoSuchProcess);
    assert_eq!(s.cancel_task(alias).unwrap_err(), Errno::NoSuchProcess);
    assert_eq!(s.set_priority(alias, 10).unwrap_err(), Errno::NoSuchProcess);
    assert_eq!(s.task_info(pid).unwrap().state, TaskState::Running);
}

#[test]
fn test_task_attach_validation() {
    let s = sched(2);

    // Priority 0 belongs to the idle tasks.
    assert_eq!(
        s.attach_task(0, CpuMask::all(2), None).unwrap_err(),
        Errno::InvalidArgument
    );
    // Affinity must cover at least one configured CPU.
    assert_eq!(
        s.attach_task(50, CpuMask::EMPTY, None).unwrap_err(),
        Errno::InvalidArgument
    );
    assert_eq!(
        s.attach_task(50, CpuMask::from_bits(1 << 5), None).unwrap_err(),
        Errno::InvalidArgument
    );
    // Unknown group leader.
    assert_eq!(
        s.attach_task(50, CpuMask::all(2), Some(99)).unwrap_err(),
        Errno::NoSuchProcess
    );
    // Idle tasks cannot lead a group.
    assert_eq!(
        s.attach_task(50, CpuMask::all(2), Some(0)).unwrap_err(),
        Errno::OperationNotPermitted
    );
}

#[test]
fn test_task_arena_exhaustion() {
    let s = sched(2);

    // Two slots are taken by the idle tasks.
    for _ in 0..62 {
        s.attach_task(10, CpuMask::all(2), None).unwrap();
    }
    assert_eq!(
        s.attach_task(10, CpuMask::all(2), None).unwrap_err(),
        Errno::TryAgain
    );
}

// ============================================================================
// Exit and reap
// ============================================================================

#[test]
fn test_task_exit_then_reap() {
    let s = sched(1);
    let pid = s.attach_task(50, CpuMask::all(1), None).unwrap();

    s.exit_task(pid).unwrap();

    // Terminated but not yet reaped: still resolvable, off the list.
    let info = s.task_info(pid).unwrap();
    assert_eq!(info.state, TaskState::Terminated);
    assert!(list(&s, 0).iter().all(|t| t.pid != pid));

    s.reap_task(pid).unwrap();
    assert!(s.gettcb(pid).is_none());
}

#[test]
fn test_task_reap_requires_exit() {
    let s = sched(1);
    let pid = s.attach_task(50, CpuMask::all(1), None).unwrap();

    assert_eq!(s.reap_task(pid).unwrap_err(), Errno::Busy);
    s.exit_task(pid).unwrap();
    s.reap_task(pid).unwrap();
    assert_eq!(s.reap_task(pid).unwrap_err(), Errno::NoSuchProcess);
}

#[test]
fn test_task_exit_errors() {
    let s = sched(1);
    assert_eq!(s.exit_task(77).unwrap_err(), Errno::NoSuchProcess);

    // Idle tasks are not removable.
    assert_eq!(s.exit_task(0).unwrap_err(), Errno::OperationNotPermitted);

    let pid = s.attach_task(50, CpuMask::all(1), None).unwrap();
    s.exit_task(pid).unwrap();
    assert_eq!(s.exit_task(pid).unwrap_err(), Errno::NoSuchProcess);
}

#[test]
fn test_pid_values_roll_forward() {
    let s = sched(2);

    // Freed pids wait for the space to wrap before reuse, so a quick
    // attach/exit/reap cycle keeps yielding fresh values.
    let mut last = None;
    for _ in 0..8 {
        let pid = s.attach_task(30, CpuMask::all(2), None).unwrap();
        if let Some(prev) = last {
            assert!(pid > prev);
        }
        last = Some(pid);
        s.exit_task(pid).unwrap();
        s.reap_task(pid).unwrap();
    }
}

// ============================================================================
// Blocking and suspension
// ============================================================================

#[test]
fn test_task_block_unblock_cycle() {
    let s = sched(2);
    let pid = s.attach_task(60, CpuMask::all(2), None).unwrap();

    s.block_task(pid).unwrap();
    assert_eq!(s.task_info(pid).unwrap().state, TaskState::Blocked);
    assert!(list(&s, 0).iter().chain(list(&s, 1).iter()).all(|t| t.pid != pid));

    s.unblock_task(pid).unwrap();
    let info = s.task_info(pid).unwrap();
    assert!(matches!(info.state, TaskState::Ready | TaskState::Running));

    // Wrong-state transitions are rejected.
    assert_eq!(s.unblock_task(pid).unwrap_err(), Errno::InvalidArgument);
    assert_eq!(s.block_task(0).unwrap_err(), Errno::OperationNotPermitted);
}

#[test]
fn test_task_suspend_resume_cycle() {
    let s = sched(1);
    let pid = s.attach_task(60, CpuMask::all(1), None).unwrap();

    s.suspend_task(pid).unwrap();
    assert_eq!(s.task_info(pid).unwrap().state, TaskState::Suspended);

    // A suspended task cannot be blocked or resumed twice.
    assert_eq!(s.block_task(pid).unwrap_err(), Errno::InvalidArgument);
    s.resume_task(pid).unwrap();
    assert_eq!(s.resume_task(pid).unwrap_err(), Errno::InvalidArgument);

    assert_eq!(s.current(0), Some(pid));
}

#[test]
fn test_task_blocked_head_promotes_successor() {
    let s = sched(1);
    let high = s.attach_task(80, CpuMask::all(1), None).unwrap();
    let low = s.attach_task(40, CpuMask::all(1), None).unwrap();

    assert_eq!(s.current(0), Some(high));
    s.block_task(high).unwrap();

    // The ready successor takes over the CPU.
    assert_eq!(s.current(0), Some(low));
    assert_eq!(s.task_info(low).unwrap().state, TaskState::Running);
    assert_list_shape(&list(&s, 0));
}

// ============================================================================
// Yield and priority changes
// ============================================================================

#[test]
fn test_task_yield_rotates_among_equals() {
    let s = sched(1);
    let a = s.attach_task(50, CpuMask::all(1), None).unwrap();
    let b = s.attach_task(50, CpuMask::all(1), None).unwrap();

    assert_eq!(s.current(0), Some(a));
    s.yield_task(a).unwrap();
    assert_eq!(s.current(0), Some(b));
    s.yield_task(b).unwrap();
    assert_eq!(s.current(0), Some(a));
    assert_list_shape(&list(&s, 0));
}

#[test]
fn test_task_yield_without_peer_is_noop() {
    let s = sched(1);
    let a = s.attach_task(50, CpuMask::all(1), None).unwrap();
    let b = s.attach_task(30, CpuMask::all(1), None).unwrap();

    // Nothing at priority 50 is waiting, so the head keeps running.
    s.yield_task(a).unwrap();
    assert_eq!(s.current(0), Some(a));

    // Only the running task may yield.
    assert_eq!(s.yield_task(b).unwrap_err(), Errno::InvalidArgument);
}

#[test]
fn test_task_set_priority_repositions() {
    let s = sched(1);
    let a = s.attach_task(50, CpuMask::all(1), None).unwrap();
    let b = s.attach_task(40, CpuMask::all(1), None).unwrap();

    s.set_priority(b, 60).unwrap();

    // B overtakes A and preempts it.
    assert_eq!(s.current(0), Some(b));
    assert_eq!(s.task_info(a).unwrap().state, TaskState::Ready);
    assert_list_shape(&list(&s, 0));

    // Base priority is the creation value and does not follow.
    assert_eq!(s.task_info(b).unwrap().base_priority, 40);
}

#[test]
fn test_task_set_priority_on_blocked_task() {
    let s = sched(1);
    let pid = s.attach_task(50, CpuMask::all(1), None).unwrap();
    s.block_task(pid).unwrap();

    s.set_priority(pid, 90).unwrap();
    assert_eq!(s.task_info(pid).unwrap().state, TaskState::Blocked);
    assert_eq!(s.task_info(pid).unwrap().priority, 90);

    // The new priority applies when the task requeues.
    s.unblock_task(pid).unwrap();
    assert_eq!(s.current(0), Some(pid));
}

#[test]
fn test_task_set_priority_validation() {
    let s = sched(1);
    let pid = s.attach_task(50, CpuMask::all(1), None).unwrap();

    assert_eq!(s.set_priority(pid, 0).unwrap_err(), Errno::InvalidArgument);
    assert_eq!(s.set_priority(0, 10).unwrap_err(), Errno::OperationNotPermitted);
    assert_eq!(s.set_priority(999, 10).unwrap_err(), Errno::NoSuchProcess);
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn test_task_stats_reflect_population() {
    let s = sched(2);
    let a = s.attach_task(50, CpuMask::all(2), None).unwrap();
    let b = s.attach_task(40, CpuMask::all(2), None).unwrap();
    s.block_task(b).unwrap();
    s.exit_task(a).unwrap();

    let stats = s.stats();
    assert_eq!(stats.ncpus, 2);
    assert_eq!(stats.online_cpus, 2);
    // Two idle tasks plus A and B.
    assert_eq!(stats.total_tasks, 4);
    assert_eq!(stats.blocked, 1);
    assert_eq!(stats.terminated, 1);
    assert_eq!(stats.running, 2);
    assert_eq!(stats.live_pids, 4);
}

#[test]
fn test_task_table_dump_runs() {
    let _ = env_logger::builder().is_test(true).try_init();
    let s = sched(2);
    let pid = s.attach_task(50, CpuMask::all(2), None).unwrap();
    s.cancel_task(pid).unwrap();
    s.block_task(pid).unwrap();

    // Table dump covers every column branch; visible with
    // RUST_LOG=info -- --nocapture.
    s.critical_section(|st| st.log_tasks());
}

#[test]
fn test_task_preemption_counters() {
    let s = sched(1);
    s.attach_task(50, CpuMask::all(1), None).unwrap();
    let stats = s.cpu_stats(0).unwrap();
    assert_eq!(stats.preemptions, 0);

    // A more urgent arrival displaces the running task.
    s.attach_task(80, CpuMask::all(1), None).unwrap();
    let stats = s.cpu_stats(0).unwrap();
    assert_eq!(stats.preemptions, 1);
    assert_eq!(stats.queue_len, 3);
}
