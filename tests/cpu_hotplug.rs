//! CPU Hotplug Integration Tests
//!
//! Tests for taking CPUs out of service, task migration away from
//! offlined CPUs, and returning CPUs to the selectable set.

use nimbus_sched::{CpuMask, CpuState, Errno, SchedConfig, Scheduler, TaskInfo, TaskState};

fn sched(ncpus: usize) -> Scheduler {
    Scheduler::new(SchedConfig::new(ncpus)).unwrap()
}

fn list(s: &Scheduler, cpu: usize) -> Vec<TaskInfo> {
    s.critical_section(|st| st.assigned_tasks(cpu).collect())
}

fn assert_list_shape(tasks: &[TaskInfo]) {
    let last = tasks.last().unwrap();
    assert!(last.is_idle(), "list must end at the idle task");
    assert_eq!(tasks.iter().filter(|t| t.is_idle()).count(), 1);
    assert_eq!(tasks[0].state, TaskState::Running);
    for t in &tasks[1..] {
        assert_eq!(t.state, TaskState::Ready);
    }
    for w in tasks.windows(2) {
        assert!(w[0].priority >= w[1].priority);
    }
}

// ============================================================================
// Halt and migration
// ============================================================================

#[test]
fn test_halt_migrates_assigned_tasks() {
    let s = sched(2);
    let a = s.attach_task(50, CpuMask::single(0), None).unwrap();
    let b = s.attach_task(40, CpuMask::single(0), None).unwrap();
    assert_eq!(s.current(0), Some(a));

    s.halt_cpu(0).unwrap();

    // Only the idle task stays behind.
    assert_eq!(s.cpu_state(0), Some(CpuState::Halted));
    let stranded = s.cpu_stats(0).unwrap();
    assert_eq!(stranded.queue_len, 1);

    // Both tasks were pinned to cpu0, so both placements ignored the
    // mask.
    assert_eq!(s.current(1), Some(a));
    assert_eq!(s.task_info(b).unwrap().state, TaskState::Ready);
    assert_eq!(s.stats().fallback_selections, 2);
}

#[test]
fn test_halt_preserves_priority_order() {
    let s = sched(2);
    for prio in [30u8, 70, 50, 90, 10] {
        s.attach_task(prio, CpuMask::single(1), None).unwrap();
    }

    s.halt_cpu(1).unwrap();

    let moved = list(&s, 0);
    assert_eq!(moved.len(), 6);
    assert_list_shape(&moved);
    assert_eq!(moved[0].priority, 90);
}

#[test]
fn test_halt_last_schedulable_cpu_is_refused() {
    let s = sched(1);
    assert_eq!(s.halt_cpu(0).unwrap_err(), Errno::Busy);

    let s = sched(2);
    s.halt_cpu(0).unwrap();
    assert_eq!(s.halt_cpu(1).unwrap_err(), Errno::Busy);
    assert_eq!(s.hotplug_cpu(1).unwrap_err(), Errno::Busy);
}

#[test]
fn test_halt_is_idempotent() {
    let s = sched(2);
    s.halt_cpu(0).unwrap();
    s.halt_cpu(0).unwrap();
    assert_eq!(s.cpu_state(0), Some(CpuState::Halted));
}

#[test]
fn test_cpu_index_validation() {
    let s = sched(2);
    assert_eq!(s.halt_cpu(5).unwrap_err(), Errno::InvalidArgument);
    assert_eq!(s.hotplug_cpu(2).unwrap_err(), Errno::InvalidArgument);
    assert_eq!(s.resume_cpu(9).unwrap_err(), Errno::InvalidArgument);
    assert_eq!(s.cpu_state(2), None);
    assert!(s.cpu_stats(2).is_none());
}

// ============================================================================
// Hotplug state
// ============================================================================

#[test]
fn test_hotplug_behaves_like_halt_for_selection() {
    let s = sched(2);
    s.hotplug_cpu(1).unwrap();
    assert_eq!(s.cpu_state(1), Some(CpuState::Hotplug));

    // New work avoids the unplugged CPU even when asked for it.
    let pid = s.attach_task(50, CpuMask::single(1), None).unwrap();
    assert_eq!(s.task_info(pid).unwrap().cpu, 0);
    assert_eq!(s.stats().fallback_selections, 1);
}

#[test]
fn test_offline_state_can_be_switched() {
    let s = sched(2);
    s.hotplug_cpu(1).unwrap();
    s.halt_cpu(1).unwrap();
    assert_eq!(s.cpu_state(1), Some(CpuState::Halted));
    s.resume_cpu(1).unwrap();
    assert_eq!(s.cpu_state(1), Some(CpuState::Running));
}

// ============================================================================
// Resume
// ============================================================================

#[test]
fn test_resume_returns_cpu_to_selection() {
    let s = sched(2);
    s.halt_cpu(1).unwrap();

    let first = s.attach_task(50, CpuMask::single(1), None).unwrap();
    assert_eq!(s.task_info(first).unwrap().cpu, 0);

    s.resume_cpu(1).unwrap();
    assert_eq!(s.cpu_state(1), Some(CpuState::Running));

    let second = s.attach_task(50, CpuMask::single(1), None).unwrap();
    assert_eq!(s.task_info(second).unwrap().cpu, 1);

    // Only the pre-resume placement had to fall back.
    assert_eq!(s.stats().fallback_selections, 1);
}

#[test]
fn test_resume_running_cpu_is_noop() {
    let s = sched(2);
    s.resume_cpu(1).unwrap();
    assert_eq!(s.cpu_state(1), Some(CpuState::Running));
}

#[test]
fn test_stats_track_online_cpus() {
    let s = sched(4);
    assert_eq!(s.stats().online_cpus, 4);
    s.halt_cpu(2).unwrap();
    s.hotplug_cpu(3).unwrap();
    assert_eq!(s.stats().online_cpus, 2);
    s.resume_cpu(3).unwrap();
    assert_eq!(s.stats().online_cpus, 3);
}

// ============================================================================
// Churn
// ============================================================================

#[test]
fn test_lists_stay_well_formed_through_hotplug_churn() {
    let s = sched(3);
    let mut pids = Vec::new();
    for (i, prio) in [20u8, 80, 40, 60, 120, 30, 90, 10, 200, 55]
        .iter()
        .enumerate()
    {
        let mask = CpuMask::single(i % 3);
        pids.push(s.attach_task(*prio, mask, None).unwrap());
    }

    s.halt_cpu(1).unwrap();
    for cpu in [0, 2] {
        assert_list_shape(&list(&s, cpu));
    }

    s.resume_cpu(1).unwrap();
    s.hotplug_cpu(2).unwrap();
    for cpu in [0, 1] {
        assert_list_shape(&list(&s, cpu));
    }

    // Nothing was lost along the way.
    let assigned: usize = (0..3).map(|c| list(&s, c).len()).sum();
    assert_eq!(assigned, pids.len() + 3);
    for pid in pids {
        let info = s.task_info(pid).unwrap();
        assert!(matches!(info.state, TaskState::Ready | TaskState::Running));
        assert_ne!(info.cpu, 2);
    }
}
