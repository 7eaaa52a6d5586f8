//! Nimbus scheduler core
//!
//! Multi-core task scheduling for the Nimbus kernel: per-CPU
//! assigned-task lists, priority-preemptive CPU selection, task group
//! lifecycle, and IRQ dispatch. Freestanding and allocation-free; the
//! embedding kernel owns the execution contexts and calls in here to
//! decide what should run where.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod errno;
pub mod irq;
pub mod sched;
pub mod sync;

pub use config::SchedConfig;
pub use errno::{Errno, KernResult};
pub use irq::{IrqContext, IrqDispatcher, IrqHandler};
pub use sched::{
    CpuMask, CpuState, CpuStats, Pid, SchedStats, Scheduler, SchedulerState, TaskId, TaskInfo,
    TaskState, Tcb, TcbFlags,
};
pub use sync::{CsGuard, CsLock};

// Re-exported for the k* macros.
pub use log;

#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::log!($level, $($arg)*)
    };
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {
        $crate::klog!($crate::log::Level::Error, $($arg)*)
    };
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {
        $crate::klog!($crate::log::Level::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {
        $crate::klog!($crate::log::Level::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {
        $crate::klog!($crate::log::Level::Debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {
        $crate::klog!($crate::log::Level::Trace, $($arg)*)
    };
}
