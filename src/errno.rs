//! Kernel error codes
//!
//! POSIX-style errno values carried through `KernResult`. Syscall
//! shims convert to the negated-integer convention at the ABI edge via
//! [`Errno::as_neg_i32`]; inside the kernel the enum form keeps match
//! arms readable.

/// Result alias used by every fallible scheduler primitive.
pub type KernResult<T> = Result<T, Errno>;

/// Error codes returned by the scheduler core.
///
/// Values follow the POSIX errno numbering so they can cross the
/// syscall boundary unchanged.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Errno {
    /// Operation not permitted (EPERM, 1)
    OperationNotPermitted = 1,

    /// No such process (ESRCH, 3)
    NoSuchProcess = 3,

    /// No child processes (ECHILD, 10)
    NoChild = 10,

    /// Try again (EAGAIN, 11): a fixed-capacity table is full.
    TryAgain = 11,

    /// Out of memory (ENOMEM, 12)
    OutOfMemory = 12,

    /// Device or resource busy (EBUSY, 16)
    Busy = 16,

    /// Invalid argument (EINVAL, 22)
    InvalidArgument = 22,

    /// Function not implemented (ENOSYS, 38)
    NotImplemented = 38,
}

impl Errno {
    /// Negated value for syscall-style returns.
    pub const fn as_neg_i32(self) -> i32 {
        -(self as i32)
    }

    /// Symbolic POSIX name, for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Errno::OperationNotPermitted => "EPERM",
            Errno::NoSuchProcess => "ESRCH",
            Errno::NoChild => "ECHILD",
            Errno::TryAgain => "EAGAIN",
            Errno::OutOfMemory => "ENOMEM",
            Errno::Busy => "EBUSY",
            Errno::InvalidArgument => "EINVAL",
            Errno::NotImplemented => "ENOSYS",
        }
    }
}

impl core::fmt::Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
