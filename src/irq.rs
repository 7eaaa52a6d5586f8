//! IRQ dispatch
//!
//! Interrupt-to-handler routing. The embedding kernel's low-level
//! vector stubs call [`IrqDispatcher::dispatch`] with the IRQ number
//! and a per-entry [`IrqContext`]; handlers that want the scheduler
//! to run on return set the resched flag instead of calling into the
//! scheduler from interrupt context.
//!
//! An unregistered or out-of-range vector is not fatal: misconfigured
//! controllers happen, so the fallback path counts the event, logs,
//! and returns.

use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::config::NR_IRQS;
use crate::errno::{Errno, KernResult};
use crate::kwarn;

/// Interrupt handler signature: IRQ number plus the dispatch context.
pub type IrqHandler = fn(u32, &mut IrqContext);

/// Per-dispatch context handed to the handler.
#[derive(Debug)]
pub struct IrqContext {
    /// CPU the interrupt arrived on.
    pub cpu: u16,
    need_resched: bool,
}

impl IrqContext {
    pub fn new(cpu: u16) -> Self {
        Self {
            cpu,
            need_resched: false,
        }
    }

    /// Asks the interrupt-return path to run the scheduler.
    pub fn request_reschedule(&mut self) {
        self.need_resched = true;
    }

    pub fn resched_requested(&self) -> bool {
        self.need_resched
    }
}

/// Fixed-size IRQ vector table.
pub struct IrqDispatcher {
    vectors: Mutex<[Option<IrqHandler>; NR_IRQS]>,
    unexpected: AtomicU64,
}

impl IrqDispatcher {
    pub const fn new() -> Self {
        Self {
            vectors: Mutex::new([None; NR_IRQS]),
            unexpected: AtomicU64::new(0),
        }
    }

    /// Installs a handler for `irq`, replacing any previous one.
    pub fn attach(&self, irq: u32, handler: IrqHandler) -> KernResult<()> {
        if irq as usize >= NR_IRQS {
            return Err(Errno::InvalidArgument);
        }
        self.vectors.lock()[irq as usize] = Some(handler);
        Ok(())
    }

    /// Removes the handler for `irq`; further interrupts on that
    /// vector take the unexpected path.
    pub fn detach(&self, irq: u32) -> KernResult<()> {
        if irq as usize >= NR_IRQS {
            return Err(Errno::InvalidArgument);
        }
        self.vectors.lock()[irq as usize] = None;
        Ok(())
    }

    pub fn is_attached(&self, irq: u32) -> bool {
        (irq as usize) < NR_IRQS && self.vectors.lock()[irq as usize].is_some()
    }

    /// Routes one interrupt. The handler is copied out before the
    /// call, so handlers may attach or detach vectors themselves.
    pub fn dispatch(&self, irq: u32, ctx: &mut IrqContext) {
        let handler = if (irq as usize) < NR_IRQS {
            self.vectors.lock()[irq as usize]
        } else {
            None
        };
        match handler {
            Some(handler) => handler(irq, ctx),
            None => {
                self.unexpected.fetch_add(1, Ordering::Relaxed);
                kwarn!("unexpected irq {} on cpu{}", irq, ctx.cpu);
            }
        }
    }

    /// Interrupts that arrived with no handler attached.
    pub fn unexpected_count(&self) -> u64 {
        self.unexpected.load(Ordering::Relaxed)
    }
}

impl Default for IrqDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
