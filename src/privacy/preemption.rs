//! Scoped exclusive access to the controller's resolving list.
//!
//! The controller rejects (or worse, mishandles) resolving list updates while
//! advertising, scanning or initiating (5.3 Vol 4E 7.8.38). Holding a
//! PreemptionGuard means all GAP procedures are halted; they resume as soon
//! as the guard is dropped, on every exit path.

use log::trace;

use super::controller::GapProcedures;

/// While alive, all GAP procedures are preempted
#[must_use = "GAP procedures resume as soon as the guard is dropped"]
pub struct PreemptionGuard<'a> {
    gap: &'a dyn GapProcedures,
}

impl<'a> PreemptionGuard<'a> {
    /// Halt all GAP procedures until the returned guard is dropped
    pub fn acquire(gap: &'a dyn GapProcedures) -> Self {
        trace!("preempting GAP procedures");
        gap.preempt_all_procedures();
        Self { gap }
    }
}

impl Drop for PreemptionGuard<'_> {
    fn drop(&mut self) {
        trace!("resuming GAP procedures");
        self.gap.resume_procedures();
    }
}
