//! The collaborators the privacy module is driven through: the HCI command
//! channel, the GAP procedure gate, and a statistics sink. Each is provided
//! to the PrivacyManager on construction, to be either mocked (in test) or
//! linked to the rest of the stack (in production).

use std::cell::Cell;

use log::{debug, warn};

use super::{
    hci::{ErrorCode, OpCode, PrivacyCommand},
    PrivacyError,
};

/// The TX end of the HCI command channel
pub trait HciController {
    /// Sends a command and blocks until the controller reports its status.
    /// Returns Err with the status if it is anything other than SUCCESS.
    fn transmit_command(&self, opcode: OpCode, payload: &[u8]) -> Result<(), ErrorCode>;
}

/// Exclusive access to the link layer, as provided by the GAP procedure manager
pub trait GapProcedures {
    /// Stop advertising, scanning and pending connection attempts, and hold
    /// off any new ones until resume_procedures() is invoked
    fn preempt_all_procedures(&self);
    /// Allow GAP procedures to start again
    fn resume_procedures(&self);
}

/// Counters bumped by the privacy module
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum PrivacyCounter {
    /// A resolving list entry was installed (including its privacy mode)
    AddEntry,
    /// A resolving list entry could not be installed
    AddEntryFail,
}

/// Observability sink for PrivacyCounters
pub trait PrivacyStats {
    /// Bump the given counter by one
    fn increment(&self, counter: PrivacyCounter);
}

/// Plain in-memory counters, for stacks without a stats backend
#[derive(Debug, Default)]
pub struct PrivacyCounters {
    add_entry: Cell<u32>,
    add_entry_fail: Cell<u32>,
}

impl PrivacyCounters {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter
    pub fn get(&self, counter: PrivacyCounter) -> u32 {
        self.cell(counter).get()
    }

    fn cell(&self, counter: PrivacyCounter) -> &Cell<u32> {
        match counter {
            PrivacyCounter::AddEntry => &self.add_entry,
            PrivacyCounter::AddEntryFail => &self.add_entry_fail,
        }
    }
}

impl PrivacyStats for PrivacyCounters {
    fn increment(&self, counter: PrivacyCounter) {
        let cell = self.cell(counter);
        cell.set(cell.get().saturating_add(1));
    }
}

/// Encode and send a single command, mapping a rejection into a PrivacyError
pub(crate) fn send_command(
    controller: &dyn HciController,
    command: PrivacyCommand,
) -> Result<(), PrivacyError> {
    let opcode = command.opcode();
    debug!("sending {command:?}");
    controller.transmit_command(opcode, &command.to_payload()).map_err(|status| {
        warn!("controller rejected {opcode:?} with status {status}");
        PrivacyError::ControllerRejected(status)
    })
}
