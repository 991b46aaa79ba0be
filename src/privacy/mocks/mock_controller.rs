//! This module mocks an LE controller together with the GAP procedure gate
//! in front of it, sharing a single event log so tests can check how commands
//! are ordered relative to preemption.
//!
//! It tracks the resolving list, the address resolution flag and the RPA
//! timeout held by the controller, and asserts on violation of the
//! invariants callers must uphold (no list mutation outside of preemption,
//! no nested preemption).

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::privacy::{
    controller::{GapProcedures, HciController, PrivacyCounter, PrivacyStats},
    hci::{ErrorCode, OpCode, PrivacyCommand, PrivacyMode},
    resolving_list::ResolvingListEntry,
};

/// Events representing calls into the mocked collaborators
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MockControllerEvent {
    /// GapProcedures#preempt_all_procedures invoked
    Preempt,
    /// GapProcedures#resume_procedures invoked
    Resume,
    /// HciController#transmit_command invoked with this (decoded) command
    Command(PrivacyCommand),
}

/// Shared handle to the mocked controller. Clones observe the same state.
#[derive(Clone, Default)]
pub struct MockController(Rc<RefCell<MockControllerState>>);

#[derive(Debug, Default)]
struct MockControllerState {
    events: Vec<MockControllerEvent>,
    failures: HashMap<OpCode, ErrorCode>,
    preempted: bool,
    resolution_enabled: bool,
    rpa_timeout: Option<u16>,
    resolving_list: Vec<ResolvingListEntry>,
    counters: HashMap<PrivacyCounter, u32>,
}

impl MockController {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far, in order
    pub fn events(&self) -> Vec<MockControllerEvent> {
        self.0.borrow().events.clone()
    }

    /// Only the commands recorded so far, in order
    pub fn commands(&self) -> Vec<PrivacyCommand> {
        self.0
            .borrow()
            .events
            .iter()
            .filter_map(|event| match event {
                MockControllerEvent::Command(command) => Some(*command),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded events (controller state is kept)
    pub fn clear_events(&self) {
        self.0.borrow_mut().events.clear();
    }

    /// Reject every subsequent command with this opcode with the given status.
    /// Rejected commands are still recorded but do not change controller state.
    pub fn fail_command(&self, opcode: OpCode, status: ErrorCode) {
        assert_ne!(status, ErrorCode::SUCCESS, "a failure needs a non-success status");
        self.0.borrow_mut().failures.insert(opcode, status);
    }

    /// Stop rejecting commands with this opcode
    pub fn succeed_command(&self, opcode: OpCode) {
        self.0.borrow_mut().failures.remove(&opcode);
    }

    /// The resolving list as held by the controller, in insertion order
    pub fn resolving_list(&self) -> Vec<ResolvingListEntry> {
        self.0.borrow().resolving_list.clone()
    }

    /// Whether address resolution is enabled in the controller
    pub fn resolution_enabled(&self) -> bool {
        self.0.borrow().resolution_enabled
    }

    /// The last RPA timeout accepted by the controller
    pub fn rpa_timeout(&self) -> Option<u16> {
        self.0.borrow().rpa_timeout
    }

    /// Whether GAP procedures are currently preempted
    pub fn is_preempted(&self) -> bool {
        self.0.borrow().preempted
    }

    /// How many times a counter was incremented
    pub fn counter(&self, counter: PrivacyCounter) -> u32 {
        self.0.borrow().counters.get(&counter).copied().unwrap_or(0)
    }
}

impl MockControllerState {
    fn execute(&mut self, command: PrivacyCommand) -> Result<(), ErrorCode> {
        match command {
            PrivacyCommand::SetRpaTimeout { timeout } => {
                self.rpa_timeout = Some(timeout);
            }
            PrivacyCommand::SetAddressResolutionEnable { enable } => {
                self.resolution_enabled = enable;
            }
            PrivacyCommand::AddDeviceToResolvingList { peer, peer_irk, local_irk } => {
                assert!(self.preempted, "resolving list modified while GAP procedures are active");
                if self.resolving_list.iter().any(|entry| entry.peer == peer) {
                    return Err(ErrorCode::INVALID_HCI_COMMAND_PARAMETERS);
                }
                self.resolving_list.push(ResolvingListEntry {
                    peer,
                    peer_irk,
                    local_irk,
                    privacy_mode: PrivacyMode::Network,
                });
            }
            PrivacyCommand::RemoveDeviceFromResolvingList { peer } => {
                assert!(self.preempted, "resolving list modified while GAP procedures are active");
                let before = self.resolving_list.len();
                self.resolving_list.retain(|entry| entry.peer != peer);
                if self.resolving_list.len() == before {
                    return Err(ErrorCode::UNKNOWN_CONNECTION_IDENTIFIER);
                }
            }
            PrivacyCommand::ClearResolvingList => {
                self.resolving_list.clear();
            }
            PrivacyCommand::SetPrivacyMode { peer, mode } => {
                let entry = self
                    .resolving_list
                    .iter_mut()
                    .find(|entry| entry.peer == peer)
                    .ok_or(ErrorCode::UNKNOWN_CONNECTION_IDENTIFIER)?;
                entry.privacy_mode = mode;
            }
        }
        Ok(())
    }
}

impl HciController for MockController {
    fn transmit_command(&self, opcode: OpCode, payload: &[u8]) -> Result<(), ErrorCode> {
        let command = PrivacyCommand::parse(opcode, payload)
            .unwrap_or_else(|e| panic!("malformed {opcode:?} payload {payload:02X?}: {e:?}"));

        let mut state = self.0.borrow_mut();
        state.events.push(MockControllerEvent::Command(command));
        if let Some(status) = state.failures.get(&opcode) {
            return Err(*status);
        }
        state.execute(command)
    }
}

impl GapProcedures for MockController {
    fn preempt_all_procedures(&self) {
        let mut state = self.0.borrow_mut();
        assert!(!state.preempted, "GAP procedures already preempted");
        state.preempted = true;
        state.events.push(MockControllerEvent::Preempt);
    }

    fn resume_procedures(&self) {
        let mut state = self.0.borrow_mut();
        assert!(state.preempted, "GAP procedures resumed without being preempted");
        state.preempted = false;
        state.events.push(MockControllerEvent::Resume);
    }
}

impl PrivacyStats for MockController {
    fn increment(&self, counter: PrivacyCounter) {
        *self.0.borrow_mut().counters.entry(counter).or_default() += 1;
    }
}
