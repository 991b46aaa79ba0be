//! This module owns the local Identity Resolving Key and drives the
//! controller-based LE privacy feature (see: 5.3 Vol 6B 6). In particular,
//! it keeps the controller's resolving list consistent with our IRK,
//! rebuilding it whenever the IRK changes, and installs peers into it as
//! they bond.

use std::{fmt, rc::Rc};

use log::{info, warn};

use crate::core::irk::Irk;

use self::{
    config::PrivacyConfig,
    controller::{send_command, GapProcedures, HciController, PrivacyStats},
    hci::{ErrorCode, PrivacyCommand, PrivacyMode, RPA_TIMEOUT_MAX},
    resolving_list::{AddEntryError, ResolvingListCoordinator, ResolvingListEntry},
};

pub mod config;
pub mod controller;
pub mod hci;
pub mod mocks;
pub mod module;
pub mod preemption;
pub mod resolving_list;

/// Errors returned by privacy operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrivacyError {
    /// A caller-supplied value is out of range (RPA timeout, address type)
    InvalidParameter,
    /// The controller returned a non-success status
    ControllerRejected(ErrorCode),
    /// A multi-step sequence stopped partway through
    SequenceAborted {
        /// The step that failed
        step: RotationStep,
        /// The status it failed with
        status: ErrorCode,
    },
}

impl PrivacyError {
    /// The HCI status equivalent to this error
    pub fn status(&self) -> ErrorCode {
        match self {
            PrivacyError::InvalidParameter => ErrorCode::INVALID_HCI_COMMAND_PARAMETERS,
            PrivacyError::ControllerRejected(status) => *status,
            PrivacyError::SequenceAborted { status, .. } => *status,
        }
    }
}

impl fmt::Display for PrivacyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivacyError::InvalidParameter => write!(f, "invalid parameter"),
            PrivacyError::ControllerRejected(status) => {
                write!(f, "controller rejected command with status {status}")
            }
            PrivacyError::SequenceAborted { step, status } => {
                write!(f, "IRK rotation aborted at {step:?} with status {status}")
            }
        }
    }
}

impl std::error::Error for PrivacyError {}

/// The steps of an IRK rotation, in order
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RotationStep {
    /// Turn off address resolution
    DisableResolution,
    /// Drop every entry keyed to the old IRK
    ClearResolvingList,
    /// Turn address resolution back on
    EnableResolution,
    /// Install the self-entry carrying the new IRK
    AddSelfEntry,
    /// Put the self-entry in Device privacy mode
    SetSelfEntryPrivacyMode,
}

impl RotationStep {
    fn aborted(self, e: PrivacyError) -> PrivacyError {
        PrivacyError::SequenceAborted { step: self, status: e.status() }
    }
}

#[derive(Debug, Default)]
struct PrivacyState {
    /// Set once the RPA timeout has been accepted by the controller
    started: bool,
    /// All-zero until the first rotation
    local_irk: Irk,
}

/// Owns the local IRK and sequences all privacy-related controller commands
pub struct PrivacyManager {
    config: PrivacyConfig,
    state: PrivacyState,
    controller: Rc<dyn HciController>,
    resolving_list: ResolvingListCoordinator,
}

impl PrivacyManager {
    /// Constructor. No commands are sent until the first operation.
    pub fn new(
        config: PrivacyConfig,
        controller: Rc<dyn HciController>,
        gap: Rc<dyn GapProcedures>,
        stats: Rc<dyn PrivacyStats>,
    ) -> Self {
        Self {
            config,
            state: PrivacyState::default(),
            resolving_list: ResolvingListCoordinator::new(controller.clone(), gap, stats),
            controller,
        }
    }

    /// The configuration this manager was created with
    pub fn config(&self) -> &PrivacyConfig {
        &self.config
    }

    /// Install the configured local IRK (or the default one), then start RPA
    /// generation. Invoked on stack bringup.
    pub fn start(&mut self) -> Result<(), PrivacyError> {
        self.set_local_irk(self.config.local_irk)?;
        self.ensure_started()
    }

    /// Whether RPA generation has been configured in the controller
    pub fn is_started(&self) -> bool {
        self.state.started
    }

    /// Program the RPA timeout into the controller, unless already done
    pub fn ensure_started(&mut self) -> Result<(), PrivacyError> {
        if self.state.started {
            return Ok(());
        }

        let timeout = self.config.rpa_timeout;
        if timeout == 0 || timeout > RPA_TIMEOUT_MAX {
            warn!("RPA timeout {timeout}s is out of range");
            return Err(PrivacyError::InvalidParameter);
        }

        send_command(self.controller.as_ref(), PrivacyCommand::SetRpaTimeout { timeout })?;
        info!("privacy started, RPA timeout {timeout}s");
        self.state.started = true;
        Ok(())
    }

    /// Replace the local IRK, or install the default one if None.
    ///
    /// If the key changes, the resolving list is rebuilt: every entry carries
    /// the old local IRK, so they are all dropped and the self-entry is
    /// re-added with the new one. On failure the new key is still retained,
    /// but the controller state is unknown and the whole call should be
    /// retried.
    pub fn set_local_irk(&mut self, irk: Option<Irk>) -> Result<(), PrivacyError> {
        let new_irk = irk.unwrap_or(Irk::DEFAULT);
        if new_irk == self.state.local_irk {
            return Ok(());
        }

        info!("local IRK changed, rebuilding resolving list");
        self.state.local_irk = new_irk;

        self.resolving_list
            .set_resolution_enabled(false)
            .map_err(|e| RotationStep::DisableResolution.aborted(e))?;
        self.resolving_list.clear().map_err(|e| RotationStep::ClearResolvingList.aborted(e))?;
        self.resolving_list
            .set_resolution_enabled(true)
            .map_err(|e| RotationStep::EnableResolution.aborted(e))?;

        // The controller generates RPAs for undirected advertising from the
        // entry whose peer is the all-zero address. It is not a real peer, so
        // its peer IRK stays zero.
        let entry = ResolvingListEntry::self_entry(new_irk);
        self.resolving_list
            .add(
                entry.peer.address_type.to_raw(),
                entry.peer.address,
                entry.peer_irk,
                entry.local_irk,
            )
            .map_err(|e| match e {
                AddEntryError::NotApplied(e) => RotationStep::AddSelfEntry.aborted(e),
                AddEntryError::PartiallyApplied(e) => {
                    RotationStep::SetSelfEntryPrivacyMode.aborted(e)
                }
            })
    }

    /// The current local IRK (all-zero if none has been installed yet)
    // TODO: report an error here when the controller lacks LL privacy, once
    // supported features are plumbed through to this module
    pub fn read_local_irk(&self) -> Irk {
        self.state.local_irk
    }

    /// Add a bonded peer to the resolving list, in Device privacy mode
    pub fn add_device(
        &self,
        address_type: u8,
        address: [u8; 6],
        peer_irk: Irk,
    ) -> Result<(), AddEntryError> {
        self.resolving_list.add(address_type, address, peer_irk, self.state.local_irk)
    }

    /// Remove a peer from the resolving list. Invalid address types are
    /// handled according to the configured AddressTypePolicy.
    pub fn remove_device(&self, address_type: u8, address: [u8; 6]) -> Result<(), PrivacyError> {
        self.resolving_list.remove(address_type, address, self.config.remove_address_type_policy)
    }

    /// Change the privacy mode of a peer already on the resolving list. The
    /// caller is responsible for making sure no GAP procedure is running.
    pub fn set_privacy_mode(
        &self,
        address_type: u8,
        address: [u8; 6],
        mode: PrivacyMode,
    ) -> Result<(), PrivacyError> {
        self.resolving_list.set_privacy_mode(address_type, address, mode)
    }

    /// Forget all privacy state. The controller is not touched, since its
    /// own reset clears the resolving list.
    pub fn reset(&mut self) {
        info!("resetting privacy state");
        self.state = PrivacyState::default();
    }
}
