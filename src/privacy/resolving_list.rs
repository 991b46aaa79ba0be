//! This module sequences updates to the resolving list held by the
//! controller. The host keeps no copy of the list: an update only takes effect
//! if the controller acknowledges it.
//!
//! Adding and removing entries is only legal while no GAP procedure is
//! running, so both are wrapped in a PreemptionGuard. Clearing the list and
//! setting the privacy mode of an entry are not bracketed here.

use std::{fmt, rc::Rc};

use log::{info, warn};

use crate::core::{
    address::{AddressType, AddressWithType},
    irk::Irk,
};

use super::{
    config::AddressTypePolicy,
    controller::{send_command, GapProcedures, HciController, PrivacyCounter, PrivacyStats},
    hci::{PrivacyCommand, PrivacyMode},
    preemption::PreemptionGuard,
    PrivacyError,
};

/// One row of the controller's resolving list
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResolvingListEntry {
    /// The peer identity address
    pub peer: AddressWithType,
    /// The peer's IRK, all-zero for the self-entry
    pub peer_irk: Irk,
    /// Our IRK at the time the entry was installed
    pub local_irk: Irk,
    /// Whether the identity address is accepted alongside RPAs
    pub privacy_mode: PrivacyMode,
}

impl ResolvingListEntry {
    /// The entry used to generate RPAs for undirected advertising
    pub fn self_entry(local_irk: Irk) -> Self {
        Self {
            peer: AddressWithType::EMPTY,
            peer_irk: Irk::ZERO,
            local_irk,
            privacy_mode: PrivacyMode::Device,
        }
    }
}

/// Failure to install a resolving list entry
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddEntryError {
    /// Nothing was installed in the controller
    NotApplied(PrivacyError),
    /// The entry was installed, but its privacy mode could not be set to
    /// Device. The caller may roll back with remove.
    PartiallyApplied(PrivacyError),
}

impl AddEntryError {
    /// The underlying error
    pub fn cause(&self) -> PrivacyError {
        match self {
            AddEntryError::NotApplied(e) | AddEntryError::PartiallyApplied(e) => *e,
        }
    }

    /// Whether the entry is left behind in the controller
    pub fn is_partially_applied(&self) -> bool {
        matches!(self, AddEntryError::PartiallyApplied(_))
    }
}

impl From<AddEntryError> for PrivacyError {
    fn from(value: AddEntryError) -> Self {
        value.cause()
    }
}

impl fmt::Display for AddEntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddEntryError::NotApplied(e) => write!(f, "entry not added: {e}"),
            AddEntryError::PartiallyApplied(e) => {
                write!(f, "entry added but privacy mode not set: {e}")
            }
        }
    }
}

impl std::error::Error for AddEntryError {}

/// Issues resolving list commands to the controller, holding off GAP
/// procedures where required
pub(crate) struct ResolvingListCoordinator {
    controller: Rc<dyn HciController>,
    gap: Rc<dyn GapProcedures>,
    stats: Rc<dyn PrivacyStats>,
}

impl ResolvingListCoordinator {
    /// Constructor
    pub(crate) fn new(
        controller: Rc<dyn HciController>,
        gap: Rc<dyn GapProcedures>,
        stats: Rc<dyn PrivacyStats>,
    ) -> Self {
        Self { controller, gap, stats }
    }

    /// Install a peer in the resolving list, then put it in Device privacy
    /// mode. The raw address type must be Public or Random. The local IRK
    /// must be the one currently owned by the PrivacyManager.
    pub(crate) fn add(
        &self,
        address_type: u8,
        address: [u8; 6],
        peer_irk: Irk,
        local_irk: Irk,
    ) -> Result<(), AddEntryError> {
        let res = {
            let _guard = PreemptionGuard::acquire(self.gap.as_ref());
            self.add_while_preempted(address_type, address, peer_irk, local_irk)
        };

        match res {
            Ok(()) => self.stats.increment(PrivacyCounter::AddEntry),
            Err(e) => {
                warn!("failed to add resolving list entry: {e}");
                self.stats.increment(PrivacyCounter::AddEntryFail);
            }
        }
        res
    }

    fn add_while_preempted(
        &self,
        address_type: u8,
        address: [u8; 6],
        peer_irk: Irk,
        local_irk: Irk,
    ) -> Result<(), AddEntryError> {
        let peer = strict_address(address_type, address).map_err(AddEntryError::NotApplied)?;

        info!("adding {peer} to resolving list");
        send_command(
            self.controller.as_ref(),
            PrivacyCommand::AddDeviceToResolvingList { peer, peer_irk, local_irk },
        )
        .map_err(AddEntryError::NotApplied)?;

        // BT 5.0 controllers default to Network privacy mode, which breaks
        // peers that keep using their identity address. Default to Device
        // mode; the upper layer can switch a peer to Network if needed.
        self.set_privacy_mode(address_type, address, PrivacyMode::Device)
            .map_err(AddEntryError::PartiallyApplied)
    }

    /// Remove a single peer from the resolving list
    pub fn remove(
        &self,
        address_type: u8,
        address: [u8; 6],
        policy: AddressTypePolicy,
    ) -> Result<(), PrivacyError> {
        let _guard = PreemptionGuard::acquire(self.gap.as_ref());

        let peer = match policy {
            AddressTypePolicy::Strict => strict_address(address_type, address)?,
            AddressTypePolicy::ReduceModulo2 => {
                let reduced = AddressType::from_raw_reduced(address_type);
                if AddressType::from_raw(address_type).is_none() {
                    warn!("reducing invalid peer address type {address_type} to {reduced:?}");
                }
                AddressWithType { address, address_type: reduced }
            }
        };

        info!("removing {peer} from resolving list");
        send_command(
            self.controller.as_ref(),
            PrivacyCommand::RemoveDeviceFromResolvingList { peer },
        )
    }

    /// Remove every entry from the resolving list. Only used while rotating
    /// the local IRK.
    pub(crate) fn clear(&self) -> Result<(), PrivacyError> {
        info!("clearing resolving list");
        send_command(self.controller.as_ref(), PrivacyCommand::ClearResolvingList)
    }

    /// Enable or disable address resolution in the controller
    pub(crate) fn set_resolution_enabled(&self, enable: bool) -> Result<(), PrivacyError> {
        send_command(
            self.controller.as_ref(),
            PrivacyCommand::SetAddressResolutionEnable { enable },
        )
    }

    /// Set the privacy mode for a peer already on the resolving list.
    ///
    /// Not bracketed by GAP preemption: standalone callers must make sure no
    /// procedure is using the list.
    pub fn set_privacy_mode(
        &self,
        address_type: u8,
        address: [u8; 6],
        mode: PrivacyMode,
    ) -> Result<(), PrivacyError> {
        let peer = strict_address(address_type, address)?;
        send_command(self.controller.as_ref(), PrivacyCommand::SetPrivacyMode { peer, mode })
    }
}

fn strict_address(address_type: u8, address: [u8; 6]) -> Result<AddressWithType, PrivacyError> {
    match AddressType::from_raw(address_type) {
        Some(address_type) => Ok(AddressWithType { address, address_type }),
        None => {
            warn!("rejecting invalid peer address type {address_type}");
            Err(PrivacyError::InvalidParameter)
        }
    }
}
