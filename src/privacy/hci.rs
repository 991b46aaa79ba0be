//! The HCI commands used to drive LE controller privacy (see: 5.3 Vol 4E 7.8),
//! along with their fixed parameter layouts.

use std::fmt;

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};

use crate::core::{
    address::{AddressType, AddressWithType},
    irk::Irk,
};

/// An HCI Error Code from the controller
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ErrorCode(pub u8);

impl ErrorCode {
    /// Operation completed successfully
    pub const SUCCESS: Self = ErrorCode(0x00);
    /// The controller does not know this command
    pub const UNKNOWN_HCI_COMMAND: Self = ErrorCode(0x01);
    /// The addressed entry does not exist
    pub const UNKNOWN_CONNECTION_IDENTIFIER: Self = ErrorCode(0x02);
    /// The resolving list is full
    pub const MEMORY_CAPACITY_EXCEEDED: Self = ErrorCode(0x07);
    /// The command is not allowed in the current controller state
    pub const COMMAND_DISALLOWED: Self = ErrorCode(0x0C);
    /// A parameter was out of range or malformed
    pub const INVALID_HCI_COMMAND_PARAMETERS: Self = ErrorCode(0x12);
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// LE controller opcodes (OGF 0x08) issued by the privacy module
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum OpCode {
    /// LE Add Device To Resolving List
    LeAddDeviceToResolvingList = 0x2027,
    /// LE Remove Device From Resolving List
    LeRemoveDeviceFromResolvingList = 0x2028,
    /// LE Clear Resolving List
    LeClearResolvingList = 0x2029,
    /// LE Set Address Resolution Enable
    LeSetAddressResolutionEnable = 0x202D,
    /// LE Set Resolvable Private Address Timeout
    LeSetResolvablePrivateAddressTimeout = 0x202E,
    /// LE Set Privacy Mode
    LeSetPrivacyMode = 0x204E,
}

impl OpCode {
    /// The 16-bit value sent on the wire
    pub fn to_raw(self) -> u16 {
        self.to_u16().unwrap_or_default()
    }

    /// Look up an opcode from its wire value
    pub fn from_raw(value: u16) -> Option<Self> {
        Self::from_u16(value)
    }
}

/// Per-peer privacy policy (see: 5.3 Vol 6B 4.7)
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum PrivacyMode {
    /// The peer must use a resolvable private address once it is on the list.
    /// Default on BT 5.0 controllers.
    Network = 0x00,
    /// The peer's identity address is accepted as well as its RPA
    Device = 0x01,
}

/// The largest RPA timeout the controller accepts, in seconds (11.5 hours)
pub const RPA_TIMEOUT_MAX: u16 = 0xA1B8;

/// A privacy command and its parameters
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrivacyCommand {
    /// Set how often the controller regenerates our RPA
    SetRpaTimeout {
        /// Seconds, 1 ..= RPA_TIMEOUT_MAX
        timeout: u16,
    },
    /// Turn address resolution on or off
    SetAddressResolutionEnable {
        /// Whether resolution should be enabled
        enable: bool,
    },
    /// Install an entry in the resolving list
    AddDeviceToResolvingList {
        /// The peer identity address
        peer: AddressWithType,
        /// The peer's IRK
        peer_irk: Irk,
        /// Our IRK, used to generate RPAs toward this peer
        local_irk: Irk,
    },
    /// Remove an entry from the resolving list
    RemoveDeviceFromResolvingList {
        /// The peer identity address
        peer: AddressWithType,
    },
    /// Remove every entry from the resolving list
    ClearResolvingList,
    /// Set the privacy mode of an existing entry
    SetPrivacyMode {
        /// The peer identity address
        peer: AddressWithType,
        /// The mode to apply
        mode: PrivacyMode,
    },
}

/// Reasons a command payload could not be decoded
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The payload had the wrong size for this opcode
    UnexpectedLength {
        /// The opcode being decoded
        opcode: OpCode,
        /// The fixed parameter length for this opcode
        expected: usize,
        /// The payload length received
        actual: usize,
    },
    /// A field held a value outside its allowed range
    InvalidField(&'static str),
}

const ADD_DEVICE_LEN: usize = 1 + 6 + 16 + 16;
const REMOVE_DEVICE_LEN: usize = 1 + 6;
const SET_PRIVACY_MODE_LEN: usize = 1 + 6 + 1;

impl PrivacyCommand {
    /// The opcode carrying this command
    pub fn opcode(&self) -> OpCode {
        match self {
            PrivacyCommand::SetRpaTimeout { .. } => OpCode::LeSetResolvablePrivateAddressTimeout,
            PrivacyCommand::SetAddressResolutionEnable { .. } => {
                OpCode::LeSetAddressResolutionEnable
            }
            PrivacyCommand::AddDeviceToResolvingList { .. } => OpCode::LeAddDeviceToResolvingList,
            PrivacyCommand::RemoveDeviceFromResolvingList { .. } => {
                OpCode::LeRemoveDeviceFromResolvingList
            }
            PrivacyCommand::ClearResolvingList => OpCode::LeClearResolvingList,
            PrivacyCommand::SetPrivacyMode { .. } => OpCode::LeSetPrivacyMode,
        }
    }

    /// Serialize the command parameters (little-endian, fixed layout)
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            PrivacyCommand::SetRpaTimeout { timeout } => {
                out.extend_from_slice(&timeout.to_le_bytes());
            }
            PrivacyCommand::SetAddressResolutionEnable { enable } => {
                out.push(u8::from(*enable));
            }
            PrivacyCommand::AddDeviceToResolvingList { peer, peer_irk, local_irk } => {
                out.reserve(ADD_DEVICE_LEN);
                push_address(&mut out, peer);
                out.extend_from_slice(peer_irk.as_bytes());
                out.extend_from_slice(local_irk.as_bytes());
            }
            PrivacyCommand::RemoveDeviceFromResolvingList { peer } => {
                push_address(&mut out, peer);
            }
            PrivacyCommand::ClearResolvingList => {}
            PrivacyCommand::SetPrivacyMode { peer, mode } => {
                push_address(&mut out, peer);
                out.push(mode.to_u8().unwrap_or_default());
            }
        }
        out
    }

    /// Decode the parameters of a command previously produced by to_payload()
    pub fn parse(opcode: OpCode, payload: &[u8]) -> Result<Self, ParseError> {
        let expect_len = |expected: usize| {
            if payload.len() == expected {
                Ok(())
            } else {
                Err(ParseError::UnexpectedLength { opcode, expected, actual: payload.len() })
            }
        };

        Ok(match opcode {
            OpCode::LeSetResolvablePrivateAddressTimeout => {
                expect_len(2)?;
                let timeout = u16::from_le_bytes([payload[0], payload[1]]);
                if timeout == 0 {
                    return Err(ParseError::InvalidField("rpa_timeout"));
                }
                PrivacyCommand::SetRpaTimeout { timeout }
            }
            OpCode::LeSetAddressResolutionEnable => {
                expect_len(1)?;
                let enable = match payload[0] {
                    0 => false,
                    1 => true,
                    _ => return Err(ParseError::InvalidField("address_resolution_enable")),
                };
                PrivacyCommand::SetAddressResolutionEnable { enable }
            }
            OpCode::LeAddDeviceToResolvingList => {
                expect_len(ADD_DEVICE_LEN)?;
                PrivacyCommand::AddDeviceToResolvingList {
                    peer: read_address(&payload[..7])?,
                    peer_irk: read_irk(&payload[7..23]),
                    local_irk: read_irk(&payload[23..39]),
                }
            }
            OpCode::LeRemoveDeviceFromResolvingList => {
                expect_len(REMOVE_DEVICE_LEN)?;
                PrivacyCommand::RemoveDeviceFromResolvingList { peer: read_address(payload)? }
            }
            OpCode::LeClearResolvingList => {
                expect_len(0)?;
                PrivacyCommand::ClearResolvingList
            }
            OpCode::LeSetPrivacyMode => {
                expect_len(SET_PRIVACY_MODE_LEN)?;
                PrivacyCommand::SetPrivacyMode {
                    peer: read_address(&payload[..7])?,
                    mode: PrivacyMode::from_u8(payload[7])
                        .ok_or(ParseError::InvalidField("privacy_mode"))?,
                }
            }
        })
    }
}

fn push_address(out: &mut Vec<u8>, address: &AddressWithType) {
    out.push(address.address_type.to_raw());
    out.extend_from_slice(&address.address);
}

// caller guarantees a 7 byte slice
fn read_address(bytes: &[u8]) -> Result<AddressWithType, ParseError> {
    let address_type =
        AddressType::from_raw(bytes[0]).ok_or(ParseError::InvalidField("peer_address_type"))?;
    let mut address = [0u8; 6];
    address.copy_from_slice(&bytes[1..7]);
    Ok(AddressWithType { address, address_type })
}

// caller guarantees a 16 byte slice
fn read_irk(bytes: &[u8]) -> Irk {
    let mut irk = [0u8; 16];
    irk.copy_from_slice(bytes);
    Irk(irk)
}
