//! An address with type (public / random)

use std::fmt;

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
/// The type of an LE address (see: 5.3 Vol 6B 1.3 Device Address)
pub enum AddressType {
    /// A public address
    Public = 0x0,
    /// A random address (either random static or private)
    Random = 0x1,
}

impl AddressType {
    /// Strict conversion from the raw HCI value. Anything but 0x00 / 0x01 is None.
    pub fn from_raw(value: u8) -> Option<Self> {
        Self::from_u8(value)
    }

    /// Lenient conversion from the raw HCI value, folding out-of-range values
    /// onto Public / Random by their low bit.
    pub fn from_raw_reduced(value: u8) -> Self {
        if value % 2 == 0 {
            AddressType::Public
        } else {
            AddressType::Random
        }
    }

    /// The raw HCI value
    pub fn to_raw(self) -> u8 {
        self.to_u8().unwrap_or_default()
    }
}

/// An LE address
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[repr(C)]
pub struct AddressWithType {
    /// The 6 address bytes stored in little-endian format
    pub address: [u8; 6],
    /// The address type, either public or random
    pub address_type: AddressType,
}

impl AddressWithType {
    /// An empty/invalid address
    pub const EMPTY: Self = Self { address: [0, 0, 0, 0, 0, 0], address_type: AddressType::Public };

    /// Constructor
    pub const fn new(address: [u8; 6], address_type: AddressType) -> Self {
        Self { address, address_type }
    }
}

impl fmt::Display for AddressWithType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.address;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X} ({:?})",
            bytes[5], bytes[4], bytes[3], bytes[2], bytes[1], bytes[0], self.address_type,
        )
    }
}
