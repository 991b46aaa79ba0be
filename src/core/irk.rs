//! Identity Resolving Keys (see: 5.3 Vol 3H 2.4.2.1)

use std::{fmt, str::FromStr};

use anyhow::{bail, Error};

/// A 128-bit Identity Resolving Key, stored in the byte order sent over HCI.
/// Debug output never includes the key bytes.
#[derive(Copy, Clone, Default, Hash, PartialEq, Eq)]
pub struct Irk(pub [u8; 16]);

impl Irk {
    /// The all-zero key. Doubles as the "no key installed" sentinel.
    pub const ZERO: Self = Irk([0; 16]);

    /// Installed as the local IRK if the host never supplies one
    pub const DEFAULT: Self = Irk([
        0xef, 0x8d, 0xe2, 0x16, 0x4f, 0xec, 0x43, 0x0d, 0xbf, 0x5b, 0xdd, 0x34, 0xc0, 0x53, 0x1e,
        0xb8,
    ]);

    /// Whether this is the all-zero key
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// The raw key bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<[u8; 16]> for Irk {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Irk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            write!(f, "Irk(<zero>)")
        } else {
            write!(f, "Irk(<redacted>)")
        }
    }
}

impl fmt::Display for Irk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: Vec<String> = self.0.iter().map(|b| format!("{:02X}", b)).collect();
        write!(f, "{}", s.join(":"))
    }
}

/// Accepts 32 hex digits, optionally separated by ':', ' ' or '-'
impl FromStr for Irk {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut nibbles = Vec::with_capacity(32);
        for c in s.chars() {
            match c {
                ':' | ' ' | '-' => continue,
                _ => match c.to_digit(16) {
                    Some(n) => nibbles.push(n as u8),
                    None => bail!("invalid character {c:?} in IRK {s:?}"),
                },
            }
        }
        if nibbles.len() != 32 {
            bail!("IRK {s:?} must be 16 octets, got {} hex digits", nibbles.len());
        }

        let mut bytes = [0u8; 16];
        for (byte, pair) in bytes.iter_mut().zip(nibbles.chunks_exact(2)) {
            *byte = pair[0] << 4 | pair[1];
        }
        Ok(Self(bytes))
    }
}
