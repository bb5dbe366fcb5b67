//! Contract code metadata flags.
//!
//! Two bytes stored next to the contract code:
//! - byte 0: `UPGRADEABLE` (0x01), `READABLE` (0x04)
//! - byte 1: `PAYABLE` (0x02), `PAYABLE_BY_SC` (0x04)

use crate::error::TypesError;

/// Decoded code metadata of a contract account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodeMetadata {
    pub upgradeable: bool,
    /// Other contracts may read this account's storage.
    pub readable: bool,
    pub payable: bool,
    pub payable_by_sc: bool,
}

impl CodeMetadata {
    pub const LEN: usize = 2;

    const UPGRADEABLE: u8 = 0x01;
    const READABLE: u8 = 0x04;
    const PAYABLE: u8 = 0x02;
    const PAYABLE_BY_SC: u8 = 0x04;

    /// Decode from the 2-byte on-chain form. Empty input means "no flags".
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        if bytes.len() != Self::LEN {
            return Err(TypesError::InvalidCodeMetadataLength(bytes.len()));
        }

        Ok(Self {
            upgradeable: bytes[0] & Self::UPGRADEABLE != 0,
            readable: bytes[0] & Self::READABLE != 0,
            payable: bytes[1] & Self::PAYABLE != 0,
            payable_by_sc: bytes[1] & Self::PAYABLE_BY_SC != 0,
        })
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        let mut bytes = [0u8; 2];
        if self.upgradeable {
            bytes[0] |= Self::UPGRADEABLE;
        }
        if self.readable {
            bytes[0] |= Self::READABLE;
        }
        if self.payable {
            bytes[1] |= Self::PAYABLE;
        }
        if self.payable_by_sc {
            bytes[1] |= Self::PAYABLE_BY_SC;
        }
        bytes
    }

    pub fn readable() -> Self {
        Self {
            readable: true,
            ..Self::default()
        }
    }
}
