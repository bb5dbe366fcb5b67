use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// 32-byte account address, the identity key for all per-account state.
/// Display format: Bech32m with "vm" human-readable prefix.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 32]);

impl Address {
    pub const ZERO: Self = Self([0u8; 32]);
    pub const LEN: usize = 32;

    /// Bech32m human-readable prefix
    pub const BECH32_HRP: &'static str = "vm";

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from a byte slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != Self::LEN {
            return Err(TypesError::InvalidAddressLength(slice.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Build an address from a short human-readable label, right-padded
    /// with `.` up to 32 bytes. Labels longer than 32 bytes are truncated.
    ///
    /// Handy for fixtures: `Address::from_label("parent")` reads back as
    /// `parent..........................` in hex dumps.
    pub fn from_label(label: &str) -> Self {
        let mut bytes = [b'.'; 32];
        let len = label.len().min(Self::LEN);
        bytes[..len].copy_from_slice(&label.as_bytes()[..len]);
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hrp = bech32::Hrp::parse_unchecked(Self::BECH32_HRP);
        match bech32::encode::<bech32::Bech32m>(hrp, &self.0) {
            Ok(encoded) => write!(f, "{}", encoded),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Parses either the bech32m form (`vm1...`) or `0x`-prefixed hex.
impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(hex_part) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return Self::from_slice(&hex::decode(hex_part)?);
        }
        if !s.starts_with("vm1") {
            return Err(TypesError::InvalidAddressFormat(s.to_string()));
        }

        let (hrp, data) =
            bech32::decode(s).map_err(|e| TypesError::Bech32Error(e.to_string()))?;
        if hrp.as_str() != Self::BECH32_HRP {
            return Err(TypesError::InvalidAddressFormat(format!(
                "unexpected prefix {hrp}"
            )));
        }
        Self::from_slice(&data)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:x}", self))
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
