//! Domain primitives: TimeSecs, Address, OperationId.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Time in whole seconds since Unix epoch (the ledger's clock resolution).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeSecs(pub i64);

impl TimeSecs {
    /// Create a TimeSecs from seconds.
    pub fn new(secs: i64) -> Self {
        TimeSecs(secs)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeSecs(chrono::Utc::now().timestamp())
    }

    /// Get the underlying seconds value.
    pub fn as_secs(&self) -> i64 {
        self.0
    }
}

/// Account or contract address (20 bytes, `0x`-prefixed hex, stored lowercase).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address must start with 0x")]
    MissingPrefix,
    #[error("address must be 40 hex characters, got {0}")]
    InvalidLength(usize),
    #[error("address contains non-hex characters")]
    InvalidHex,
}

impl Address {
    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw 20-byte form.
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        // Validated at construction, so decoding cannot fail.
        if let Ok(bytes) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&bytes);
        }
        out
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(format!("0x{}", hex::encode(bytes)))
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressParseError::MissingPrefix)?;
        if body.len() != 40 {
            return Err(AddressParseError::InvalidLength(body.len()));
        }
        if !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressParseError::InvalidHex);
        }
        Ok(Address(format!("0x{}", body.to_ascii_lowercase())))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::from_str(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier returned by the ledger when a write is submitted (a transaction hash on-chain).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        OperationId(id.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_normalizes_case() {
        let addr = Address::from_str("0x38B54f147303887BD2E932373432FfCBD11Ff6a5").unwrap();
        assert_eq!(addr.as_str(), "0x38b54f147303887bd2e932373432ffcbd11ff6a5");
    }

    #[test]
    fn test_address_parse_errors() {
        assert_eq!(
            Address::from_str("38b54f147303887bd2e932373432ffcbd11ff6a5"),
            Err(AddressParseError::MissingPrefix)
        );
        assert_eq!(
            Address::from_str("0x1234"),
            Err(AddressParseError::InvalidLength(4))
        );
        assert_eq!(
            Address::from_str(&format!("0x{}", "g".repeat(40))),
            Err(AddressParseError::InvalidHex)
        );
    }

    #[test]
    fn test_address_bytes_roundtrip() {
        let addr = Address::from_str("0x22fa4f932595114e2115d85320b6d9152447e226").unwrap();
        assert_eq!(Address::from_bytes(addr.to_bytes()), addr);
    }

    #[test]
    fn test_address_serde_rejects_garbage() {
        let result: Result<Address, _> = serde_json::from_str("\"not-an-address\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_operation_id_normalized() {
        let id = OperationId::new(" 0xABCDEF ");
        assert_eq!(id.as_str(), "0xabcdef");
    }

    #[test]
    fn test_timesecs_ordering() {
        let t1 = TimeSecs::new(1000);
        let t2 = TimeSecs::new(2000);
        assert!(t1 < t2);
    }
}
