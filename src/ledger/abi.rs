//! Minimal contract ABI encoding: static `address`/`uint256` arguments and return words.

use crate::domain::Address;
use num_bigint::BigUint;
use sha3::{Digest, Keccak256};
use thiserror::Error;

const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("value exceeds 256 bits")]
    UintOverflow,
    #[error("invalid hex payload: {0}")]
    Hex(String),
    #[error("expected at least {expected} words, got {got} bytes")]
    ShortReturn { expected: usize, got: usize },
}

/// A static argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(BigUint),
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// Selector followed by one 32-byte word per argument.
pub fn encode_call(signature: &str, args: &[Token]) -> Result<Vec<u8>, AbiError> {
    let mut out = Vec::with_capacity(4 + WORD * args.len());
    out.extend_from_slice(&selector(signature));
    for arg in args {
        out.extend_from_slice(&encode_word(arg)?);
    }
    Ok(out)
}

fn encode_word(token: &Token) -> Result<[u8; WORD], AbiError> {
    let mut word = [0u8; WORD];
    match token {
        Token::Address(addr) => word[12..].copy_from_slice(&addr.to_bytes()),
        Token::Uint(value) => {
            let bytes = value.to_bytes_be();
            if bytes.len() > WORD {
                return Err(AbiError::UintOverflow);
            }
            word[WORD - bytes.len()..].copy_from_slice(&bytes);
        }
    }
    Ok(word)
}

/// Decode the first `count` return words as unsigned integers.
pub fn decode_uints(data: &[u8], count: usize) -> Result<Vec<BigUint>, AbiError> {
    if data.len() < count * WORD {
        return Err(AbiError::ShortReturn {
            expected: count,
            got: data.len(),
        });
    }
    Ok(data
        .chunks(WORD)
        .take(count)
        .map(BigUint::from_bytes_be)
        .collect())
}

pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn from_hex(s: &str) -> Result<Vec<u8>, AbiError> {
    let body = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(body).map_err(|e| AbiError::Hex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_well_known_selectors() {
        assert_eq!(hex::encode(selector("approve(address,uint256)")), "095ea7b3");
        assert_eq!(hex::encode(selector("allowance(address,address)")), "dd62ed3e");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
    }

    #[test]
    fn test_encode_call_layout() {
        let spender = Address::from_str("0x22fa4f932595114e2115d85320b6d9152447e226").unwrap();
        let data = encode_call(
            "approve(address,uint256)",
            &[Token::Address(spender), Token::Uint(BigUint::from(500u32))],
        )
        .unwrap();

        assert_eq!(data.len(), 4 + 64);
        assert_eq!(
            hex::encode(&data[4..36]),
            "00000000000000000000000022fa4f932595114e2115d85320b6d9152447e226"
        );
        assert_eq!(data[67], 0xf4);
        assert_eq!(data[66], 0x01);
    }

    #[test]
    fn test_encode_rejects_oversized_uint() {
        let too_big = BigUint::from(1u32) << 256u32;
        assert_eq!(
            encode_call("f(uint256)", &[Token::Uint(too_big)]),
            Err(AbiError::UintOverflow)
        );
    }

    #[test]
    fn test_decode_uints() {
        let mut data = vec![0u8; 64];
        data[31] = 7;
        data[62] = 1;
        let words = decode_uints(&data, 2).unwrap();
        assert_eq!(words, vec![BigUint::from(7u32), BigUint::from(256u32)]);

        assert_eq!(
            decode_uints(&data, 4),
            Err(AbiError::ShortReturn {
                expected: 4,
                got: 64
            })
        );
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(from_hex("0x0a0b").unwrap(), vec![10, 11]);
        assert_eq!(to_hex(&[10, 11]), "0x0a0b");
        assert!(from_hex("0xzz").is_err());
    }
}
