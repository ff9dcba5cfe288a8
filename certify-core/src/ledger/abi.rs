//! Minimal Solidity ABI encoding for the certificate registry contract.
//!
//! Only the shapes the registry uses are supported: calls taking a single
//! `string`, and the `(bool, address, uint256, bool)` tuple returned by
//! `verifyCertificate`.

use sha3::{Digest, Keccak256};

use crate::error::{CertifyError, Result};

/// ABI word size in bytes.
pub const WORD: usize = 32;

pub const ISSUE_SIGNATURE: &str = "issueCertificate(string)";
pub const VERIFY_SIGNATURE: &str = "verifyCertificate(string)";
pub const REVOKE_SIGNATURE: &str = "revokeCertificate(string)";

/// First four bytes of Keccak-256 over the function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Calldata for `fn(string)`: selector, head offset, length, padded bytes.
pub fn encode_string_call(signature: &str, arg: &str) -> Vec<u8> {
    let bytes = arg.as_bytes();
    let padded_len = bytes.len().div_ceil(WORD) * WORD;

    let mut data = Vec::with_capacity(4 + 2 * WORD + padded_len);
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&uint_word(WORD as u64));
    data.extend_from_slice(&uint_word(bytes.len() as u64));
    data.extend_from_slice(bytes);
    data.resize(4 + 2 * WORD + padded_len, 0);
    data
}

/// Decoded `verifyCertificate` return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutput {
    pub exists: bool,
    pub issuer: String,
    pub timestamp: u64,
    pub revoked: bool,
}

pub fn decode_verify_output(data: &[u8]) -> Result<VerifyOutput> {
    if data.len() < 4 * WORD {
        return Err(CertifyError::SerializationError(format!(
            "verifyCertificate returned {} bytes, expected at least {}",
            data.len(),
            4 * WORD
        )));
    }

    let word = |i: usize| &data[i * WORD..(i + 1) * WORD];

    Ok(VerifyOutput {
        exists: decode_bool(word(0))?,
        issuer: decode_address(word(1))?,
        timestamp: decode_u64(word(2))?,
        revoked: decode_bool(word(3))?,
    })
}

fn decode_bool(word: &[u8]) -> Result<bool> {
    match decode_u64(word)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CertifyError::SerializationError(format!(
            "invalid ABI bool value {other}"
        ))),
    }
}

fn decode_u64(word: &[u8]) -> Result<u64> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(CertifyError::SerializationError(
            "uint256 value does not fit in 64 bits".into(),
        ));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(buf))
}

fn decode_address(word: &[u8]) -> Result<String> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(CertifyError::SerializationError(
            "address word has non-zero padding".into(),
        ));
    }
    Ok(format!("0x{}", hex::encode(&word[12..])))
}

/// `0x`-prefixed hex as used by JSON-RPC.
pub fn to_hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn from_hex_data(s: &str) -> Result<Vec<u8>> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped)
        .map_err(|e| CertifyError::SerializationError(format!("invalid hex data: {e}")))
}

/// Parse a JSON-RPC quantity such as `"0x1b4"`.
pub fn parse_quantity(s: &str) -> Result<u64> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(stripped, 16)
        .map_err(|e| CertifyError::SerializationError(format!("invalid quantity '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_selectors() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
    }

    #[test]
    fn test_encode_string_call_layout() {
        let hash = "ab".repeat(32);
        let data = encode_string_call(ISSUE_SIGNATURE, &hash);

        assert_eq!(data.len(), 4 + 4 * WORD);
        assert_eq!(&data[..4], &selector(ISSUE_SIGNATURE));
        assert_eq!(data[4 + WORD - 1], 0x20);
        assert_eq!(data[4 + 2 * WORD - 1], 64);
        assert_eq!(&data[4 + 2 * WORD..], hash.as_bytes());
    }

    #[test]
    fn test_encode_pads_short_strings() {
        let data = encode_string_call(VERIFY_SIGNATURE, "abc");
        assert_eq!(data.len(), 4 + 3 * WORD);
        assert_eq!(&data[4 + 2 * WORD..4 + 2 * WORD + 3], b"abc");
        assert!(data[4 + 2 * WORD + 3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_decode_verify_output() {
        let mut data = vec![0u8; 4 * WORD];
        data[WORD - 1] = 1;
        data[WORD + 12..2 * WORD].copy_from_slice(&[0x11; 20]);
        data[3 * WORD - 8..3 * WORD].copy_from_slice(&1_700_000_000u64.to_be_bytes());
        data[4 * WORD - 1] = 0;

        let out = decode_verify_output(&data).unwrap();
        assert!(out.exists);
        assert_eq!(out.issuer, format!("0x{}", "11".repeat(20)));
        assert_eq!(out.timestamp, 1_700_000_000);
        assert!(!out.revoked);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_verify_output(&[0u8; 64]).is_err());

        let mut bad_bool = vec![0u8; 4 * WORD];
        bad_bool[WORD - 1] = 2;
        assert!(decode_verify_output(&bad_bool).is_err());
    }

    #[test]
    fn test_quantities() {
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert!(parse_quantity("0xzz").is_err());
        assert_eq!(from_hex_data("0x0102").unwrap(), vec![1, 2]);
        assert_eq!(to_hex_data(&[0xde, 0xad]), "0xdead");
    }
}
