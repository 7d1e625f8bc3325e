//! Platform signing key handling.

use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};

use crate::error::AppError;

/// Derive the EVM account address for a 0x-prefixed secp256k1 private key.
///
/// The key itself never leaves configuration; only the derived address is
/// handed to the agent pipeline as the custodial fallback account.
pub fn derive_evm_address(private_key: &str) -> Result<String, AppError> {
    let hex_key = private_key
        .strip_prefix("0x")
        .ok_or_else(|| AppError::Config("platform signing key must be 0x-prefixed".to_string()))?;
    if hex_key.len() != 64 {
        return Err(AppError::Config(
            "platform signing key must be 32 bytes of hex".to_string(),
        ));
    }

    let bytes = hex::decode(hex_key)
        .map_err(|e| AppError::Config(format!("platform signing key is not valid hex: {e}")))?;
    let signing_key = SigningKey::from_slice(&bytes)
        .map_err(|e| AppError::Config(format!("invalid platform signing key: {e}")))?;

    // Keccak-256 over the uncompressed public key without the 0x04 prefix;
    // the address is the low 20 bytes.
    let public_key = signing_key.verifying_key().to_encoded_point(false);
    let digest = Keccak256::digest(&public_key.as_bytes()[1..]);
    Ok(format!("0x{}", hex::encode(&digest[12..])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_known_address() {
        // secp256k1 private key 0x...01 has a well-known account address.
        let key = "0x0000000000000000000000000000000000000000000000000000000000000001";
        let address = derive_evm_address(key).unwrap();
        assert_eq!(address, "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn rejects_unprefixed_key() {
        let err = derive_evm_address("deadbeef").unwrap_err();
        assert!(err.to_string().contains("0x-prefixed"));
    }

    #[test]
    fn rejects_short_key() {
        let err = derive_evm_address("0xdeadbeef").unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn rejects_non_hex_key() {
        let key = format!("0x{}", "zz".repeat(32));
        assert!(derive_evm_address(&key).is_err());
    }
}
