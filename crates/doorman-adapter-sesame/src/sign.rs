//! Command signing.
//!
//! The cloud API accepts a command only with a `sign` field computed as
//! AES-128-CMAC, keyed with the device secret, over bytes 1..4 of the
//! current Unix time encoded as a little-endian `u32`.

use aes::Aes128;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cmac::{Cmac, Mac};
use std::fmt;

/// Device secret key (16 bytes, AES-128).
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; 16]);

impl SecretKey {
    /// Parse the 32-character hex form shown in the vendor app.
    ///
    /// # Errors
    ///
    /// Returns error if the input is not hex or not 16 bytes long.
    pub fn from_hex(input: &str) -> Result<Self, SignError> {
        let bytes = hex::decode(input.trim()).map_err(|e| SignError::InvalidKey(e.to_string()))?;
        let key: [u8; 16] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            SignError::InvalidKey(format!("expected 16 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(key))
    }

    /// Sign a command issued at `unix_secs`.
    ///
    /// # Errors
    ///
    /// Returns error if the timestamp does not fit the 32-bit field.
    pub fn sign(&self, unix_secs: i64) -> Result<String, SignError> {
        let timestamp = u32::try_from(unix_secs).map_err(|_| SignError::Timestamp(unix_secs))?;
        Ok(cmac_hex(&self.0, &timestamp.to_le_bytes()[1..4]))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Encode a history tag for the `history` field.
#[must_use]
pub fn encode_history(tag: &str) -> String {
    STANDARD.encode(tag.as_bytes())
}

fn cmac_hex(key: &[u8; 16], message: &[u8]) -> String {
    let mut mac = <Cmac<Aes128> as Mac>::new(key.into());
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Errors that can occur while signing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignError {
    /// Secret key is malformed
    #[error("invalid secret key: {0}")]
    InvalidKey(String),
    /// Clock value outside the signed range
    #[error("timestamp out of range: {0}")]
    Timestamp(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC4493_KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";

    fn rfc_key() -> [u8; 16] {
        hex::decode(RFC4493_KEY).unwrap().try_into().unwrap()
    }

    #[test]
    fn cmac_matches_rfc4493_vectors() {
        assert_eq!(cmac_hex(&rfc_key(), b""), "bb1d6929e95937287fa37d129b756746");

        let block = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        assert_eq!(cmac_hex(&rfc_key(), &block), "070a16b46b4d4144f79bdd9dd04a287c");
    }

    #[test]
    fn sign_uses_upper_timestamp_bytes() {
        let key = SecretKey::from_hex(RFC4493_KEY).unwrap();

        // 1_700_000_000 = 0x6553f100, bytes 1..4 little-endian are f1 53 65
        assert_eq!(
            key.sign(1_700_000_000).unwrap(),
            "b40bcb3c32f6d16f921c9be940843455"
        );
        assert_eq!(
            key.sign(1_700_000_000).unwrap(),
            cmac_hex(&rfc_key(), &[0xf1, 0x53, 0x65])
        );
    }

    #[test]
    fn sign_rejects_out_of_range_clock() {
        let key = SecretKey::from_hex(RFC4493_KEY).unwrap();
        assert!(matches!(key.sign(-1), Err(SignError::Timestamp(-1))));
    }

    #[test]
    fn key_parsing() {
        assert!(SecretKey::from_hex("not hex").is_err());
        assert!(SecretKey::from_hex("2b7e1516").is_err());
        assert!(SecretKey::from_hex(&RFC4493_KEY.to_uppercase()).is_ok());
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = SecretKey::from_hex(RFC4493_KEY).unwrap();
        assert_eq!(format!("{key:?}"), "SecretKey(..)");
    }

    #[test]
    fn history_is_base64() {
        assert_eq!(encode_history("DOORMAN"), "RE9PUk1BTg==");
    }
}
