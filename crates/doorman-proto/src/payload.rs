//! Lock payload encoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payload announcing or requesting the locked (secured) state.
pub const LOCK_PAYLOAD: &str = "S";

/// Payload announcing or requesting the unlocked (unsecured) state.
pub const UNLOCK_PAYLOAD: &str = "U";

/// State of the lock as announced on the Homebridge topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    /// Bolt thrown
    Locked,
    /// Bolt retracted
    Unlocked,
}

impl LockState {
    /// Wire payload for this state.
    #[must_use]
    pub const fn payload(self) -> &'static str {
        match self {
            Self::Locked => LOCK_PAYLOAD,
            Self::Unlocked => UNLOCK_PAYLOAD,
        }
    }

    /// Human readable label used in log lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Locked => "Locked",
            Self::Unlocked => "Unlocked",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => f.write_str("locked"),
            Self::Unlocked => f.write_str("unlocked"),
        }
    }
}

/// A lock/unlock request received on the set-target-state topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Request to lock
    Lock,
    /// Request to unlock
    Unlock,
}

impl Command {
    /// Parse a raw MQTT payload.
    ///
    /// The payload must be valid UTF-8 and match a sentinel exactly; no
    /// trimming or case folding is applied.
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not UTF-8 or is not a known sentinel.
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(payload).map_err(|_| PayloadError::NotUtf8)?;
        text.parse()
    }

    /// State this command asks the lock to reach.
    #[must_use]
    pub const fn target(self) -> LockState {
        match self {
            Self::Lock => LockState::Locked,
            Self::Unlock => LockState::Unlocked,
        }
    }
}

impl FromStr for Command {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            LOCK_PAYLOAD => Ok(Self::Lock),
            UNLOCK_PAYLOAD => Ok(Self::Unlock),
            other => Err(PayloadError::Unrecognized(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lock => f.write_str("LOCK"),
            Self::Unlock => f.write_str("UNLOCK"),
        }
    }
}

/// Errors that can occur decoding a command payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// Payload bytes are not UTF-8
    #[error("payload is not valid UTF-8")]
    NotUtf8,
    /// Payload is not a lock or unlock sentinel
    #[error("unrecognized payload: {0:?}")]
    Unrecognized(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sentinels() {
        assert_eq!(Command::parse(b"S").unwrap(), Command::Lock);
        assert_eq!(Command::parse(b"U").unwrap(), Command::Unlock);
    }

    #[test]
    fn parse_rejects_near_misses() {
        for payload in [&b"s"[..], b"u", b"S ", b" U", b"", b"LOCK", b"SU"] {
            assert!(matches!(
                Command::parse(payload),
                Err(PayloadError::Unrecognized(_))
            ));
        }
    }

    #[test]
    fn parse_rejects_invalid_utf8() {
        assert_eq!(Command::parse(&[0xff, 0xfe]), Err(PayloadError::NotUtf8));
    }

    #[test]
    fn command_targets_match_payloads() {
        assert_eq!(Command::Lock.target().payload(), "S");
        assert_eq!(Command::Unlock.target().payload(), "U");
    }
}
