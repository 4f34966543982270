//! Mechanical status reported by the lock.

use doorman_proto::LockState;
use serde::{Deserialize, Serialize};

/// Classification of a mechanical status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MechRange {
    /// Bolt is within the configured lock range
    Lock,
    /// Bolt is within the configured unlock range
    Unlock,
    /// Moving, or outside both ranges
    Transitional,
}

/// A snapshot of the lock's mechanical condition.
///
/// Produced by the device adapter; read-only from the reconciler's view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechStatus {
    /// Device reports the bolt inside the lock range
    pub in_lock_range: bool,
    /// Device reports the bolt inside the unlock range
    pub in_unlock_range: bool,
    /// Raw bolt position, when reported
    pub position: Option<i32>,
    /// Battery level in percent, when reported
    pub battery_percentage: Option<u8>,
}

impl MechStatus {
    /// Status inside the lock range.
    #[must_use]
    pub fn locked() -> Self {
        Self {
            in_lock_range: true,
            in_unlock_range: false,
            position: None,
            battery_percentage: None,
        }
    }

    /// Status inside the unlock range.
    #[must_use]
    pub fn unlocked() -> Self {
        Self {
            in_lock_range: false,
            in_unlock_range: true,
            position: None,
            battery_percentage: None,
        }
    }

    /// Status outside both ranges.
    #[must_use]
    pub fn moving() -> Self {
        Self {
            in_lock_range: false,
            in_unlock_range: false,
            position: None,
            battery_percentage: None,
        }
    }

    /// Attach a bolt position.
    #[must_use]
    pub fn with_position(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    /// Classify this status.
    ///
    /// The lock range is checked first, so a status claiming both ranges
    /// counts as locked.
    #[must_use]
    pub fn range(&self) -> MechRange {
        match (self.in_lock_range, self.in_unlock_range) {
            (true, _) => MechRange::Lock,
            (false, true) => MechRange::Unlock,
            (false, false) => MechRange::Transitional,
        }
    }

    /// Lock state this status settles on, if any.
    #[must_use]
    pub fn lock_state(&self) -> Option<LockState> {
        match self.range() {
            MechRange::Lock => Some(LockState::Locked),
            MechRange::Unlock => Some(LockState::Unlocked),
            MechRange::Transitional => None,
        }
    }
}
