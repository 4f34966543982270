//! Homebridge lock topics.
//!
//! Topic names are free-form and come from configuration; only their roles
//! are fixed.

use serde::{Deserialize, Serialize};

/// The three topics of a Homebridge MQTT lock accessory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomebridgeTopics {
    /// Inbound lock/unlock requests
    #[serde(rename = "set_target_state_topic")]
    pub set_target_state: String,
    /// Outbound requested state
    #[serde(rename = "get_target_state_topic")]
    pub get_target_state: String,
    /// Outbound confirmed state
    #[serde(rename = "get_current_state_topic")]
    pub get_current_state: String,
}

impl HomebridgeTopics {
    /// Create a topic set.
    #[must_use]
    pub fn new(
        set_target_state: impl Into<String>,
        get_target_state: impl Into<String>,
        get_current_state: impl Into<String>,
    ) -> Self {
        Self {
            set_target_state: set_target_state.into(),
            get_target_state: get_target_state.into(),
            get_current_state: get_current_state.into(),
        }
    }

    /// Classify an incoming topic name.
    ///
    /// Exact match only; when several roles share a name the inbound role wins.
    #[must_use]
    pub fn role(&self, topic: &str) -> Option<TopicRole> {
        if topic == self.set_target_state {
            Some(TopicRole::SetTargetState)
        } else if topic == self.get_target_state {
            Some(TopicRole::GetTargetState)
        } else if topic == self.get_current_state {
            Some(TopicRole::GetCurrentState)
        } else {
            None
        }
    }
}

/// Role a topic plays for the lock accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicRole {
    /// Inbound requests
    SetTargetState,
    /// Outbound target
    GetTargetState,
    /// Outbound current
    GetCurrentState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> HomebridgeTopics {
        HomebridgeTopics::new(
            "home/door/lock/set",
            "home/door/lock/target",
            "home/door/lock/current",
        )
    }

    #[test]
    fn role_lookup() {
        let topics = topics();

        assert_eq!(
            topics.role("home/door/lock/set"),
            Some(TopicRole::SetTargetState)
        );
        assert_eq!(
            topics.role("home/door/lock/target"),
            Some(TopicRole::GetTargetState)
        );
        assert_eq!(
            topics.role("home/door/lock/current"),
            Some(TopicRole::GetCurrentState)
        );
        assert_eq!(topics.role("home/door/lock"), None);
    }

    #[test]
    fn deserialize_config_keys() {
        let yaml = r"
set_target_state_topic: a/set
get_target_state_topic: a/target
get_current_state_topic: a/current
";
        let topics: HomebridgeTopics = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(topics, HomebridgeTopics::new("a/set", "a/target", "a/current"));
    }
}
