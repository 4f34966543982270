//! # doorman Protocol
//!
//! Wire vocabulary shared between the Homebridge MQTT side and the lock runtime.
//!
//! ## Payloads
//!
//! Homebridge's mqttthing lock accessory uses single-letter payloads:
//! - `S`: secured (locked)
//! - `U`: unsecured (unlocked)
//!
//! ## Topics
//!
//! Three topics, all named by configuration:
//! - set-target-state (subscribe): lock/unlock requests
//! - get-target-state (publish): requested or in-flight target
//! - get-current-state (publish): confirmed state

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod payload;
pub mod topics;

pub use payload::{Command, LockState, PayloadError};
pub use topics::{HomebridgeTopics, TopicRole};
