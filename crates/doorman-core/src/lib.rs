//! # doorman Core
//!
//! Reconciles the lock state requested over MQTT with the state reported by
//! the lock itself.
//!
//! This crate provides:
//! - Mechanical status classification (lock range, unlock range, transitional)
//! - The [`StatePublisher`] and [`LockDevice`] seams to the message bus and
//!   the lock vendor API
//! - The [`Reconciler`], the single writer of the published lock state

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod reconciler;
pub mod status;

pub use doorman_proto::{Command, LockState};
pub use reconciler::{LockDevice, ReconcileError, Reconciler, StatePublisher, DEFAULT_HISTORY_TAG};
pub use status::{MechRange, MechStatus};
