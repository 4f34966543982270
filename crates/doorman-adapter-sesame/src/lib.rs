//! # SESAME Adapter
//!
//! Device proxy for CANDY HOUSE SESAME locks through the vendor's cloud
//! Web API.
//!
//! ## Commands
//!
//! Lock and unlock are `POST {base}/{uuid}/cmd` requests authenticated with
//! the API key and signed with the device secret key (AES-CMAC over the
//! current Unix time). Every command carries a history tag that shows up in
//! the lock's history in the vendor app.
//!
//! ## Status
//!
//! The cloud API exposes the device shadow over `GET {base}/{uuid}`. The
//! [`StatusWatcher`] polls it and pushes a [`doorman_core::MechStatus`]
//! whenever the reported status changes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod sign;
pub mod watcher;

pub use client::{
    ClientError, CommandCode, Sesame2Shadow, Sesame2Status, SesameClient, SesameClientConfig,
};
pub use sign::{SecretKey, SignError};
pub use watcher::{StatusSource, StatusWatcher};
