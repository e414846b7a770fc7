//! Accounts Core — shared domain model, wire messages and ports.
//!
//! This crate defines the account read-model shape, the envelopes exchanged
//! with the message broker, and the traits every infrastructure adapter
//! implements. It contains no infrastructure code.

pub mod account;
pub mod clock;
pub mod error;
pub mod message;
pub mod password;
pub mod replay;
pub mod store;
pub mod transport;
