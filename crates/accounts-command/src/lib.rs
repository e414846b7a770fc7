//! Account command processing.
//!
//! Responsible for validating and executing register, update and delete
//! commands against the account projection, catching the projection up
//! from the event log before each command, and routing outcomes to the
//! event and acknowledgement lanes.

pub mod application;
pub mod domain;
