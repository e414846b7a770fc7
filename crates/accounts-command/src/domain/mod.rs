//! Account command and event vocabulary.

pub mod commands;
pub mod events;
pub mod password;
