//! Application services for account commands.

pub mod command_handlers;
pub mod dispatcher;
pub mod projection_rebuilder;
