//! Account command service library.
//!
//! Wires the command intake loop, the two output lanes and the health
//! endpoint around the executors in `accounts-command`. The Kafka transport
//! lives behind the `kafka` feature; everything else runs against the
//! transport traits in `accounts-core`.

pub mod config;
pub mod error;
pub mod intake;
pub mod metrics;
pub mod pipeline;
pub mod replay;
pub mod routes;
pub mod state;
pub mod telemetry;
#[cfg(feature = "kafka")]
pub mod transport;
