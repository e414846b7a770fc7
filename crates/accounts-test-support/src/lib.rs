//! Shared test doubles for the account command service.

mod clock;
mod replay;
mod store;
mod transport;

pub use clock::FixedClock;
pub use replay::{FailingReplaySource, PendingReplaySource, ScriptedReplaySource};
pub use store::{FailingProjectionStore, InMemoryProjectionStore};
pub use transport::{ChannelCommandSource, FailingProducer, RecordingProducer, SentRecord};
