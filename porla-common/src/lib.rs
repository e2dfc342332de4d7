//! Shared building blocks for the porla webhook notifier.
//!
//! - [`event`]: the torrent lifecycle taxonomy and the structured event value
//! - [`bus`]: a publish/subscribe channel between the job engine and consumers
//! - [`config`]: configuration shared between crates
//! - [`logging`]: subscriber setup and the logging macros
//! - [`traits`]: the state machine abstraction used by the delivery pipeline

pub mod bus;
pub mod config;
pub mod event;
pub mod logging;
pub mod traits;

pub use tracing;

pub use self::{
    bus::EventBus,
    event::{Event, EventName, InfoHash, TorrentStatus, Variables},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
