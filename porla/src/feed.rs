//! Line-delimited JSON event feed.
//!
//! Stands in for the job engine: each line is one lifecycle event,
//!
//! ```text
//! {"event": "torrent_added", "torrent": {"info_hash": "abc123", "name": "debian.iso", ...}}
//! {"event": "torrent_removed", "torrent": {"info_hash": "abc123"}}
//! ```
//!
//! and is published onto the [`EventBus`]. Bad lines are skipped.

use porla_common::{
    Event, EventBus, EventName, InfoHash, Signal, TorrentStatus, event::UnknownEventName, internal,
};
use serde_json::Value;
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::broadcast::Receiver,
};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Line is not a JSON object")]
    NotAnObject,

    #[error("Missing string field 'event'")]
    MissingEvent,

    #[error(transparent)]
    UnknownEvent(#[from] UnknownEventName),

    #[error("Missing 'torrent' field for {0}")]
    MissingTorrent(EventName),

    #[error("Invalid 'torrent' field for {event}: {source}")]
    InvalidTorrent {
        event: EventName,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse one feed line into an event.
///
/// Torrent data is normalised through [`TorrentStatus`] so templates always
/// see the same shape, whatever spelling of the info hash the line used.
///
/// # Errors
///
/// Returns `FeedError` if the line is not an event object or its torrent
/// data does not fit the event.
pub fn parse_line(line: &str) -> Result<Event, FeedError> {
    let Value::Object(mut fields) = serde_json::from_str::<Value>(line)? else {
        return Err(FeedError::NotAnObject);
    };

    let name: EventName = fields
        .remove("event")
        .as_ref()
        .and_then(Value::as_str)
        .ok_or(FeedError::MissingEvent)?
        .parse()?;

    let mut torrent = fields
        .remove("torrent")
        .ok_or(FeedError::MissingTorrent(name))?;

    let invalid = |source| FeedError::InvalidTorrent {
        event: name,
        source,
    };

    let mut event = match name {
        EventName::TorrentRemoved => {
            let info_hash = torrent.get_mut("info_hash").map(Value::take).unwrap_or_default();
            let info_hash: InfoHash = serde_json::from_value(info_hash).map_err(invalid)?;
            Event::torrent_removed(&info_hash)
        }
        _ => {
            let status: TorrentStatus = serde_json::from_value(torrent).map_err(invalid)?;
            match name {
                EventName::TorrentAdded => Event::torrent_added(&status),
                EventName::TorrentFinished => Event::torrent_finished(&status),
                EventName::TorrentPaused => Event::torrent_paused(&status),
                _ => Event::torrent_resumed(&status),
            }
        }
    };

    // Anything else on the line is passed through as extra variables.
    for (key, value) in fields {
        event.fields.entry(key).or_insert(value);
    }

    Ok(event)
}

/// Publish every event read from `reader` until it ends or shutdown is
/// signalled.
///
/// # Errors
///
/// Returns an error if reading from `reader` fails.
pub async fn run<R>(reader: R, bus: EventBus, mut shutdown: Receiver<Signal>) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    internal!("Event feed reached end of input");
                    break;
                };

                if line.trim().is_empty() {
                    continue;
                }

                match parse_line(&line) {
                    Ok(event) => {
                        let name = event.name;
                        let receivers = bus.publish(event);
                        debug!("Published {name} to {receivers} subscriber(s)");
                    }
                    Err(err) => warn!("Skipping event feed line: {err}"),
                }
            }
            sig = shutdown.recv() => {
                internal!("Event feed stopping: {:?}", sig);
                break;
            }
        }
    }

    Ok(())
}
