//! Change event feed.
//!
//! Reads the server's SSE stream and turns it into [`FeedItem`]s on an mpsc
//! channel. The connection is reopened after `reconnect_delay` whenever it
//! drops; the reconciler learns about the gap through `Disconnected` and
//! `Reconnected`.

use std::time::Duration;

use api_types::event::{CHANGE, ChangeEvent, RESYNC};
use futures::StreamExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::api::ApiClient;

const FEED_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedItem {
    Event(ChangeEvent),
    /// Events were dropped before reaching us.
    Lagged,
    Disconnected,
    Reconnected,
}

/// One `event:`/`data:` block of an SSE stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE parser; chunks may split frames anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = self
            .buffer
            .windows(2)
            .position(|window| window == b"\n\n")
        {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_block(&String::from_utf8_lossy(&block)) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn parse_block(block: &str) -> Option<Frame> {
    let mut frame = Frame::default();
    let mut has_data = false;

    for line in block.lines() {
        // Comment lines carry keep-alives.
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => frame.event = Some(value.to_string()),
            "data" => {
                if has_data {
                    frame.data.push('\n');
                }
                frame.data.push_str(value);
                has_data = true;
            }
            _ => {}
        }
    }

    (has_data || frame.event.is_some()).then_some(frame)
}

/// Map a frame to what the reconciler cares about.
pub fn feed_item(frame: &Frame) -> Option<FeedItem> {
    match frame.event.as_deref() {
        Some(RESYNC) => Some(FeedItem::Lagged),
        Some(CHANGE) | None => match serde_json::from_str::<ChangeEvent>(&frame.data) {
            Ok(event) => Some(FeedItem::Event(event)),
            Err(err) => {
                tracing::warn!("unreadable change event {:?}: {err}", frame.data);
                // Still a signal that something changed.
                Some(FeedItem::Lagged)
            }
        },
        Some(other) => {
            tracing::debug!("ignoring event {other}");
            None
        }
    }
}

/// Keep the event stream open for as long as the receiver lives.
pub fn spawn_event_feed(
    client: ApiClient,
    reconnect_delay: Duration,
) -> (mpsc::Receiver<FeedItem>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(FEED_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut online = true;

        loop {
            match client.open_events().await {
                Ok(response) => {
                    if !online {
                        tracing::info!("event stream reconnected");
                        if tx.send(FeedItem::Reconnected).await.is_err() {
                            return;
                        }
                        online = true;
                    }
                    if pump(response, &tx).await.is_err() {
                        return;
                    }
                }
                Err(err) => tracing::warn!("event stream unavailable: {err}"),
            }

            if online {
                if tx.send(FeedItem::Disconnected).await.is_err() {
                    return;
                }
                online = false;
            }
            tokio::time::sleep(reconnect_delay).await;
        }
    });
    (rx, handle)
}

/// The reconciler dropped its receiver.
struct FeedClosed;

/// Forward frames until the stream ends.
async fn pump(
    response: reqwest::Response,
    tx: &mpsc::Sender<FeedItem>,
) -> Result<(), FeedClosed> {
    let mut decoder = SseDecoder::default();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::warn!("event stream interrupted: {err}");
                return Ok(());
            }
        };
        for frame in decoder.push(&chunk) {
            if let Some(item) = feed_item(&frame) {
                tx.send(item).await.map_err(|_| FeedClosed)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use api_types::event::{ChangeAction, EntityKind};

    use super::*;

    #[test]
    fn frames_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: change\ndata: {\"entity\":\"prod").is_empty());
        let frames = decoder.push(b"ucts\",\"action\":\"adjust\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("change"));

        assert_eq!(
            feed_item(&frames[0]),
            Some(FeedItem::Event(ChangeEvent {
                entity: EntityKind::Products,
                action: ChangeAction::Adjust,
            }))
        );
    }

    #[test]
    fn keep_alive_comments_are_skipped() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b":\n\n").is_empty());
    }

    #[test]
    fn crlf_lines_are_accepted() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b"event: resync\r\ndata: {}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(feed_item(&frames[0]), Some(FeedItem::Lagged));
    }

    #[test]
    fn several_frames_in_one_chunk() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(
            b"event: change\ndata: {\"entity\":\"transactions\",\"action\":\"create\"}\n\n\
              event: change\ndata: {\"entity\":\"petty-cash\",\"action\":\"create\"}\n\n",
        );
        let items: Vec<_> = frames.iter().filter_map(feed_item).collect();
        assert_eq!(
            items,
            vec![
                FeedItem::Event(ChangeEvent {
                    entity: EntityKind::Transactions,
                    action: ChangeAction::Create,
                }),
                FeedItem::Event(ChangeEvent {
                    entity: EntityKind::PettyCash,
                    action: ChangeAction::Create,
                }),
            ]
        );
    }
}
