//! Room transports

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::{Room, SessionEvent, TranscriptionEvent};
use crate::{Error, Result};

/// Event buffer between a transport and the conversation loop
const EVENT_BUFFER: usize = 64;

/// Room fed by typed lines on stdin
///
/// Every non-empty line is a finalized transcript. Lines starting with `~`
/// are delivered as interim transcripts. End of input closes the room.
#[derive(Debug, Default)]
pub struct ConsoleRoom {
    connected: bool,
}

impl ConsoleRoom {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Map one console line to an event
fn line_event(line: &str) -> Option<SessionEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let event = match line.strip_prefix('~') {
        Some(partial) => TranscriptionEvent::interim(partial.trim()),
        None => TranscriptionEvent::final_transcript(line),
    };
    Some(SessionEvent::UserInputTranscribed(event))
}

#[async_trait]
impl Room for ConsoleRoom {
    async fn connect(&mut self) -> Result<mpsc::Receiver<SessionEvent>> {
        if self.connected {
            return Err(Error::Session("console room already joined".to_string()));
        }
        self.connected = true;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(event) = line_event(&line)
                            && tx.send(event).await.is_err()
                        {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to read console input");
                        break;
                    }
                }
            }

            let _ = tx.send(SessionEvent::Closed).await;
        });

        tracing::info!("joined console room");
        Ok(rx)
    }
}

/// Room driven programmatically through a sender
///
/// Used by embedders that bridge their own transport, and by tests.
#[derive(Debug)]
pub struct ChannelRoom {
    events: Option<mpsc::Receiver<SessionEvent>>,
}

impl ChannelRoom {
    /// Create a room and the sender that feeds it
    #[must_use]
    pub fn new() -> (Self, mpsc::Sender<SessionEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        (Self { events: Some(rx) }, tx)
    }
}

#[async_trait]
impl Room for ChannelRoom {
    async fn connect(&mut self) -> Result<mpsc::Receiver<SessionEvent>> {
        self.events
            .take()
            .ok_or_else(|| Error::Session("channel room already joined".to_string()))
    }
}
