//! Reply streams
//!
//! [`ReplyAssembly`] couples the decoder with the assembler and maps their
//! output to [`ReplyEvent`]s. [`ReplyStream`] runs an assembly over a
//! response body on a background task and hands the events to the caller.

use crate::streaming::{ChunkOutcome, StreamState, StreamingReplyAssembler, Utf8StreamDecoder};
use futures_util::{Stream, StreamExt};
use sidekick_common::{
    ClientConfig, Message, REPLY_CHANNEL_CAPACITY, SentinelPolicy, generate_timestamped_id,
};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Stream configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// How chunks mixing markers and text are split
    pub sentinel_policy: SentinelPolicy,
    /// Drop text between the thinking markers
    pub hide_thinking_text: bool,
    /// Longest gap between chunks before the reply counts as interrupted.
    /// `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Buffer size of the event channel
    pub buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sentinel_policy: SentinelPolicy::default(),
            hide_thinking_text: false,
            idle_timeout: None,
            buffer_size: REPLY_CHANNEL_CAPACITY,
        }
    }
}

impl From<&ClientConfig> for StreamConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            sentinel_policy: config.sentinel_policy,
            hide_thinking_text: config.hide_thinking_text,
            idle_timeout: config.stream_idle_timeout(),
            ..Self::default()
        }
    }
}

/// Events for the chat layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEvent {
    /// Provisional reply text so far
    Snapshot(StreamState),
    /// The backend entered or left its thinking phase
    ThinkingChanged(bool),
    /// The stream ended; this is the final reply
    Completed(Message),
    /// The transport failed or went quiet. No final reply follows.
    Interrupted { reason: String },
}

/// Decoder and assembler for one reply
#[derive(Debug)]
pub struct ReplyAssembly {
    decoder: Utf8StreamDecoder,
    assembler: StreamingReplyAssembler,
}

impl ReplyAssembly {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            decoder: Utf8StreamDecoder::new(),
            assembler: StreamingReplyAssembler::with_policy(config.sentinel_policy)
                .hide_thinking_text(config.hide_thinking_text),
        }
    }

    /// Feed raw body bytes
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ReplyEvent> {
        let text = self.decoder.decode(bytes);
        self.push_text(&text)
    }

    /// End of body. Always ends with [`ReplyEvent::Completed`].
    pub fn finish(mut self) -> Vec<ReplyEvent> {
        let tail = self.decoder.flush();
        let mut events = if tail.is_empty() {
            Vec::new()
        } else {
            self.push_text(&tail)
        };
        events.push(ReplyEvent::Completed(self.assembler.finish()));
        events
    }

    pub fn state(&self) -> &StreamState {
        self.assembler.state()
    }

    fn push_text(&mut self, text: &str) -> Vec<ReplyEvent> {
        self.assembler
            .process_chunk(text)
            .into_iter()
            .filter_map(|outcome| match outcome {
                ChunkOutcome::Thinking(flag) => Some(ReplyEvent::ThinkingChanged(flag)),
                ChunkOutcome::Snapshot(state) => Some(ReplyEvent::Snapshot(state)),
                ChunkOutcome::Hidden => None,
            })
            .collect()
    }
}

/// Events of one reply, produced by a background task.
///
/// Dropping the stream stops delivery but does not cancel the request.
pub struct ReplyStream {
    receiver: ReceiverStream<ReplyEvent>,
    reply_id: String,
}

impl Stream for ReplyStream {
    type Item = ReplyEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl ReplyStream {
    /// Start assembling a reply from a chunked byte stream
    pub fn spawn<S, B, E>(byte_stream: S, config: StreamConfig) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(config.buffer_size.max(1));
        let reply_id = generate_timestamped_id(Some("reply"));

        tokio::spawn(pump(byte_stream, config, sender, reply_id.clone()));

        Self {
            receiver: ReceiverStream::new(receiver),
            reply_id,
        }
    }

    /// Assemble the body of an HTTP response
    pub fn from_response(response: reqwest::Response, config: StreamConfig) -> Self {
        Self::spawn(response.bytes_stream(), config)
    }

    pub fn reply_id(&self) -> &str {
        &self.reply_id
    }

    /// Drain the stream, returning the final reply if it completed
    pub async fn final_message(mut self) -> Option<Message> {
        while let Some(event) = self.next().await {
            if let ReplyEvent::Completed(message) = event {
                return Some(message);
            }
        }
        None
    }
}

async fn pump<S, B, E>(
    byte_stream: S,
    config: StreamConfig,
    sender: mpsc::Sender<ReplyEvent>,
    reply_id: String,
) where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let mut byte_stream = std::pin::pin!(byte_stream);
    let mut assembly = ReplyAssembly::new(&config);
    let mut bytes_received: u64 = 0;

    debug!(reply_id = %reply_id, "Reply stream started");

    loop {
        let next = match config.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, byte_stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(reply_id = %reply_id, "No reply data for {:?}", limit);
                    let reason = format!("no data received for {}s", limit.as_secs_f64());
                    let _ = sender.send(ReplyEvent::Interrupted { reason }).await;
                    return;
                }
            },
            None => byte_stream.next().await,
        };

        let events = match next {
            Some(Ok(bytes)) => {
                let bytes = bytes.as_ref();
                bytes_received += bytes.len() as u64;
                assembly.feed(bytes)
            }
            Some(Err(e)) => {
                warn!(reply_id = %reply_id, "Reply stream failed: {}", e);
                let reason = e.to_string();
                let _ = sender.send(ReplyEvent::Interrupted { reason }).await;
                return;
            }
            None => {
                info!(reply_id = %reply_id, bytes = bytes_received, "Reply stream finished");
                let events = assembly.finish();
                for event in events {
                    if sender.send(event).await.is_err() {
                        break;
                    }
                }
                return;
            }
        };

        for event in events {
            if sender.send(event).await.is_err() {
                debug!(reply_id = %reply_id, "Reply consumer went away");
                return;
            }
        }
    }
}
