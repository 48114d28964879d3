//! Websocket transport for `com.atproto.sync.subscribeRepos`.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::EventSource;
use super::frame::{Frame, decode_frame};
use crate::domain::RepoEvent;
use crate::error::IngestError;

const SUBSCRIBE_REPOS: &str = "xrpc/com.atproto.sync.subscribeRepos";
const MAX_BACKOFF: Duration = Duration::from_secs(60);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Firehose websocket client.
///
/// After the first successful [`connect`](EventSource::connect), socket
/// errors and server closes are absorbed: the stream reconnects with
/// exponential backoff and resumes after the last sequence it delivered.
pub struct FirehoseStream {
    endpoint: String,
    base_delay: Duration,
    socket: Option<Socket>,
    last_seq: Option<i64>,
    connected: bool,
}

impl std::fmt::Debug for FirehoseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirehoseStream")
            .field("endpoint", &self.endpoint)
            .field("base_delay", &self.base_delay)
            .field("open", &self.socket.is_some())
            .field("last_seq", &self.last_seq)
            .finish()
    }
}

impl FirehoseStream {
    /// Creates a disconnected stream for `endpoint` (e.g. `wss://bsky.network`).
    #[must_use]
    pub fn new(endpoint: impl Into<String>, base_delay: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            base_delay,
            socket: None,
            last_seq: None,
            connected: false,
        }
    }

    /// Subscription URL resuming after `cursor`.
    #[must_use]
    pub fn url(&self, cursor: Option<i64>) -> String {
        let base = format!("{}/{SUBSCRIBE_REPOS}", self.endpoint.trim_end_matches('/'));
        match cursor {
            Some(cursor) => format!("{base}?cursor={cursor}"),
            None => base,
        }
    }

    async fn open(&self) -> Result<Socket, IngestError> {
        let url = self.url(self.last_seq);
        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| IngestError::Transport(format!("connect {url}: {e}")))?;
        tracing::info!(%url, "firehose connected");
        Ok(socket)
    }

    async fn reconnect(&mut self) {
        let mut delay = self.base_delay;
        loop {
            tokio::time::sleep(delay).await;
            match self.open().await {
                Ok(socket) => {
                    self.socket = Some(socket);
                    return;
                }
                Err(err) => {
                    delay = backoff(delay);
                    tracing::warn!(error = %err, retry_in = ?delay, "firehose reconnect failed");
                }
            }
        }
    }

    fn drop_socket(&mut self, reason: &str) {
        tracing::warn!(last_seq = ?self.last_seq, reason, "firehose disconnected");
        self.socket = None;
    }
}

/// Doubles `delay`, capped at one minute.
fn backoff(delay: Duration) -> Duration {
    delay.saturating_mul(2).min(MAX_BACKOFF)
}

impl EventSource for FirehoseStream {
    async fn connect(&mut self, cursor: Option<i64>) -> Result<(), IngestError> {
        self.last_seq = cursor;
        self.socket = Some(self.open().await?);
        self.connected = true;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<RepoEvent>, IngestError> {
        if !self.connected {
            return Err(IngestError::Transport("stream not connected".to_string()));
        }
        loop {
            let Some(socket) = self.socket.as_mut() else {
                self.reconnect().await;
                continue;
            };
            match socket.next().await {
                Some(Ok(Message::Binary(bytes))) => match decode_frame(&bytes).await {
                    Ok(Frame::Event(event)) => {
                        if let Some(seq) = event.seq() {
                            self.last_seq = Some(seq);
                        }
                        return Ok(Some(event));
                    }
                    Ok(Frame::Error { error, message }) => {
                        tracing::warn!(%error, message = ?message, "firehose error frame");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping undecodable frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "firehose closed by server");
                    self.drop_socket("close");
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => self.drop_socket(&err.to_string()),
                None => self.drop_socket("end of stream"),
            }
        }
    }
}
