// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The live push connection for one generation job.
//!
//! [`EventSocket`] owns at most one live SSE connection at a time. Frames are
//! decoded and delivered in exact network order over an mpsc channel. On an
//! abnormal drop the socket reconnects with a linear backoff
//! (`base_delay * attempt_number`); exhausting the attempt budget surfaces
//! [`ParlioError::RetriesExhausted`] as the final item and stops.
//!
//! The long-lived connection carries no wall-clock timeout: liveness is judged
//! only by explicit state transitions. Only the connect phase is bounded.

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use parlio_config::TransportConfig;
use parlio_core::{JobId, ParlioError};
use parlio_wire::{decoded_stream, SyncEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Buffered frames between the reader task and the consumer. Backpressure via
/// the bounded channel preserves arrival order.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Observable connection state, judged only by explicit transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection has been opened yet.
    Idle,
    /// A connection (or reconnection) attempt is in flight.
    Connecting,
    /// The stream is live.
    Open,
    /// Deliberately closed, or the server ended the stream gracefully.
    Closed,
}

/// What to do about an error signal, given the connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorDisposition {
    /// Treat as graceful end-of-stream; no retry.
    Graceful,
    /// Transient; a retry is already pending, do not spawn a duplicate.
    Ignore,
    /// Abnormal; schedule a reconnection.
    Retry,
}

fn disposition(state: ConnectionState) -> ErrorDisposition {
    match state {
        ConnectionState::Closed => ErrorDisposition::Graceful,
        ConnectionState::Connecting => ErrorDisposition::Ignore,
        ConnectionState::Idle | ConnectionState::Open => ErrorDisposition::Retry,
    }
}

/// An item delivered from the socket to its consumer.
#[derive(Debug)]
pub enum SocketItem {
    /// A decoded sync event, in network order.
    Event(SyncEvent),
    /// The server ended the stream gracefully. No retry follows.
    Closed,
    /// Terminal failure: the reconnection budget is exhausted.
    Failed(ParlioError),
}

/// Connection manager for one generation job's event stream.
pub struct EventSocket {
    client: reqwest::Client,
    base_url: String,
    config: TransportConfig,
    state: Arc<Mutex<ConnectionState>>,
    live: Option<LiveConnection>,
}

struct LiveConnection {
    cancel: CancellationToken,
}

impl EventSocket {
    /// Creates a socket for the given server.
    ///
    /// The underlying client bounds only the connect phase; an established
    /// stream may stay silent indefinitely.
    pub fn new(base_url: &str, config: TransportConfig) -> Result<Self, ParlioError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| ParlioError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            live: None,
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("state lock poisoned")
    }

    /// Opens the live connection for `job`, returning the ordered item stream.
    ///
    /// At most one connection is live per socket: a prior connection is
    /// forcibly closed first, and the retry counter starts fresh.
    pub fn connect(&mut self, job: &JobId) -> mpsc::Receiver<SocketItem> {
        self.close_live();

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let url = format!("{}/jobs/{}/events", self.base_url, job.0);

        // Each connection run owns its state cell; a cancelled predecessor
        // can no longer affect what `state()` reports.
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        self.state = Arc::clone(&state);
        info!(job_id = %job, "opening event stream");

        tokio::spawn(run_connection(
            self.client.clone(),
            url,
            self.config.clone(),
            state,
            tx,
            cancel.clone(),
        ));

        self.live = Some(LiveConnection { cancel });
        rx
    }

    /// Closes the connection and cancels any pending retry timer. Idempotent;
    /// no further items are delivered once this returns.
    pub fn disconnect(&mut self) {
        self.close_live();
    }

    fn close_live(&mut self) {
        if let Some(live) = self.live.take() {
            live.cancel.cancel();
            *self.state.lock().expect("state lock poisoned") = ConnectionState::Closed;
            debug!("event socket disconnected");
        }
    }
}

impl Drop for EventSocket {
    fn drop(&mut self) {
        self.close_live();
    }
}

/// The connection driver: connect, pump frames, and reconnect on abnormal
/// drops until cancelled, gracefully closed, or out of attempts.
async fn run_connection(
    client: reqwest::Client,
    url: String,
    config: TransportConfig,
    state: Arc<Mutex<ConnectionState>>,
    tx: mpsc::Sender<SocketItem>,
    cancel: CancellationToken,
) {
    let set_state = |next: ConnectionState| {
        *state.lock().expect("state lock poisoned") = next;
    };
    let mut attempt: u32 = 0;

    loop {
        set_state(ConnectionState::Connecting);

        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = client
                .get(&url)
                .header("accept", "text/event-stream")
                .send() => result,
        };

        let abnormal: ParlioError = match connected {
            Ok(response) if response.status().is_success() => {
                set_state(ConnectionState::Open);
                attempt = 0;
                debug!(url = %url, "event stream open");

                let mut events = decoded_stream(response);
                let error = loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        item = events.next() => match item {
                            Some(Ok(event)) => {
                                if tx.send(SocketItem::Event(event)).await.is_err() {
                                    // Consumer went away; nothing left to do.
                                    return;
                                }
                            }
                            Some(Err(e)) => break e,
                            None => {
                                // Server ended the stream.
                                set_state(ConnectionState::Closed);
                                info!(url = %url, "event stream closed by server");
                                let _ = tx.send(SocketItem::Closed).await;
                                return;
                            }
                        },
                    }
                };

                // An error signal arrived; its handling depends on the
                // connection state at the moment it is observed.
                let current_state = *state.lock().expect("state lock poisoned");
                match disposition(current_state) {
                    ErrorDisposition::Graceful => {
                        let _ = tx.send(SocketItem::Closed).await;
                        return;
                    }
                    ErrorDisposition::Ignore => continue,
                    ErrorDisposition::Retry => error,
                }
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                ParlioError::Transport {
                    message: format!("event stream request returned {status}: {body}"),
                    source: None,
                }
            }
            Err(e) => ParlioError::Transport {
                message: format!("event stream connect failed: {e}"),
                source: Some(Box::new(e)),
            },
        };

        attempt += 1;
        if attempt >= config.max_reconnect_attempts {
            set_state(ConnectionState::Closed);
            warn!(
                url = %url,
                attempts = attempt,
                error = %abnormal,
                "reconnection budget exhausted; giving up"
            );
            let _ = tx
                .send(SocketItem::Failed(ParlioError::RetriesExhausted {
                    attempts: attempt,
                }))
                .await;
            return;
        }

        let delay = config.base_delay() * attempt;
        warn!(
            url = %url,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %abnormal,
            "abnormal stream drop; scheduling reconnect"
        );
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
