// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session assembly: explicit construction of the whole engine.
//!
//! There is no module-level singleton anywhere in Parlio. A [`SyncSession`]
//! is created at session start, hands `Arc` references to its consumers, and
//! [`SyncSession::shutdown`] tears everything down explicitly -- the registry,
//! the optimistic tracking, and the store are cleared, and the transport is
//! disconnected.

use std::sync::Arc;

use futures::StreamExt;
use parlio_config::ParlioConfig;
use parlio_core::{JobId, Message, ParlioError, ThreadId};
use parlio_store::ConversationStore;
use parlio_transport::{EventSocket, MessageSender, OutboundMessage, SocketItem};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::correlation::JobRegistry;
use crate::optimistic::{Draft, EchoReceipt, OptimisticEcho};
use crate::processor::{EngineSignal, EventProcessor};

/// One live sync session: store, correlation, optimistic echo, processor, and
/// transport, wired Transport -> Decoder -> Processor -> Store.
pub struct SyncSession {
    store: Arc<ConversationStore>,
    registry: Arc<JobRegistry>,
    echo: Arc<OptimisticEcho>,
    processor: Arc<EventProcessor>,
    socket: EventSocket,
    sender: MessageSender,
    signals_tx: mpsc::UnboundedSender<EngineSignal>,
    signals_rx: Option<mpsc::UnboundedReceiver<EngineSignal>>,
    pump: Option<tokio::task::JoinHandle<()>>,
}

impl SyncSession {
    pub fn new(config: &ParlioConfig) -> Result<Self, ParlioError> {
        let store = Arc::new(ConversationStore::new());
        let registry = Arc::new(JobRegistry::new());
        let echo = Arc::new(OptimisticEcho::new(Arc::clone(&store)));
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();

        let processor = Arc::new(EventProcessor::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&echo),
            signals_tx.clone(),
        ));

        let socket = EventSocket::new(&config.server.base_url, config.transport.clone())?;
        let sender = MessageSender::new(&config.server.base_url, config.transport.clone())?;

        Ok(Self {
            store,
            registry,
            echo,
            processor,
            socket,
            sender,
            signals_tx,
            signals_rx: Some(signals_rx),
            pump: None,
        })
    }

    /// The session's store, for slice subscriptions and snapshot reads.
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Takes the engine signal receiver. Yields `None` after the first call:
    /// there is exactly one consumer of out-of-band signals.
    pub fn take_signals(&mut self) -> Option<mpsc::UnboundedReceiver<EngineSignal>> {
        self.signals_rx.take()
    }

    /// Bootstraps a thread from fetched history before live events attach.
    ///
    /// Loaded messages are marked as already observed so they do not
    /// re-announce themselves as new.
    pub fn load_thread(&self, thread_id: &ThreadId, messages: Vec<Message>) {
        self.processor
            .note_loaded(messages.iter().map(|m| m.id.clone()));
        let _ = self.store.load_thread(thread_id, messages);
    }

    /// Attaches the push connection for a freshly launched generation job.
    ///
    /// Registers the job -> thread correlation, ensures the thread exists,
    /// and starts the single processing task that applies the job's events in
    /// arrival order.
    pub fn launch(&mut self, job: JobId, thread: ThreadId) {
        info!(job_id = %job, thread_id = %thread, "launching job sync");
        self.registry.register(job.clone(), thread.clone());
        let _ = self.store.create_thread(&thread);

        let mut events = self.socket.connect(&job);
        let processor = Arc::clone(&self.processor);
        let registry = Arc::clone(&self.registry);
        let signals = self.signals_tx.clone();

        self.pump = Some(tokio::spawn(async move {
            while let Some(item) = events.recv().await {
                match item {
                    SocketItem::Event(event) => processor.apply(&job, event),
                    SocketItem::Closed => {
                        debug!(job_id = %job, "job stream ended");
                        break;
                    }
                    SocketItem::Failed(error) => {
                        let attempts = match &error {
                            ParlioError::RetriesExhausted { attempts } => *attempts,
                            _ => 0,
                        };
                        warn!(job_id = %job, error = %error, "job stream terminally down");
                        let _ = signals.send(EngineSignal::TransportDown {
                            job: job.clone(),
                            attempts,
                        });
                        break;
                    }
                }
            }
            registry.release(&job);
        }));
    }

    /// Closes the push connection without tearing down state.
    pub fn disconnect(&mut self) {
        self.socket.disconnect();
    }

    /// Sends a user message with optimistic echo, then drives the streamed
    /// response through the processor until the server finishes.
    ///
    /// The user's message and an assistant placeholder appear in the store
    /// immediately; the `client_token` in the returned receipt is what the
    /// server echoes back for reconciliation. On failure the placeholder is
    /// retired, while the echoed user message stays for the caller to mark up
    /// or retry.
    pub async fn send(
        &self,
        thread_id: &ThreadId,
        draft: Draft,
        cancel: CancellationToken,
    ) -> Result<EchoReceipt, ParlioError> {
        let _ = self.store.create_thread(thread_id);
        let receipt = self.echo.echo_user_message(thread_id, &draft);
        self.echo.echo_assistant_placeholder(thread_id);

        let outbound = OutboundMessage {
            content: draft.content,
            client_token: Some(receipt.client_token.clone()),
            attachments: draft.attachments,
        };

        let mut stream = match self.sender.send_message(thread_id, outbound, cancel).await {
            Ok(stream) => stream,
            Err(error) => {
                self.retire_placeholder(thread_id);
                return Err(error);
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => self.processor.apply_to_thread(thread_id, event),
                Err(error) => {
                    warn!(thread_id = %thread_id, error = %error, "send response stream failed");
                    self.retire_placeholder(thread_id);
                    return Err(error);
                }
            }
        }

        Ok(receipt)
    }

    /// Tears the session down: transport closed, processing stopped, and all
    /// session state cleared.
    pub fn shutdown(&mut self) {
        self.socket.disconnect();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.registry.clear();
        self.echo.clear();
        self.store.clear();
        info!("sync session shut down");
    }

    fn retire_placeholder(&self, thread_id: &ThreadId) {
        if let Some(placeholder) = self.echo.take_placeholder(thread_id) {
            let _ = self.store.remove_message(thread_id, &placeholder);
        }
    }
}
