//! External-agent messaging
//!
//! Agents outside the shop can mention the assistant and receive replies.
//! The transport is someone else's concern; the core only needs the two
//! operations of [`MentionBridge`]. [`MentionListener`] is the standing
//! background task that waits for mentions and feeds them into the session
//! inbox as ordinary turns, so the session state keeps a single writer.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, ShopError};
use crate::session::Turn;

/// An incoming message from an external agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub sender: String,
    pub content: String,
}

impl Mention {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
        }
    }
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message from {}: {}", self.sender, self.content)
    }
}

/// A message sent to an external agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient: String,
    pub content: String,
}

/// Transport to the external-agent coordination service.
#[async_trait]
pub trait MentionBridge: Send + Sync {
    /// Suspends until an external agent mentions this assistant.
    async fn wait_for_mentions(&self) -> Result<Mention>;

    /// Next pending mention without waiting. `None` when nothing is queued
    /// or another consumer (the [`MentionListener`]) is receiving.
    async fn poll_mention(&self) -> Result<Option<Mention>>;

    /// Fire-and-forget message to a named external agent.
    async fn send_message(&self, recipient: &str, content: &str) -> Result<()>;
}

/// In-process bridge over tokio channels.
///
/// Mentions are pushed through the sender returned by [`ChannelBridge::new`];
/// outbound messages are recorded and can be inspected with
/// [`ChannelBridge::sent`].
pub struct ChannelBridge {
    inbound: tokio::sync::Mutex<mpsc::Receiver<Mention>>,
    outbound: Mutex<Vec<OutboundMessage>>,
}

impl ChannelBridge {
    pub fn new() -> (Self, mpsc::Sender<Mention>) {
        let (tx, rx) = mpsc::channel(32);
        (
            Self {
                inbound: tokio::sync::Mutex::new(rx),
                outbound: Mutex::new(Vec::new()),
            },
            tx,
        )
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.outbound
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MentionBridge for ChannelBridge {
    async fn wait_for_mentions(&self) -> Result<Mention> {
        let mut inbound = self.inbound.lock().await;
        inbound
            .recv()
            .await
            .ok_or_else(|| ShopError::collaborator("mention channel closed"))
    }

    async fn poll_mention(&self) -> Result<Option<Mention>> {
        let Ok(mut inbound) = self.inbound.try_lock() else {
            return Ok(None);
        };
        match inbound.try_recv() {
            Ok(mention) => Ok(Some(mention)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(ShopError::collaborator("mention channel closed"))
            }
        }
    }

    async fn send_message(&self, recipient: &str, content: &str) -> Result<()> {
        let mut sent = self
            .outbound
            .lock()
            .map_err(|_| ShopError::collaborator("outbound log poisoned"))?;
        sent.push(OutboundMessage {
            recipient: recipient.to_string(),
            content: content.to_string(),
        });
        debug!(%recipient, "message sent to external agent");
        Ok(())
    }
}

/// Background task turning mentions into session turns.
pub struct MentionListener {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MentionListener {
    /// Starts listening on `bridge`; every mention is queued on `inbox`.
    ///
    /// The task ends on [`MentionListener::shutdown`], when the inbox is
    /// closed, or when the bridge fails.
    pub fn spawn(bridge: Arc<dyn MentionBridge>, inbox: mpsc::Sender<Turn>) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            info!("mention listener started");
            loop {
                tokio::select! {
                    _ = stop.changed() => break,
                    received = bridge.wait_for_mentions() => match received {
                        Ok(mention) => {
                            debug!(sender = %mention.sender, "mention received");
                            if inbox.send(Turn::Mention(mention)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "mention listener stopped");
                            break;
                        }
                    },
                }
            }
            info!("mention listener finished");
        });
        Self { shutdown, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the task and waits for it to end.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
