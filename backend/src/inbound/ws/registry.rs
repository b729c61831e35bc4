//! Connection registry backing the socket broadcaster port.
//!
//! Each open WebSocket registers an unbounded channel under its user id;
//! publishing serialises the frame once and hands it to every live channel.
//! A user with no open socket is not an error, the frame is dropped and the
//! persistent notification record remains.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::ports::{BroadcastError, SocketBroadcaster};

type Channels = HashMap<Uuid, Vec<mpsc::UnboundedSender<String>>>;

/// Shared registry of open connections, keyed by user.
#[derive(Clone, Default)]
pub struct WsRegistry {
    inner: Arc<Mutex<Channels>>,
}

impl WsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Channels> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a connection for `user_id`; frames arrive on the receiver.
    pub fn register(&self, user_id: Uuid) -> mpsc::UnboundedReceiver<String> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().entry(user_id).or_default().push(sender);
        receiver
    }

    /// Drop closed channels for `user_id`.
    fn prune(&self, user_id: Uuid) {
        let mut channels = self.lock();
        if let Some(senders) = channels.get_mut(&user_id) {
            senders.retain(|sender| !sender.is_closed());
            if senders.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    /// Number of open connections for `user_id`.
    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.lock().get(&user_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl SocketBroadcaster for WsRegistry {
    async fn send_to_user(&self, user_id: Uuid, frame: &Value) -> Result<(), BroadcastError> {
        let text = frame.to_string();
        let senders: Vec<mpsc::UnboundedSender<String>> = self
            .lock()
            .get(&user_id)
            .map(Clone::clone)
            .unwrap_or_default();
        let mut any_closed = false;
        for sender in senders {
            if sender.send(text.clone()).is_err() {
                any_closed = true;
            }
        }
        if any_closed {
            self.prune(user_id);
        }
        Ok(())
    }
}
