//! Reply routing from completed commands to client connections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use crate::commands::ReplySink;
use crate::error::{CommandErrorKind, ServerError};
use crate::protocol::{ClientId, Reply};

/// Routes replies to the writer task of the connection that sent the request.
#[derive(Debug)]
pub struct ReplyRouter {
    clients: Mutex<HashMap<ClientId, mpsc::UnboundedSender<Reply>>>,
    next_client_id: AtomicU32,
}

impl Default for ReplyRouter {
    fn default() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_client_id: AtomicU32::new(1),
        }
    }
}

impl ReplyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client and return its id with the receiving end of its queue.
    pub fn register(&self) -> (ClientId, mpsc::UnboundedReceiver<Reply>) {
        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(client_id, tx);
        debug!(client_id, "Client registered");
        (client_id, rx)
    }

    /// Forget a client. Replies for it are dropped from now on.
    pub fn unregister(&self, client_id: ClientId) {
        if self.lock().remove(&client_id).is_some() {
            debug!(client_id, "Client unregistered");
        }
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ClientId, mpsc::UnboundedSender<Reply>>> {
        // A poisoned map is still consistent: every operation is a single insert or remove.
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReplySink for ReplyRouter {
    fn send_reply(&self, reply: Reply) -> Result<(), ServerError> {
        let client_id = reply.client_id;
        let clients = self.lock();
        let sender = clients.get(&client_id).ok_or(ServerError::Command {
            kind: CommandErrorKind::ClientDisconnected { client_id },
        })?;
        sender.send(reply).map_err(|_| ServerError::Command {
            kind: CommandErrorKind::ClientDisconnected { client_id },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_routed_to_its_client() {
        let router = ReplyRouter::new();
        let (first, mut first_rx) = router.register();
        let (second, mut second_rx) = router.register();
        assert_ne!(first, second);

        router
            .send_reply(Reply::failure("Tracker", "1", second, "nope"))
            .unwrap();

        let reply = second_rx.recv().await.unwrap();
        assert_eq!(reply.id, "1");
        assert!(first_rx.try_recv().is_err());
    }

    #[test]
    fn test_reply_to_departed_client_fails() {
        let router = ReplyRouter::new();
        let (client_id, _rx) = router.register();
        router.unregister(client_id);
        assert_eq!(router.client_count(), 0);

        let result = router.send_reply(Reply::failure("Tracker", "1", client_id, "late"));
        assert!(matches!(
            result,
            Err(ServerError::Command {
                kind: CommandErrorKind::ClientDisconnected { .. }
            })
        ));
    }
}
