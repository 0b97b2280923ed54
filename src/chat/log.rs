//! Message log: append-only chat history with broadcast to subscribers.

use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use super::model::{Author, Card, Message, SessionEvent};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Ordered chat entries. Entries are never edited or removed; only
/// [`MessageLog::reset`] empties the log.
pub struct MessageLog {
    messages: RwLock<Vec<Message>>,
    tx: broadcast::Sender<SessionEvent>,
}

impl MessageLog {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            messages: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Subscribe to log and session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Sender shared with the session for non-log events.
    pub(crate) fn events(&self) -> &broadcast::Sender<SessionEvent> {
        &self.tx
    }

    /// Append a card. Assigns the id and timestamp.
    pub async fn append(&self, author: Author, card: Card) -> Message {
        let message = Message::new(author, card);
        debug!(message_id = %message.id, kind = message.card.kind(), "Appending message");
        {
            let mut messages = self.messages.write().await;
            messages.push(message.clone());
        }

        // Ok if nobody is listening
        let _ = self.tx.send(SessionEvent::MessageAppended {
            message: message.clone(),
        });
        message
    }

    /// Clear every entry.
    pub async fn reset(&self) {
        self.messages.write().await.clear();
        let _ = self.tx.send(SessionEvent::LogReset);
    }

    /// Read-only copy for rendering.
    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_preserves_order_and_broadcasts() {
        let log = MessageLog::new();
        let mut rx = log.subscribe();

        log.append(Author::User, Card::text("hi")).await;
        log.append(Author::Bot, Card::text("hello")).await;

        let snapshot = log.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[0].is_user());
        assert_eq!(snapshot[1].text(), Some("hello"));
        assert_ne!(snapshot[0].id, snapshot[1].id);

        match rx.recv().await.unwrap() {
            SessionEvent::MessageAppended { message } => assert_eq!(message.text(), Some("hi")),
            other => panic!("Expected MessageAppended, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reset_clears_and_notifies() {
        let log = MessageLog::new();
        log.append(Author::Bot, Card::text("one")).await;
        let mut rx = log.subscribe();

        log.reset().await;
        assert!(log.is_empty().await);
        assert!(matches!(rx.recv().await.unwrap(), SessionEvent::LogReset));
    }

    #[tokio::test]
    async fn snapshot_is_a_copy() {
        let log = MessageLog::new();
        log.append(Author::Bot, Card::text("one")).await;
        let before = log.snapshot().await;
        log.append(Author::Bot, Card::text("two")).await;
        assert_eq!(before.len(), 1);
        assert_eq!(log.len().await, 2);
    }
}
