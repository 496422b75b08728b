//! Chat: `{type:"chat", nickname, text, timestamp}` in both directions.

use airwave_core::{Envelope, SessionError};
use airwave_session::SessionManager;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::attachment::Attachment;

/// Envelope type for chat lines.
pub const CHAT: &str = "chat";

/// Inbound queue depth per receiver.
pub const CHAT_CHANNEL_CAPACITY: usize = 256;

/// One chat line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender's nickname.
    pub nickname: String,
    /// Message body.
    pub text: String,
    /// Send time, when the sender provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    fn to_envelope(&self) -> Envelope {
        let mut envelope = Envelope::new(CHAT)
            .with("nickname", self.nickname.as_str())
            .with("text", self.text.as_str());
        if let Some(ts) = self.timestamp {
            envelope = envelope.with("timestamp", ts.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        envelope
    }
}

/// Chat feature.
pub struct ChatAdapter {
    session: SessionManager,
    messages: broadcast::Sender<ChatMessage>,
    _attachment: Attachment,
}

impl ChatAdapter {
    /// Start receiving chat on `session`.
    pub fn new(session: &SessionManager) -> Self {
        let (messages, _) = broadcast::channel(CHAT_CHANNEL_CAPACITY);
        let tx = messages.clone();
        let attachment = Attachment::new(session, move |envelope| {
            if !envelope.is(CHAT) {
                return;
            }
            match envelope.decode::<ChatMessage>() {
                Ok(message) => {
                    let _ = tx.send(message);
                }
                Err(e) => debug!(envelope_type = CHAT, error = %e, "ignoring chat frame with unexpected shape"),
            }
        });
        Self {
            session: session.clone(),
            messages,
            _attachment: attachment,
        }
    }

    /// Receive chat lines arriving from now on.
    pub fn messages(&self) -> broadcast::Receiver<ChatMessage> {
        self.messages.subscribe()
    }

    /// Send a chat line as the current identity.
    pub fn send(&self, text: &str) -> Result<ChatMessage, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::InvalidInput("message is empty".into()));
        }
        let nickname = self
            .session
            .identity()
            .ok_or_else(|| SessionError::InvalidInput("set a nickname before chatting".into()))?;
        let message = ChatMessage {
            nickname,
            text: text.to_owned(),
            timestamp: Some(Utc::now()),
        };
        self.session.send(&message.to_envelope())?;
        Ok(message)
    }

    /// Change nickname and announce it.
    ///
    /// Offline, the new name is kept and announced on the next connect.
    pub fn rename(&self, nickname: &str) -> Result<(), SessionError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(SessionError::InvalidInput("nickname is empty".into()));
        }
        self.session.set_identity(Some(nickname));
        match self.session.announce() {
            Ok(()) | Err(SessionError::NotConnected) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use airwave_session::SessionConfig;
    use airwave_session::testing::FakeTransport;
    use assert_matches::assert_matches;
    use tokio::sync::broadcast::error::TryRecvError;

    fn connected() -> (SessionManager, FakeTransport, ChatAdapter) {
        let transport = FakeTransport::new();
        let session = SessionManager::new(SessionConfig::new("ws://test/ws"), Arc::new(transport.clone()));
        let chat = ChatAdapter::new(&session);
        transport.last_link().unwrap().open();
        (session, transport, chat)
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_chat_is_broadcast() {
        let (_session, transport, chat) = connected();
        let mut rx = chat.messages();

        transport
            .last_link()
            .unwrap()
            .message(r#"{"type":"chat","nickname":"dj","text":"next up","timestamp":"2026-01-02T03:04:05.000Z"}"#);

        let message = rx.try_recv().unwrap();
        assert_eq!(message.nickname, "dj");
        assert_eq!(message.text, "next up");
        assert_eq!(
            message.timestamp.unwrap().to_rfc3339_opts(SecondsFormat::Secs, true),
            "2026-01-02T03:04:05Z"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn other_types_and_bad_shapes_ignored() {
        let (_session, transport, chat) = connected();
        let mut rx = chat.messages();
        let link = transport.last_link().unwrap();

        link.message(r#"{"type":"users","users":[]}"#);
        link.message(r#"{"type":"chat","nickname":"dj"}"#);
        assert_matches!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn delivered_once_after_reconnect() {
        let (_session, transport, chat) = connected();
        let mut rx = chat.messages();

        transport.link(0).unwrap().close_remote("");
        tokio::time::sleep(Duration::from_millis(1001)).await;
        let second = transport.link(1).unwrap();
        second.open();
        second.message(r#"{"type":"chat","nickname":"dj","text":"back"}"#);

        assert_eq!(rx.try_recv().unwrap().text, "back");
        assert_matches!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn send_requires_nickname() {
        let (_session, _transport, chat) = connected();
        assert_matches!(chat.send("hello"), Err(SessionError::InvalidInput(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn send_builds_chat_envelope() {
        let (session, transport, chat) = connected();
        session.set_identity(Some("nik"));

        let message = chat.send("  hello  ").unwrap();
        assert_eq!(message.text, "hello");

        let sent = transport.last_link().unwrap().sent_envelopes();
        let envelope = sent.iter().find(|e| e.is(CHAT)).unwrap();
        assert_eq!(envelope.get("nickname").and_then(|v| v.as_str()), Some("nik"));
        assert_eq!(envelope.get("text").and_then(|v| v.as_str()), Some("hello"));
        let timestamp = envelope.get("timestamp").and_then(|v| v.as_str()).unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn send_rejects_blank_text() {
        let (session, _transport, chat) = connected();
        session.set_identity(Some("nik"));
        assert_matches!(chat.send("   "), Err(SessionError::InvalidInput(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn send_offline_is_not_connected() {
        let transport = FakeTransport::new();
        let session = SessionManager::new(SessionConfig::new("ws://test/ws"), Arc::new(transport.clone()));
        session.set_identity(Some("nik"));
        let chat = ChatAdapter::new(&session);
        assert_matches!(chat.send("hello"), Err(SessionError::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn rename_announces_new_nickname() {
        let (session, transport, chat) = connected();
        chat.rename(" dj ").unwrap();
        assert_eq!(session.identity().as_deref(), Some("dj"));

        let sent = transport.last_link().unwrap().sent_envelopes();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is("join"));
        assert_eq!(sent[0].get("nickname").and_then(|v| v.as_str()), Some("dj"));
    }

    #[tokio::test(start_paused = true)]
    async fn rename_offline_defers_announce() {
        let transport = FakeTransport::new();
        let session = SessionManager::new(SessionConfig::new("ws://test/ws"), Arc::new(transport.clone()));
        let chat = ChatAdapter::new(&session);

        chat.rename("dj").unwrap();
        transport.last_link().unwrap().open();
        let sent = transport.last_link().unwrap().sent_envelopes();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].get("nickname").and_then(|v| v.as_str()), Some("dj"));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_detaches_from_connection() {
        let (session, _transport, chat) = connected();
        let conn = session.active_connection().unwrap();
        assert_eq!(conn.listener_count(), 1);
        drop(chat);
        assert_eq!(conn.listener_count(), 0);
        assert_eq!(session.subscriber_count(), 0);
    }
}
