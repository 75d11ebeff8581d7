//! Chat session orchestration
//!
//! Holds the conversation for one logged-in session and applies reply
//! events to it. Only one reply is expected at a time; sending again while
//! a reply is streaming is not prevented.

use crate::client::{ChatBackend, ChatRequest};
use crate::conversation::Conversation;
use crate::session::Session;
use crate::streaming::{ReplyEvent, ReplyStream, StreamConfig};
use sidekick_common::{Persona, Result, SidekickError};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    session: Session,
    persona: Persona,
    conversation: Conversation,
    stream_config: StreamConfig,
    loading: bool,
    thinking: bool,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>, session: Session, stream_config: StreamConfig) -> Self {
        Self {
            backend,
            session,
            persona: Persona::default(),
            conversation: Conversation::new(),
            stream_config,
            loading: false,
            thinking: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub fn set_persona(&mut self, persona: Persona) {
        debug!("Persona set to {:?}", persona);
        self.persona = persona;
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    /// A reply is pending, thinking, or partially shown
    pub fn is_typing(&self) -> bool {
        self.loading || self.thinking || self.conversation.has_provisional()
    }

    /// Post a user message and start streaming the reply.
    ///
    /// The user message is added to the conversation before the request is
    /// made, so it stays visible even if the request fails.
    pub async fn send(&mut self, input: &str) -> Result<ReplyStream> {
        let text = input.trim();
        if text.is_empty() {
            return Err(SidekickError::Validation("Message is empty".to_string()));
        }
        let (user_id, session_id) = self
            .session
            .ids()
            .ok_or_else(|| SidekickError::Auth("User not logged in".to_string()))?;

        self.conversation.push_user(text);
        self.loading = true;

        let request = ChatRequest {
            user_id,
            session_id,
            message: text.to_string(),
            persona_mode: self.persona,
        };
        match self.backend.send_message(&request).await {
            Ok(body) => Ok(ReplyStream::spawn(body, self.stream_config.clone())),
            Err(e) => {
                warn!("Chat request failed: {}", e);
                self.loading = false;
                Err(e)
            }
        }
    }

    /// Fold one reply event into the conversation
    pub fn apply(&mut self, event: &ReplyEvent) {
        match event {
            ReplyEvent::Snapshot(state) => {
                self.conversation.set_provisional(state.accumulated_text.as_str());
            }
            ReplyEvent::ThinkingChanged(thinking) => {
                self.thinking = *thinking;
            }
            ReplyEvent::Completed(message) => {
                self.conversation.finalize(message.clone());
                self.loading = false;
            }
            ReplyEvent::Interrupted { reason } => {
                // the partial reply stays provisional
                warn!("Reply interrupted: {}", reason);
                self.loading = false;
            }
        }
    }

    /// Replace the conversation with the stored history. Without both ids
    /// this does nothing.
    pub async fn load_history(&mut self) -> Result<usize> {
        let Some((user_id, session_id)) = self.session.ids() else {
            return Ok(0);
        };
        let messages = self.backend.fetch_history(user_id, session_id).await?;
        let count = messages.len();
        self.conversation.replace_history(messages);
        info!("Loaded {} messages of session {}", count, session_id);
        Ok(count)
    }

    /// Clear the conversation locally
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.thinking = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use futures::stream;
    use sidekick_common::{Message, Role, THINKING_END, THINKING_START};
    use std::sync::Mutex;

    struct ScriptedBackend {
        chunks: Vec<&'static str>,
        history: Vec<Message>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new(chunks: Vec<&'static str>) -> Self {
            Self {
                chunks,
                history: Vec::new(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn send_message(&self, request: &ChatRequest) -> Result<ByteStream> {
            self.requests.lock().unwrap().push(request.clone());
            let chunks: Vec<Result<Bytes>> = self
                .chunks
                .iter()
                .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
                .collect();
            Ok(stream::iter(chunks).boxed())
        }

        async fn fetch_history(&self, _user_id: i64, _session_id: i64) -> Result<Vec<Message>> {
            Ok(self.history.clone())
        }
    }

    fn logged_in() -> Session {
        Session {
            token: Some("tok".to_string()),
            user_name: "Ada".to_string(),
            user_email: None,
            user_id: Some(3),
            session_id: Some(9),
            logged_in_at: None,
        }
    }

    #[tokio::test]
    async fn test_send_and_apply_reply() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            "Hel",
            THINKING_START,
            THINKING_END,
            "lo",
        ]));
        let mut chat = ChatSession::new(backend.clone(), logged_in(), StreamConfig::default());
        chat.set_persona(Persona::Mentor);

        let mut reply = chat.send("  hi  ").await.unwrap();
        assert!(chat.is_typing());

        let mut saw_thinking = false;
        while let Some(event) = reply.next().await {
            chat.apply(&event);
            saw_thinking |= chat.is_thinking();
            assert!(chat.conversation().iter().filter(|m| m.role == Role::AssistantProvisional).count() <= 1);
        }

        assert!(saw_thinking);
        assert!(!chat.is_typing());
        assert_eq!(
            chat.conversation().messages(),
            &[Message::user("hi"), Message::assistant("Hello")]
        );

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "hi");
        assert_eq!(requests[0].persona_mode, Persona::Mentor);
        assert_eq!((requests[0].user_id, requests[0].session_id), (3, 9));
    }

    #[tokio::test]
    async fn test_send_requires_ids() {
        let backend = Arc::new(ScriptedBackend::new(vec!["x"]));
        let session = Session {
            session_id: None,
            ..logged_in()
        };
        let mut chat = ChatSession::new(backend.clone(), session, StreamConfig::default());

        let err = match chat.send("hello").await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert_eq!(err.to_string(), "Authentication error: User not logged in");
        assert!(chat.conversation().is_empty());
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let backend = Arc::new(ScriptedBackend::new(vec!["x"]));
        let mut chat = ChatSession::new(backend, logged_in(), StreamConfig::default());
        assert!(matches!(
            chat.send("   ").await.err(),
            Some(SidekickError::Validation(_))
        ));
        assert!(!chat.is_typing());
    }

    #[tokio::test]
    async fn test_interrupted_reply_keeps_provisional() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let mut chat = ChatSession::new(backend, logged_in(), StreamConfig::default());
        chat.apply(&ReplyEvent::Snapshot(crate::StreamState {
            accumulated_text: "partial".to_string(),
            thinking: false,
        }));
        chat.apply(&ReplyEvent::Interrupted {
            reason: "reset".to_string(),
        });

        assert_eq!(
            chat.conversation().provisional().map(|m| m.text.as_str()),
            Some("partial")
        );
        assert!(chat.is_typing());
    }

    #[tokio::test]
    async fn test_history_and_reset() {
        let mut backend = ScriptedBackend::new(vec![]);
        backend.history = vec![Message::user("old"), Message::assistant("reply")];
        let mut chat = ChatSession::new(Arc::new(backend), logged_in(), StreamConfig::default());

        assert_eq!(chat.load_history().await.unwrap(), 2);
        assert_eq!(chat.conversation().messages().len(), 2);

        chat.reset();
        assert!(chat.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_history_skipped_without_ids() {
        let mut backend = ScriptedBackend::new(vec![]);
        backend.history = vec![Message::user("old")];
        let session = Session {
            user_id: None,
            ..logged_in()
        };
        let mut chat = ChatSession::new(Arc::new(backend), session, StreamConfig::default());
        assert_eq!(chat.load_history().await.unwrap(), 0);
        assert!(chat.conversation().is_empty());
    }
}
