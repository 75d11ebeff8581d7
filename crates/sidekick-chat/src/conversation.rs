//! Conversation state for the chat screen
//!
//! Committed messages are append-only. The in-progress assistant reply lives
//! in a separate slot, so there is never more than one of it and finishing a
//! reply is a single swap.

use sidekick_common::{Message, Role};

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    provisional: Option<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Replace the provisional reply text in place
    pub fn set_provisional(&mut self, text: impl Into<String>) {
        self.provisional = Some(Message::provisional(text));
    }

    /// Swap the provisional reply for the final message
    pub fn finalize(&mut self, message: Message) {
        self.provisional = None;
        let message = Message {
            role: Role::Assistant,
            ..message
        };
        self.messages.push(message);
    }

    /// Replace everything with the loaded history. Any reply in progress is
    /// kept.
    pub fn replace_history(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.provisional = None;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn provisional(&self) -> Option<&Message> {
        self.provisional.as_ref()
    }

    pub fn has_provisional(&self) -> bool {
        self.provisional.is_some()
    }

    /// Messages in display order, the provisional reply last
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().chain(self.provisional.iter())
    }

    pub fn len(&self) -> usize {
        self.messages.len() + usize::from(self.provisional.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_provisional_slot() {
        let mut conversation = Conversation::new();
        conversation.push_user("hi");
        conversation.set_provisional("He");
        conversation.set_provisional("Hello");

        let roles: Vec<Role> = conversation.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::AssistantProvisional]);
        assert_eq!(conversation.provisional().map(|m| m.text.as_str()), Some("Hello"));
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_finalize_swaps_provisional() {
        let mut conversation = Conversation::new();
        conversation.push_user("hi");
        conversation.set_provisional("Hel");
        conversation.finalize(Message::assistant("Hello"));

        assert!(!conversation.has_provisional());
        assert_eq!(
            conversation.messages(),
            &[Message::user("hi"), Message::assistant("Hello")]
        );
    }

    #[test]
    fn test_finalize_without_provisional_appends() {
        let mut conversation = Conversation::new();
        conversation.finalize(Message::provisional(""));
        assert_eq!(conversation.messages(), &[Message::assistant("")]);
    }

    #[test]
    fn test_history_and_clear() {
        let mut conversation = Conversation::new();
        conversation.push_user("old");
        conversation.set_provisional("typing");
        conversation.replace_history(vec![Message::user("a"), Message::assistant("b")]);
        assert_eq!(conversation.messages().len(), 2);
        assert!(conversation.has_provisional());

        conversation.clear();
        assert!(conversation.is_empty());
        assert!(!conversation.has_provisional());
    }
}
