//! Terminal rendering of conversations and streaming replies

use colored::*;
use sidekick_chat::{Conversation, ReplyEvent};
use sidekick_common::{Persona, Role};
use termimad::MadSkin;

/// Turns reply events into terminal output, printing only the text that
/// has not been shown yet.
#[derive(Debug, Default)]
pub struct ReplyPrinter {
    printed: usize,
    thinking: bool,
}

impl ReplyPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output for one event, if any
    pub fn render(&mut self, event: &ReplyEvent) -> Option<String> {
        match event {
            ReplyEvent::Snapshot(state) => self.delta(&state.accumulated_text),
            ReplyEvent::ThinkingChanged(true) if !self.thinking => {
                self.thinking = true;
                Some(format!("{}", "🤔 Thinking… ".yellow().dimmed()))
            }
            ReplyEvent::ThinkingChanged(thinking) => {
                self.thinking = *thinking;
                None
            }
            ReplyEvent::Completed(message) => {
                let rest = self.delta(&message.text).unwrap_or_default();
                Some(format!("{}\n", rest))
            }
            ReplyEvent::Interrupted { reason } => {
                Some(format!("\n{}\n", format!("⚠ Reply interrupted: {}", reason).red()))
            }
        }
    }

    fn delta(&mut self, text: &str) -> Option<String> {
        // snapshots only grow, so the printed prefix is still there
        let fresh = text.get(self.printed..).unwrap_or_default();
        if fresh.is_empty() {
            return None;
        }
        self.printed = text.len();
        Some(fresh.to_string())
    }
}

/// Print every committed message of a conversation
pub fn print_conversation(conversation: &Conversation, skin: &MadSkin, user_name: &str) {
    if conversation.is_empty() {
        println!("{}", "No messages yet.".dimmed());
        return;
    }
    for message in conversation.iter() {
        match message.role {
            Role::User => {
                println!("{} {}", format!("{}:", user_name).bright_cyan().bold(), message.text);
            }
            Role::Assistant | Role::AssistantProvisional => {
                print!("{} ", "AI:".bright_green().bold());
                println!("{}", skin.term_text(&message.text));
            }
        }
    }
    println!();
}

/// Print the persona menu, marking the active one
pub fn print_personas(active: Option<Persona>) {
    println!("{}", "🎭 Available personas:".bright_cyan().bold());
    println!();
    for (i, persona) in Persona::ALL.iter().enumerate() {
        let key = if persona.key().is_empty() {
            "none"
        } else {
            persona.key()
        };
        let marker = if Some(*persona) == active { "●" } else { " " };
        println!(
            "{} {}. {} ({})",
            marker.bright_green(),
            (i + 1).to_string().bright_yellow(),
            persona.label().bright_green().bold(),
            key.bright_blue()
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidekick_chat::StreamState;
    use sidekick_common::Message;

    fn snapshot(text: &str) -> ReplyEvent {
        ReplyEvent::Snapshot(StreamState {
            accumulated_text: text.to_string(),
            thinking: false,
        })
    }

    #[test]
    fn test_prints_only_new_text() {
        let mut printer = ReplyPrinter::new();
        assert_eq!(printer.render(&snapshot("Hel")).as_deref(), Some("Hel"));
        assert_eq!(printer.render(&snapshot("Hello")).as_deref(), Some("lo"));
        assert_eq!(printer.render(&snapshot("Hello")), None);
        assert_eq!(
            printer.render(&ReplyEvent::Completed(Message::assistant("Hello"))).as_deref(),
            Some("\n")
        );
    }

    #[test]
    fn test_multibyte_deltas() {
        let mut printer = ReplyPrinter::new();
        assert_eq!(printer.render(&snapshot("né")).as_deref(), Some("né"));
        assert_eq!(printer.render(&snapshot("né🙂")).as_deref(), Some("🙂"));
    }

    #[test]
    fn test_thinking_indicator_once() {
        let mut printer = ReplyPrinter::new();
        let first = printer.render(&ReplyEvent::ThinkingChanged(true));
        assert!(first.unwrap().contains("Thinking"));
        assert_eq!(printer.render(&ReplyEvent::ThinkingChanged(true)), None);
        assert_eq!(printer.render(&ReplyEvent::ThinkingChanged(false)), None);
        assert!(printer.render(&ReplyEvent::ThinkingChanged(true)).is_some());
    }

    #[test]
    fn test_completion_prints_unseen_tail() {
        let mut printer = ReplyPrinter::new();
        printer.render(&snapshot("ab"));
        assert_eq!(
            printer.render(&ReplyEvent::Completed(Message::assistant("ab\u{FFFD}"))).as_deref(),
            Some("\u{FFFD}\n")
        );
    }

    #[test]
    fn test_interruption_is_reported() {
        let mut printer = ReplyPrinter::new();
        let out = printer
            .render(&ReplyEvent::Interrupted {
                reason: "connection reset".to_string(),
            })
            .unwrap();
        assert!(out.contains("connection reset"));
    }
}
