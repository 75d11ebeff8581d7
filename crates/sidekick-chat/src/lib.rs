//! Streaming chat client for Sidekick
//!
//! This crate turns a chat backend's plain-text streaming replies into
//! conversation updates, and wraps the backend's chat, history and auth
//! endpoints together with the persisted session they depend on.

pub mod chat;
pub mod client;
pub mod conversation;
pub mod session;
pub mod streaming;

// Re-export key types for convenience
pub use chat::ChatSession;
pub use client::{BackendClient, ChatBackend, ChatRequest, LoginResponse, RegisteredUser};
pub use conversation::Conversation;
pub use session::{AuthGuard, Session, SessionStore};
pub use streaming::{
    ChunkOutcome, ReplyAssembly, ReplyEvent, ReplyStream, StreamConfig, StreamState,
    StreamingReplyAssembler, Utf8StreamDecoder,
};
