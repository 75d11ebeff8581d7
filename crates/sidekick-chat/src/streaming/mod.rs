//! Streaming reply handling
//!
//! Bytes from the backend are decoded incrementally, split into sentinel
//! and content chunks, and turned into [`ReplyEvent`]s for the chat layer.

pub mod assembler;
pub mod decoder;
pub mod reply;

// Re-export key types for convenience
pub use assembler::{ChunkOutcome, StreamState, StreamingReplyAssembler};
pub use decoder::Utf8StreamDecoder;
pub use reply::{ReplyAssembly, ReplyEvent, ReplyStream, StreamConfig};
