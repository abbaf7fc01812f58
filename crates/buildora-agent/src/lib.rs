//! # buildora-agent
//!
//! Streaming code generation for Buildora.
//!
//! One submitted instruction becomes one [`GenerationSession`]:
//! - [`GenerationClient`] opens a streaming chat-completions request
//! - [`FrameDecoder`] reassembles `data:` frames split across network reads
//! - [`LineBuffer`] turns delta text into display lines for the session log
//! - [`extract()`] splits the finished text at `=== name ===` marker lines
//!
//! The assistant flow keeps a [`Conversation`] whose prior turns are sent
//! ahead of every new instruction.
//!
//! ## Key Pattern
//!
//! Extraction never touches a project. The caller applies
//! [`ExtractedFileSet::updates`] through `ProjectGraph::apply_updates`, or falls
//! back to [`fallback_text`] for the file under edit when no marker was found.

mod client;
mod conversation;
pub mod extract;
mod frames;
pub mod prompt;
mod session;
mod types;

pub use client::GenerationClient;
pub use conversation::Conversation;
pub use extract::{
    extract, fallback_text, sanitize_project_name, ExtractedFile, ExtractedFileSet, PROJECT_FILES,
    PROJECT_NAME,
};
pub use frames::{Frame, FrameDecoder, LineBuffer};
pub use session::{transition, GenerationSession, SessionEvent, SessionState};
pub use types::*;
