//! Model client layer.
//!
//! `ChatModel` is the seam for the external classification/generation
//! collaborator; `ChatClient` is the bundled OpenAI-format implementation.

pub mod client;
pub mod types;

pub use client::{ChatClient, ChatModel, CompletionOptions};
pub use types::{ChatMessage, ChatRole};
