//! LLM module for LLM Voice Chat.
//!
//! This module provides:
//! * [`ChatBackend`] — async trait implemented by all generation backends.
//! * [`OpenAiBackend`] / [`OllamaBackend`] — the two supported providers.
//! * [`backend_from_config`] — picks the backend from a validated
//!   [`ModelConfig`](crate::config::ModelConfig).
//! * [`PromptTemplate`] — f-string template rendering.
//! * [`ChatHistory`] / [`ChatMessage`] — prior conversation turns.
//! * [`BackendError`] / [`TemplateError`] — error variants.

pub mod backend;
pub mod history;
pub mod prompt;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use backend::{backend_from_config, BackendError, ChatBackend, OllamaBackend, OpenAiBackend};
pub use history::{ChatHistory, ChatMessage, Role};
pub use prompt::{PromptTemplate, TemplateError};
