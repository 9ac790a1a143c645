//! LLM Voice Chat — a configuration-driven chat client.
//!
//! Mediates between a conversational interface and one of two pluggable
//! text-generation backends (OpenAI's cloud API or a local Ollama
//! server), optionally narrating responses through the system speech
//! synthesizer.
//!
//! Everything is driven by a single JSON configuration resource with four
//! sections (`model`, `prompt`, `response`, `theme`); the [`config`]
//! module validates the whole resource up front and reports every problem
//! found in one pass.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use llm_voice_chat::app::ChatApp;
//! use llm_voice_chat::config::UnifiedConfig;
//! use llm_voice_chat::llm::backend_from_config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = UnifiedConfig::load()?;
//!     let backend = Arc::from(backend_from_config(&config.model, None)?);
//!
//!     let mut app = ChatApp::new(config, backend, None);
//!     let answer = app.respond("What is a lifetime in Rust?").await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod llm;
pub mod speech;
