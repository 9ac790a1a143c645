//! Speech synthesis module for LLM Voice Chat.
//!
//! Provides [`SpeechSynth`] (the narration seam) and [`SystemVoice`],
//! which speaks through the platform's synthesizer command.

pub mod voice;

pub use voice::{SpeechError, SpeechSynth, SystemVoice, DEFAULT_SPEECH_RATE_WPM};
