//! Chat application orchestration.
//!
//! [`ChatApp`] owns the validated configuration and the collaborators
//! built from it (backend, prompt template, narrator, history) and drives
//! one exchange per [`ChatApp::respond`] call:
//!
//! 1. Render the prompt template with the user's message.
//! 2. Send it to the backend, with prior turns when history is enabled.
//! 3. Wait the configured response delay.
//! 4. Start narration in the background when speech is enabled.
//! 5. Record the turn and hand the answer back to the UI for streaming.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::UnifiedConfig;
use crate::llm::{ChatBackend, ChatHistory, PromptTemplate};
use crate::speech::SpeechSynth;

// ---------------------------------------------------------------------------
// ChatApp
// ---------------------------------------------------------------------------

/// One running chat session.
pub struct ChatApp {
    config: UnifiedConfig,
    template: PromptTemplate,
    backend: Arc<dyn ChatBackend>,
    speaker: Option<Arc<dyn SpeechSynth>>,
    history: ChatHistory,
    narration: Option<tokio::task::JoinHandle<()>>,
}

impl ChatApp {
    /// Wire a session from a validated configuration and its
    /// collaborators.  `speaker` is only consulted when the response
    /// configuration enables speech.
    pub fn new(
        config: UnifiedConfig,
        backend: Arc<dyn ChatBackend>,
        speaker: Option<Arc<dyn SpeechSynth>>,
    ) -> Self {
        let template = PromptTemplate::from_config(&config.prompt);
        Self {
            config,
            template,
            backend,
            speaker,
            history: ChatHistory::new(),
            narration: None,
        }
    }

    /// The configuration this session runs with.
    pub fn config(&self) -> &UnifiedConfig {
        &self.config
    }

    /// The conversation so far.
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Per-character pause for streaming the answer to the UI.
    pub fn stream_lag(&self) -> Duration {
        Duration::from_secs_f64(self.config.response.response_stream_lag_time)
    }

    /// Run one exchange and return the assistant's answer.
    pub async fn respond(&mut self, user_input: &str) -> Result<String> {
        let prompt = self
            .template
            .render_primary(user_input)
            .context("failed to render prompt template")?;

        let history = if self.config.model.send_chat_history {
            self.history.messages()
        } else {
            &[]
        };

        let answer = self
            .backend
            .generate(&prompt, history)
            .await
            .context("backend request failed")?;

        let delay = self.config.response.response_delay_time;
        if delay > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }

        self.history.push_user(user_input);
        self.history.push_assistant(&answer);

        if self.config.response.speak_responses {
            if let Some(speaker) = self.speaker.clone() {
                // One narration at a time: wait out the previous answer
                // before this one starts speaking.
                self.finish_narration().await;
                let text = answer.clone();
                self.narration = Some(tokio::task::spawn_blocking(move || {
                    if let Err(e) = speaker.speak(&text) {
                        log::warn!("speech synthesis failed: {e}");
                    }
                }));
            }
        }

        Ok(answer)
    }

    /// Wait for any in-flight narration, so consecutive answers do not
    /// talk over each other.
    pub async fn finish_narration(&mut self) {
        if let Some(handle) = self.narration.take() {
            if let Err(e) = handle.await {
                log::warn!("narration task failed: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{BackendError, ChatMessage};
    use crate::speech::SpeechError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Replies with a fixed answer and records the history length seen.
    struct EchoBackend {
        reply: String,
        seen_history_len: Mutex<Vec<usize>>,
        seen_prompts: Mutex<Vec<String>>,
    }

    impl EchoBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.into(),
                seen_history_len: Mutex::new(Vec::new()),
                seen_prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn generate(
            &self,
            prompt: &str,
            history: &[ChatMessage],
        ) -> Result<String, BackendError> {
            self.seen_history_len.lock().unwrap().push(history.len());
            self.seen_prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl ChatBackend for FailingBackend {
        async fn generate(&self, _: &str, _: &[ChatMessage]) -> Result<String, BackendError> {
            Err(BackendError::Request("connection refused".into()))
        }
    }

    /// Records everything it is asked to speak.
    struct RecordingSpeaker {
        spoken: Mutex<Vec<String>>,
    }

    impl RecordingSpeaker {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                spoken: Mutex::new(Vec::new()),
            })
        }
    }

    impl SpeechSynth for RecordingSpeaker {
        fn speak(&self, text: &str) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn quiet_config() -> UnifiedConfig {
        let mut config = UnifiedConfig::default();
        config.response.speak_responses = false;
        config.response.response_delay_time = 0.0;
        config
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn respond_returns_answer_and_records_history() {
        let backend = EchoBackend::new("the answer");
        let mut app = ChatApp::new(quiet_config(), backend.clone(), None);

        let answer = app.respond("a question").await.unwrap();
        assert_eq!(answer, "the answer");
        assert_eq!(app.history().len(), 2);
        assert_eq!(app.history().messages()[0], ChatMessage::user("a question"));
        assert_eq!(
            app.history().messages()[1],
            ChatMessage::assistant("the answer")
        );
    }

    #[tokio::test]
    async fn prompt_is_rendered_through_template() {
        let backend = EchoBackend::new("ok");
        let mut config = quiet_config();
        config.prompt.template = "Q: {question}".into();
        let mut app = ChatApp::new(config, backend.clone(), None);

        app.respond("why?").await.unwrap();
        assert_eq!(
            backend.seen_prompts.lock().unwrap().as_slice(),
            &["Q: why?".to_string()]
        );
    }

    #[tokio::test]
    async fn history_forwarded_only_when_enabled() {
        let backend = EchoBackend::new("ok");
        let mut config = quiet_config();
        config.model.send_chat_history = true;
        let mut app = ChatApp::new(config, backend.clone(), None);

        app.respond("first").await.unwrap();
        app.respond("second").await.unwrap();
        // Second call sees the two turns recorded by the first.
        assert_eq!(backend.seen_history_len.lock().unwrap().as_slice(), &[0, 2]);

        let backend = EchoBackend::new("ok");
        let mut config = quiet_config();
        config.model.send_chat_history = false;
        let mut app = ChatApp::new(config, backend.clone(), None);

        app.respond("first").await.unwrap();
        app.respond("second").await.unwrap();
        assert_eq!(backend.seen_history_len.lock().unwrap().as_slice(), &[0, 0]);
    }

    #[tokio::test]
    async fn speech_runs_when_enabled() {
        let backend = EchoBackend::new("spoken answer");
        let speaker = RecordingSpeaker::new();
        let mut config = quiet_config();
        config.response.speak_responses = true;
        let mut app = ChatApp::new(config, backend, Some(speaker.clone()));

        app.respond("question").await.unwrap();
        app.finish_narration().await;

        assert_eq!(
            speaker.spoken.lock().unwrap().as_slice(),
            &["spoken answer".to_string()]
        );
    }

    #[tokio::test]
    async fn speech_skipped_when_disabled() {
        let backend = EchoBackend::new("quiet answer");
        let speaker = RecordingSpeaker::new();
        let mut app = ChatApp::new(quiet_config(), backend, Some(speaker.clone()));

        app.respond("question").await.unwrap();
        app.finish_narration().await;

        assert!(speaker.spoken.lock().unwrap().is_empty());
    }

    /// Flags any overlapping speak calls while recording what was spoken.
    struct SlowSpeaker {
        spoken: Mutex<Vec<String>>,
        in_flight: AtomicBool,
        overlapped: AtomicBool,
    }

    impl SlowSpeaker {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                spoken: Mutex::new(Vec::new()),
                in_flight: AtomicBool::new(false),
                overlapped: AtomicBool::new(false),
            })
        }
    }

    impl SpeechSynth for SlowSpeaker {
        fn speak(&self, text: &str) -> Result<(), SpeechError> {
            if self.in_flight.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(25));
            self.spoken.lock().unwrap().push(text.to_string());
            self.in_flight.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn consecutive_narrations_do_not_overlap() {
        let backend = EchoBackend::new("an answer");
        let speaker = SlowSpeaker::new();
        let mut config = quiet_config();
        config.response.speak_responses = true;
        let mut app = ChatApp::new(config, backend, Some(speaker.clone()));

        app.respond("one").await.unwrap();
        app.respond("two").await.unwrap();
        app.finish_narration().await;

        assert!(!speaker.overlapped.load(Ordering::SeqCst));
        assert_eq!(speaker.spoken.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn backend_failure_leaves_history_untouched() {
        let mut app = ChatApp::new(quiet_config(), Arc::new(FailingBackend), None);

        assert!(app.respond("question").await.is_err());
        assert!(app.history().is_empty());
    }

    #[test]
    fn stream_lag_comes_from_config() {
        let mut config = quiet_config();
        config.response.response_stream_lag_time = 0.25;
        let app = ChatApp::new(config, EchoBackend::new("x"), None);
        assert_eq!(app.stream_lag(), Duration::from_millis(250));
    }
}
