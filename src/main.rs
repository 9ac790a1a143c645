//! Application entry point — LLM Voice Chat.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`APP_LOG_LEVEL`, default `info`).
//! 2. Load and validate [`UnifiedConfig`] (`CONFIG_PATH` or the default
//!    resource).  On validation failure, print every aggregated error —
//!    one per line, prefixed with its section name — and exit non-zero.
//! 3. Create the tokio runtime.
//! 4. Build the chat backend from the model configuration.
//! 5. Build the narrator when speech is enabled.
//! 6. Run the stdin/stdout chat loop, streaming each answer
//!    character-by-character with the configured lag.

use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use llm_voice_chat::{
    app::ChatApp,
    config::{ConfigError, UnifiedConfig, OPENAI_API_KEY_ENV},
    llm::backend_from_config,
    speech::{SpeechSynth, SystemVoice},
};

fn main() -> ExitCode {
    // 1. Logging
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("APP_LOG_LEVEL", "info"),
    )
    .init();
    log::info!("LLM Voice Chat starting up");

    // 2. Configuration — misconfiguration is fatal, with the full listing.
    let config = match UnifiedConfig::load() {
        Ok(config) => config,
        Err(ConfigError::Validation { issues }) => {
            eprintln!("Configuration validation failed:");
            for issue in &issues {
                eprintln!("{}: {}", issue.section(), issue);
            }
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // 3. Tokio runtime (backend requests + narration tasks)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Chat backend
    let api_key = std::env::var(OPENAI_API_KEY_ENV).ok();
    let backend = match backend_from_config(&config.model, api_key) {
        Ok(backend) => Arc::from(backend),
        Err(e) => {
            eprintln!("model: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 5. Narrator
    let speaker: Option<Arc<dyn SpeechSynth>> = if config.response.speak_responses {
        Some(Arc::new(SystemVoice::from_config(&config.response)))
    } else {
        None
    };

    // 6. Chat loop
    let lag = Duration::from_secs_f64(config.response.response_stream_lag_time);
    let banner = config.display_name().to_string();
    let hint = config.theme.textbox_placeholder_text.clone();
    let mut app = ChatApp::new(config, backend, speaker);

    println!("{banner}");
    println!("{hint}  (type 'exit' to quit)");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                log::error!("failed to read input: {e}");
                break;
            }
            None => break, // EOF
        };

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "exit" || message == "quit" {
            break;
        }

        match rt.block_on(app.respond(message)) {
            Ok(answer) => {
                stream_answer(&answer, lag);
                rt.block_on(app.finish_narration());
            }
            Err(e) => {
                log::error!("exchange failed: {e:#}");
                eprintln!("error: {e:#}");
            }
        }
    }

    log::info!("LLM Voice Chat shutting down");
    ExitCode::SUCCESS
}

/// Print the answer character-by-character with the configured lag, the
/// way the chat UI streams a response.
fn stream_answer(answer: &str, lag: Duration) {
    for c in answer.chars() {
        print!("{c}");
        let _ = std::io::stdout().flush();
        if !lag.is_zero() {
            std::thread::sleep(lag);
        }
    }
    println!();
}
