//! System speech synthesis via the platform narrator command.
//!
//! [`SystemVoice`] shells out to `say` on macOS, `espeak` on Linux and the
//! SAPI synthesizer (through PowerShell) on Windows.  Voice selection and
//! speech rate come from the response configuration, with the platform
//! defaults the original desktop narrators use.
//!
//! Platform-specific defaults:
//! - Windows: "Microsoft David Desktop - English (United States)"
//! - macOS:   "Samantha"
//! - Linux:   first available system voice

use std::process::Command;

use thiserror::Error;

use crate::config::settings::ResponseConfig;

/// Default speech rate in words per minute.
pub const DEFAULT_SPEECH_RATE_WPM: u32 = 180;

const DEFAULT_WINDOWS_VOICE: &str = "Microsoft David Desktop - English (United States)";
const DEFAULT_MAC_OS_VOICE: &str = "Samantha";

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// Errors that can occur while narrating a response.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// The narrator command could not be started.
    #[error("speech command failed to start: {0}")]
    Spawn(String),

    /// The narrator command ran but exited unsuccessfully.
    #[error("speech command exited with {0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// SpeechSynth trait
// ---------------------------------------------------------------------------

/// Trait for speech output.
///
/// Implementors must be `Send + Sync` so a narrator can be handed to a
/// background task while the response streams to the UI.
pub trait SpeechSynth: Send + Sync {
    /// Speak `text` aloud, blocking until narration completes.
    fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

// ---------------------------------------------------------------------------
// SystemVoice
// ---------------------------------------------------------------------------

/// Narrates through the operating system's speech synthesizer.
pub struct SystemVoice {
    voice_name: Option<String>,
    rate_wpm: u32,
}

impl SystemVoice {
    /// Build a narrator from the response configuration, falling back to
    /// the platform default voice and rate.
    pub fn from_config(config: &ResponseConfig) -> Self {
        Self {
            voice_name: config.voice_name.clone().or_else(platform_default_voice),
            rate_wpm: config.speech_rate_wpm.unwrap_or(DEFAULT_SPEECH_RATE_WPM),
        }
    }

    /// The voice that will narrate, if one is selected.
    pub fn voice_name(&self) -> Option<&str> {
        self.voice_name.as_deref()
    }

    /// The speech rate in words per minute.
    pub fn rate_wpm(&self) -> u32 {
        self.rate_wpm
    }

    fn narrator_command(&self, text: &str) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("say");
            cmd.arg("-r").arg(self.rate_wpm.to_string());
            if let Some(voice) = &self.voice_name {
                cmd.arg("-v").arg(voice);
            }
            cmd.arg(text);
            cmd
        } else if cfg!(target_os = "windows") {
            let voice = self
                .voice_name
                .as_deref()
                .unwrap_or(DEFAULT_WINDOWS_VOICE)
                .replace('\'', "''");
            // SAPI rate runs -10..10 around ~180 wpm.
            let rate = ((self.rate_wpm as i64 - 180) / 20).clamp(-10, 10);
            let script = format!(
                "Add-Type -AssemblyName System.Speech; \
                 $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                 try {{ $s.SelectVoice('{voice}') }} catch {{ }}; \
                 $s.Rate = {rate}; \
                 $s.Speak([Console]::In.ReadToEnd())"
            );
            let mut cmd = Command::new("powershell");
            cmd.arg("-NoProfile").arg("-Command").arg(script);
            cmd.stdin(std::process::Stdio::piped());
            cmd
        } else {
            let mut cmd = Command::new("espeak");
            cmd.arg("-s").arg(self.rate_wpm.to_string());
            if let Some(voice) = &self.voice_name {
                cmd.arg("-v").arg(voice);
            }
            cmd.arg(text);
            cmd
        }
    }
}

impl SpeechSynth for SystemVoice {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let mut command = self.narrator_command(text);

        let mut child = command
            .spawn()
            .map_err(|e| SpeechError::Spawn(e.to_string()))?;

        // Windows reads the text from stdin to avoid quoting issues.
        if cfg!(target_os = "windows") {
            use std::io::Write;
            if let Some(stdin) = child.stdin.as_mut() {
                stdin
                    .write_all(text.as_bytes())
                    .map_err(|e| SpeechError::Spawn(e.to_string()))?;
            }
        }

        let status = child
            .wait()
            .map_err(|e| SpeechError::Spawn(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(SpeechError::Failed(status.to_string()))
        }
    }
}

fn platform_default_voice() -> Option<String> {
    if cfg!(target_os = "macos") {
        Some(DEFAULT_MAC_OS_VOICE.into())
    } else if cfg!(target_os = "windows") {
        Some(DEFAULT_WINDOWS_VOICE.into())
    } else {
        // Linux: let espeak pick its default voice.
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_voice_and_rate_win_over_defaults() {
        let config = ResponseConfig {
            voice_name: Some("Daniel".into()),
            speech_rate_wpm: Some(140),
            ..ResponseConfig::default()
        };
        let voice = SystemVoice::from_config(&config);

        assert_eq!(voice.voice_name(), Some("Daniel"));
        assert_eq!(voice.rate_wpm(), 140);
    }

    #[test]
    fn missing_rate_falls_back_to_default() {
        let voice = SystemVoice::from_config(&ResponseConfig::default());
        assert_eq!(voice.rate_wpm(), DEFAULT_SPEECH_RATE_WPM);
    }

    #[test]
    fn platform_default_voice_is_stable() {
        // Same result on every call; actual value is platform-dependent.
        assert_eq!(platform_default_voice(), platform_default_voice());
    }

    /// SystemVoice must be usable as `dyn SpeechSynth`.
    #[test]
    fn narrator_is_object_safe() {
        let voice = SystemVoice::from_config(&ResponseConfig::default());
        let _: Box<dyn SpeechSynth> = Box::new(voice);
    }
}
