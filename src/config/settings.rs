//! Typed configuration sections and defaults.
//!
//! The unified configuration resource is a single JSON object with four
//! named sections (`model`, `prompt`, `response`, `theme`).  Each section
//! deserialises into one of the structs below; all of them implement
//! `Serialize`, `Deserialize`, `Default`, `Clone` and `PartialEq` so they
//! can be round-tripped through JSON, compared in tests, and fall back to
//! sensible defaults when a section is loaded without validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ModelSource
// ---------------------------------------------------------------------------

/// Selects which text-generation backend handles chat requests.
///
/// | Variant | Wire name  | Endpoint                     | Requires API key |
/// |---------|------------|------------------------------|------------------|
/// | OpenAi  | `"OpenAI"` | api.openai.com (remote)      | Yes              |
/// | Ollama  | `"Ollama"` | localhost:11434 (local)      | No               |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSource {
    /// OpenAI's hosted chat-completions API.
    #[serde(rename = "OpenAI")]
    OpenAi,
    /// Ollama running locally — no authentication required.
    Ollama,
}

impl ModelSource {
    /// The exact identifier used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Ollama => "Ollama",
        }
    }
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::OpenAi
    }
}

/// Accepted values for the `model_source` field.
pub const MODEL_SOURCES: &[&str] = &["OpenAI", "Ollama"];

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Settings for the text-generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `true` for a cloud API, `false` for a locally-hosted model server.
    pub use_remote_model: bool,
    /// Which backend to use.
    pub model_source: ModelSource,
    /// Model identifier sent to the backend (e.g. `"gpt-4o"`, `"llama3.1"`).
    pub model_name: String,
    /// Free-form sampling parameters forwarded to the backend
    /// (`temperature`, `top_p`, …).  Keys are unrestricted.
    pub model_parameters: BTreeMap<String, f64>,
    /// Forward prior conversation turns with each request.
    pub send_chat_history: bool,
    /// Ollama only — attempt GPU-accelerated inference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_gpu: Option<bool>,
    /// Ollama only — number of GPUs to use (must be at least 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_gpu: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            use_remote_model: true,
            model_source: ModelSource::OpenAi,
            model_name: "gpt-4o".into(),
            model_parameters: BTreeMap::from([("temperature".to_string(), 1.0)]),
            send_chat_history: true,
            use_gpu: None,
            num_gpu: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateFormat
// ---------------------------------------------------------------------------

/// Prompt templating dialect.  Only f-string style (`{name}` placeholders,
/// `{{` / `}}` as literal braces) is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateFormat {
    #[serde(rename = "f-string")]
    FString,
}

impl Default for TemplateFormat {
    fn default() -> Self {
        Self::FString
    }
}

/// Accepted values for the `template_format` field.
pub const TEMPLATE_FORMATS: &[&str] = &["f-string"];

// ---------------------------------------------------------------------------
// PromptConfig
// ---------------------------------------------------------------------------

/// Settings for the prompt template applied to every user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Names of the variables the template expects, in order.  Must be
    /// unique and (when `validate_template` is set) symmetric with the
    /// placeholders referenced in `template`.
    pub input_variables: Vec<String>,
    /// The template string, with `{name}` placeholders.
    pub template: String,
    /// Templating dialect; only `"f-string"` is accepted.
    #[serde(default)]
    pub template_format: TemplateFormat,
    /// Reserved — always `null` in practice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_parser: Option<serde_json::Value>,
    /// Variables pre-bound to fixed values; placeholders covered here do
    /// not need to appear in `input_variables`.
    #[serde(default)]
    pub partial_variables: BTreeMap<String, String>,
    /// Check placeholder / input-variable symmetry at load time.
    #[serde(default = "default_validate_template")]
    pub validate_template: bool,
}

fn default_validate_template() -> bool {
    true
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            input_variables: vec!["question".into()],
            template:
                "Answer the following question as directly as you can.\n\nQuestion: {question}"
                    .into(),
            template_format: TemplateFormat::FString,
            output_parser: None,
            partial_variables: BTreeMap::new(),
            validate_template: true,
        }
    }
}

// ---------------------------------------------------------------------------
// ResponseConfig
// ---------------------------------------------------------------------------

/// Settings for response pacing and speech output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Narrate responses through the speech synthesizer.
    pub speak_responses: bool,
    /// Seconds to wait before the response starts streaming.
    pub response_delay_time: f64,
    /// Seconds to pause between each streamed character.
    pub response_stream_lag_time: f64,
    /// System voice to narrate with — `None` picks a platform default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_name: Option<String>,
    /// Speech rate in words per minute (must be at least 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_rate_wpm: Option<u32>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            speak_responses: true,
            response_delay_time: 0.0,
            response_stream_lag_time: 0.1,
            voice_name: None,
            speech_rate_wpm: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SourceTheme
// ---------------------------------------------------------------------------

/// Built-in UI theme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTheme {
    Base,
    Citrus,
    Default,
    Glass,
    Monochrome,
    Ocean,
    Origin,
    Soft,
}

impl SourceTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Citrus => "citrus",
            Self::Default => "default",
            Self::Glass => "glass",
            Self::Monochrome => "monochrome",
            Self::Ocean => "ocean",
            Self::Origin => "origin",
            Self::Soft => "soft",
        }
    }
}

impl Default for SourceTheme {
    fn default() -> Self {
        Self::Soft
    }
}

/// Accepted values for the `source_theme` field.  Must stay in sync with
/// the [`SourceTheme`] serde names (checked by a test below).
pub const BUILTIN_THEMES: &[&str] = &[
    "base",
    "citrus",
    "default",
    "glass",
    "monochrome",
    "ocean",
    "origin",
    "soft",
];

// ---------------------------------------------------------------------------
// ThemeConfig
// ---------------------------------------------------------------------------

/// UI appearance settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Title shown by the UI — falls back to the top-level `app_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    /// Placeholder shown in the empty chat area.
    #[serde(default = "default_placeholder_text")]
    pub chat_placeholder_text: String,
    /// Placeholder shown in the message input box.
    #[serde(default = "default_placeholder_text")]
    pub textbox_placeholder_text: String,
    /// Base theme — one of [`BUILTIN_THEMES`].
    #[serde(default)]
    pub source_theme: SourceTheme,
    /// Load the theme from the HuggingFace Hub instead of a built-in.
    #[serde(default)]
    pub load_theme_from_hf_hub: bool,
    /// Hub theme name — required when `load_theme_from_hf_hub` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hf_hub_theme_name: Option<String>,
    /// Primary colour hue override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_hue: Option<String>,
    /// Font family stack, in preference order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Vec<String>>,
}

fn default_placeholder_text() -> String {
    "Please ask me a question.".into()
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            app_name: None,
            chat_placeholder_text: default_placeholder_text(),
            textbox_placeholder_text: default_placeholder_text(),
            source_theme: SourceTheme::Soft,
            load_theme_from_hf_hub: false,
            hf_hub_theme_name: None,
            primary_hue: None,
            font: None,
        }
    }
}

// ---------------------------------------------------------------------------
// UnifiedConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration — the unified resource with all
/// four sections.
///
/// Constructed once at startup via [`UnifiedConfig::load`] (see the
/// loader module), then passed by reference to the collaborators that
/// need each section: the backend adapter gets `model` and `prompt`, the
/// UI gets `theme`, the speech engine gets `response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedConfig {
    /// Application display name.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Configuration schema version, if the resource declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Text-generation backend settings.
    #[serde(default)]
    pub model: ModelConfig,
    /// Prompt template settings.
    #[serde(default)]
    pub prompt: PromptConfig,
    /// Response pacing / speech settings.
    #[serde(default)]
    pub response: ResponseConfig,
    /// UI theme settings.
    #[serde(default)]
    pub theme: ThemeConfig,
}

pub(crate) fn default_app_name() -> String {
    "LLM Voice Chat".into()
}

impl Default for UnifiedConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            version: None,
            model: ModelConfig::default(),
            prompt: PromptConfig::default(),
            response: ResponseConfig::default(),
            theme: ThemeConfig::default(),
        }
    }
}

impl UnifiedConfig {
    /// The name the UI should display: the theme override when present,
    /// otherwise the top-level `app_name`.
    pub fn display_name(&self) -> &str {
        self.theme.app_name.as_deref().unwrap_or(&self.app_name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = UnifiedConfig::default();

        assert_eq!(cfg.app_name, "LLM Voice Chat");
        assert!(cfg.version.is_none());
        assert_eq!(cfg.model.model_source, ModelSource::OpenAi);
        assert_eq!(cfg.model.model_name, "gpt-4o");
        assert_eq!(cfg.model.model_parameters.get("temperature"), Some(&1.0));
        assert!(cfg.model.send_chat_history);
        assert_eq!(cfg.prompt.input_variables, vec!["question".to_string()]);
        assert!(cfg.prompt.validate_template);
        assert!(cfg.response.speak_responses);
        assert_eq!(cfg.response.response_delay_time, 0.0);
        assert_eq!(cfg.response.response_stream_lag_time, 0.1);
        assert_eq!(cfg.theme.source_theme, SourceTheme::Soft);
        assert!(!cfg.theme.load_theme_from_hf_hub);
    }

    #[test]
    fn model_source_wire_names() {
        assert_eq!(
            serde_json::to_value(ModelSource::OpenAi).unwrap(),
            serde_json::json!("OpenAI")
        );
        assert_eq!(
            serde_json::to_value(ModelSource::Ollama).unwrap(),
            serde_json::json!("Ollama")
        );
        for name in MODEL_SOURCES {
            let parsed: ModelSource =
                serde_json::from_value(serde_json::json!(name)).expect("known source");
            assert_eq!(parsed.as_str(), *name);
        }
    }

    #[test]
    fn template_format_wire_name() {
        assert_eq!(
            serde_json::to_value(TemplateFormat::FString).unwrap(),
            serde_json::json!("f-string")
        );
    }

    /// Every entry of `BUILTIN_THEMES` must deserialise into `SourceTheme`
    /// and serialise back to the same identifier — keeps the validator's
    /// allowed set and the enum from drifting apart.
    #[test]
    fn builtin_themes_match_enum() {
        for name in BUILTIN_THEMES {
            let theme: SourceTheme =
                serde_json::from_value(serde_json::json!(name)).expect("known theme");
            assert_eq!(theme.as_str(), *name);
        }
    }

    #[test]
    fn round_trip_json() {
        let mut original = UnifiedConfig::default();
        original.version = Some("0.1.0".into());
        original.model.model_source = ModelSource::Ollama;
        original.model.use_remote_model = false;
        original.model.model_name = "llama3.1".into();
        original.model.use_gpu = Some(true);
        original.model.num_gpu = Some(1);
        original.response.voice_name = Some("Samantha".into());
        original.response.speech_rate_wpm = Some(180);
        original.theme.font = Some(vec!["Quicksand".into(), "ui-sans-serif".into()]);

        let text = serde_json::to_string_pretty(&original).expect("serialise");
        let loaded: UnifiedConfig = serde_json::from_str(&text).expect("deserialise");

        assert_eq!(original, loaded);
    }

    #[test]
    fn display_name_prefers_theme_override() {
        let mut cfg = UnifiedConfig::default();
        assert_eq!(cfg.display_name(), "LLM Voice Chat");

        cfg.theme.app_name = Some("Lab Assistant".into());
        assert_eq!(cfg.display_name(), "Lab Assistant");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let cfg: UnifiedConfig = serde_json::from_str("{}").expect("empty object");
        assert_eq!(cfg, UnifiedConfig::default());
    }
}
