//! Configuration module for LLM Voice Chat.
//!
//! Provides the typed [`UnifiedConfig`] with its four sections, the
//! schema validator that aggregates every violation across the resource,
//! and JSON loading via `UnifiedConfig::load` / `load_from`.

pub mod loader;
pub mod settings;
pub mod validator;

pub use loader::{resolve_config_path, ConfigError, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
pub use settings::{
    ModelConfig, ModelSource, PromptConfig, ResponseConfig, SourceTheme, TemplateFormat,
    ThemeConfig, UnifiedConfig, BUILTIN_THEMES, MODEL_SOURCES, TEMPLATE_FORMATS,
};
pub use validator::{
    template_placeholders, validate_model, validate_prompt, validate_response, validate_theme,
    JsonRecord, MismatchKind, Section, ValidationIssue, OPENAI_API_KEY_ENV,
};
