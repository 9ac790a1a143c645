//! Unified configuration loading.
//!
//! Resolves the resource path (explicit argument, then the `CONFIG_PATH`
//! environment variable, then a well-known relative default), reads it as
//! JSON, validates all four sections, and either returns an immutable
//! [`UnifiedConfig`] or fails with every aggregated error.
//!
//! A missing or unreadable file and malformed JSON are fatal immediately —
//! no sections can be extracted.  Everything else (missing sections, field
//! violations) is collected across the whole resource and surfaced as one
//! [`ConfigError::Validation`], so a misconfigured startup prints the full
//! list of problems instead of the first one.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::settings::{default_app_name, UnifiedConfig};
use super::validator::{
    self, JsonRecord, Section, ValidationIssue, OPENAI_API_KEY_ENV,
};

/// Environment variable overriding the configuration resource location.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Fallback path when neither an explicit path nor `CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/app_config.json";

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced while acquiring the unified configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The resource does not exist or could not be read.
    #[error("configuration file not found: {path}")]
    NotFound { path: String },

    /// The resource is not well-formed JSON.  The reason carries the
    /// parser's line/column position when available.
    #[error("failed to parse configuration file '{path}': {reason}")]
    Parse { path: String, reason: String },

    /// One or more sections failed validation.  Every issue found across
    /// all sections is listed; callers can enumerate them via `issues`.
    #[error("configuration validation failed with {} error(s)", .issues.len())]
    Validation { issues: Vec<ValidationIssue> },
}

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

/// Resolve the configuration resource path: explicit argument first, then
/// `CONFIG_PATH`, then [`DEFAULT_CONFIG_PATH`].
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| {
            env::var(CONFIG_PATH_ENV)
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl UnifiedConfig {
    /// Load and validate the configuration from the resolved default
    /// location (`CONFIG_PATH` or [`DEFAULT_CONFIG_PATH`]).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&resolve_config_path(None))
    }

    /// Load and validate the configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        load_impl(path, true, resolve_api_key())
    }

    /// Load from an explicit path without failing on validation issues.
    ///
    /// Intended for harnesses that want to inspect a partially invalid
    /// object: sections that are missing or do not deserialise fall back
    /// to their defaults.  `ConfigNotFound` and parse failures are still
    /// fatal — there is nothing to construct from an unreadable resource.
    pub fn load_from_unvalidated(path: &Path) -> Result<Self, ConfigError> {
        load_impl(path, false, resolve_api_key())
    }
}

fn resolve_api_key() -> Option<String> {
    env::var(OPENAI_API_KEY_ENV).ok()
}

fn load_impl(
    path: &Path,
    validate: bool,
    api_key: Option<String>,
) -> Result<UnifiedConfig, ConfigError> {
    let display = path.display().to_string();

    let content = fs::read_to_string(path).map_err(|_| ConfigError::NotFound {
        path: display.clone(),
    })?;

    let root: Value = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    let root = root.as_object().ok_or_else(|| ConfigError::Parse {
        path: display.clone(),
        reason: "top-level value must be a JSON object".into(),
    })?;

    let mut issues = Vec::new();

    let model = take_section(root, Section::Model, &mut issues);
    let prompt = take_section(root, Section::Prompt, &mut issues);
    let response = take_section(root, Section::Response, &mut issues);
    let theme = take_section(root, Section::Theme, &mut issues);

    if let Some(record) = &model {
        issues.extend(validator::validate_model(record, api_key.as_deref()));
    }
    if let Some(record) = &prompt {
        issues.extend(validator::validate_prompt(record));
    }
    if let Some(record) = &response {
        issues.extend(validator::validate_response(record));
    }
    if let Some(record) = &theme {
        issues.extend(validator::validate_theme(record));
    }

    if validate && !issues.is_empty() {
        log::error!(
            "configuration '{display}' failed validation with {} issue(s)",
            issues.len()
        );
        return Err(ConfigError::Validation { issues });
    }

    let config = UnifiedConfig {
        app_name: root
            .get("app_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(default_app_name),
        version: root
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string),
        model: typed_section(&display, Section::Model, model, validate)?,
        prompt: typed_section(&display, Section::Prompt, prompt, validate)?,
        response: typed_section(&display, Section::Response, response, validate)?,
        theme: typed_section(&display, Section::Theme, theme, validate)?,
    };

    log::info!(
        "loaded configuration '{display}' (model: {} via {})",
        config.model.model_name,
        config.model.model_source.as_str()
    );

    Ok(config)
}

/// Extract a named section as a record.  Absence is a collected
/// `MissingSection` issue, not a fatal error — validation of the other
/// sections continues.
fn take_section(
    root: &serde_json::Map<String, Value>,
    section: Section,
    issues: &mut Vec<ValidationIssue>,
) -> Option<JsonRecord> {
    match root.get(section.as_str()) {
        Some(Value::Object(record)) => Some(record.clone()),
        Some(other) => {
            issues.push(ValidationIssue::TypeMismatch {
                section,
                field: section.as_str().into(),
                expected: "an object",
                actual: validator::value_type(other).into(),
            });
            None
        }
        None => {
            issues.push(ValidationIssue::MissingSection(section));
            None
        }
    }
}

/// Deserialise a section into its typed struct.
///
/// On the validated path a record that somehow does not fit the typed
/// struct is a hard error — the returned config must reflect the
/// resource, never a silently substituted default.  Only the unvalidated
/// path falls back to the section default.
fn typed_section<T: DeserializeOwned + Default>(
    path: &str,
    section: Section,
    record: Option<JsonRecord>,
    strict: bool,
) -> Result<T, ConfigError> {
    let record = match record {
        Some(record) => record,
        None => return Ok(T::default()),
    };
    match serde_json::from_value(Value::Object(record)) {
        Ok(typed) => Ok(typed),
        Err(e) if strict => Err(ConfigError::Parse {
            path: path.into(),
            reason: format!("section '{section}': {e}"),
        }),
        Err(_) => Ok(T::default()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
