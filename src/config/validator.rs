//! Schema validation for the four configuration sections.
//!
//! Each `validate_*` function takes one parsed section as a generic JSON
//! record and returns the complete list of violations found — it never
//! stops at the first problem, so a caller can surface every actionable
//! error in one pass.  An empty list means the section is valid.
//!
//! The functions are pure: no I/O, no environment reads.  The one
//! environment-dependent rule (the OpenAI API key) takes the resolved key
//! as an argument so the loader owns the lookup and tests stay hermetic.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use super::settings::{BUILTIN_THEMES, MODEL_SOURCES, TEMPLATE_FORMATS};

/// A parsed-but-untyped configuration section.
pub type JsonRecord = Map<String, Value>;

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// The four named configuration sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Model,
    Prompt,
    Response,
    Theme,
}

impl Section {
    /// The key under which the section appears in the unified resource.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Prompt => "prompt",
            Self::Response => "response",
            Self::Theme => "theme",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ValidationIssue
// ---------------------------------------------------------------------------

/// Which side of the template / input-variable symmetry check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// Declared in `input_variables` but never referenced by the template.
    MissingInTemplate,
    /// Referenced by the template but not declared in `input_variables`.
    MissingInDeclaration,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInTemplate => f.write_str("declared but never used in template"),
            Self::MissingInDeclaration => {
                f.write_str("used in template but missing from input_variables")
            }
        }
    }
}

/// One structured validation error, naming the offending section, field
/// and reason.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationIssue {
    /// A whole section is absent from the unified resource.
    #[error("missing section '{0}'")]
    MissingSection(Section),

    /// A required field is absent.
    #[error("missing required field '{field}'")]
    MissingField { section: Section, field: String },

    /// A present value has the wrong shape.
    #[error("'{field}' must be {expected}, got {actual}")]
    TypeMismatch {
        section: Section,
        field: String,
        expected: &'static str,
        actual: String,
    },

    /// A present value is outside its allowed set.
    #[error("invalid value for '{field}': {actual}{}", format_allowed(.allowed))]
    InvalidValue {
        section: Section,
        field: String,
        actual: String,
        allowed: Vec<String>,
    },

    /// A required credential could not be resolved from the environment.
    #[error("{variable} environment variable is required for OpenAI models")]
    MissingCredential { variable: &'static str },

    /// Template placeholders and declared input variables disagree.
    #[error("template variable mismatch ({kind}): {}", .names.join(", "))]
    TemplateVariableMismatch {
        kind: MismatchKind,
        names: Vec<String>,
    },

    /// A numeric value is outside its valid range.
    #[error("'{field}' must be {constraint}, got {actual}")]
    RangeViolation {
        section: Section,
        field: String,
        constraint: &'static str,
        actual: String,
    },
}

fn format_allowed(allowed: &[String]) -> String {
    if allowed.is_empty() {
        String::new()
    } else {
        format!(" (allowed: {})", allowed.join(", "))
    }
}

impl ValidationIssue {
    /// The section this issue belongs to — used to prefix the printed
    /// error listing.
    pub fn section(&self) -> Section {
        match self {
            Self::MissingSection(section) => *section,
            Self::MissingField { section, .. }
            | Self::TypeMismatch { section, .. }
            | Self::InvalidValue { section, .. }
            | Self::RangeViolation { section, .. } => *section,
            Self::MissingCredential { .. } => Section::Model,
            Self::TemplateVariableMismatch { .. } => Section::Prompt,
        }
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Human-readable name of a JSON value's type, for error messages.
pub(crate) fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fetch `field`, treating an absent key and an explicit `null` alike for
/// optional fields.  Pushes `MissingField` when a required field is absent.
fn fetch<'a>(
    record: &'a JsonRecord,
    section: Section,
    field: &str,
    required: bool,
    issues: &mut Vec<ValidationIssue>,
) -> Option<&'a Value> {
    match record.get(field) {
        Some(value) if !value.is_null() => Some(value),
        Some(_) | None => {
            if required {
                issues.push(ValidationIssue::MissingField {
                    section,
                    field: field.into(),
                });
            }
            None
        }
    }
}

fn push_type_mismatch(
    issues: &mut Vec<ValidationIssue>,
    section: Section,
    field: &str,
    expected: &'static str,
    value: &Value,
) {
    issues.push(ValidationIssue::TypeMismatch {
        section,
        field: field.into(),
        expected,
        actual: value_type(value).into(),
    });
}

fn check_bool(
    record: &JsonRecord,
    section: Section,
    field: &str,
    required: bool,
    issues: &mut Vec<ValidationIssue>,
) -> Option<bool> {
    let value = fetch(record, section, field, required, issues)?;
    match value.as_bool() {
        Some(b) => Some(b),
        None => {
            push_type_mismatch(issues, section, field, "a boolean", value);
            None
        }
    }
}

fn check_string<'a>(
    record: &'a JsonRecord,
    section: Section,
    field: &str,
    required: bool,
    issues: &mut Vec<ValidationIssue>,
) -> Option<&'a str> {
    let value = fetch(record, section, field, required, issues)?;
    match value.as_str() {
        Some(s) => Some(s),
        None => {
            push_type_mismatch(issues, section, field, "a string", value);
            None
        }
    }
}

fn check_number(
    record: &JsonRecord,
    section: Section,
    field: &str,
    required: bool,
    issues: &mut Vec<ValidationIssue>,
) -> Option<f64> {
    let value = fetch(record, section, field, required, issues)?;
    match value.as_f64() {
        Some(n) => Some(n),
        None => {
            push_type_mismatch(issues, section, field, "a number", value);
            None
        }
    }
}

fn check_integer(
    record: &JsonRecord,
    section: Section,
    field: &str,
    required: bool,
    issues: &mut Vec<ValidationIssue>,
) -> Option<i64> {
    let value = fetch(record, section, field, required, issues)?;
    match value.as_i64() {
        Some(n) => Some(n),
        None => {
            push_type_mismatch(issues, section, field, "an integer", value);
            None
        }
    }
}

/// Check that a value (if present) is an array of strings; returns the
/// strings while still reporting each badly-typed element.
fn check_string_array<'a>(
    record: &'a JsonRecord,
    section: Section,
    field: &str,
    required: bool,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Vec<&'a str>> {
    let value = fetch(record, section, field, required, issues)?;
    let items = match value.as_array() {
        Some(items) => items,
        None => {
            push_type_mismatch(issues, section, field, "an array of strings", value);
            return None;
        }
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) => out.push(s),
            None => push_type_mismatch(
                issues,
                section,
                &format!("{field}[{i}]"),
                "a string",
                item,
            ),
        }
    }
    Some(out)
}

fn check_membership(
    section: Section,
    field: &str,
    value: &str,
    allowed: &[&str],
    issues: &mut Vec<ValidationIssue>,
) -> bool {
    if allowed.contains(&value) {
        true
    } else {
        issues.push(ValidationIssue::InvalidValue {
            section,
            field: field.into(),
            actual: format!("'{value}'"),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        });
        false
    }
}

// ---------------------------------------------------------------------------
// Template placeholder extraction
// ---------------------------------------------------------------------------

/// Extract the set of `{identifier}` placeholder names from a template.
///
/// f-string escaping rules apply: `{{` and `}}` are literal braces, so
/// `{{name}}` contributes nothing to the set.  Tokens whose contents are
/// not a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`) are ignored, as is a
/// `{` that never closes.
pub fn template_placeholders(template: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next(); // literal '{'
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                while let Some(&next) = chars.peek() {
                    if next == '}' {
                        chars.next();
                        closed = true;
                        break;
                    }
                    if next == '{' {
                        break; // malformed — rescan from the inner brace
                    }
                    name.push(next);
                    chars.next();
                }
                if closed && is_identifier(&name) {
                    names.insert(name);
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next(); // literal '}'
            }
            _ => {}
        }
    }
    names
}

/// A plain placeholder name: `[A-Za-z_][A-Za-z0-9_]*`.  Shared with the
/// template renderer so both sides agree on what counts as a placeholder.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Section validators
// ---------------------------------------------------------------------------

/// Validate the `model` section.
///
/// `api_key` is the resolved `OPENAI_API_KEY` value (if any); it is only
/// consulted when `model_source` is `"OpenAI"`.
pub fn validate_model(record: &JsonRecord, api_key: Option<&str>) -> Vec<ValidationIssue> {
    let section = Section::Model;
    let mut issues = Vec::new();

    check_bool(record, section, "use_remote_model", true, &mut issues);

    let source = check_string(record, section, "model_source", true, &mut issues)
        .filter(|s| check_membership(section, "model_source", s, MODEL_SOURCES, &mut issues));

    if let Some(name) = check_string(record, section, "model_name", true, &mut issues) {
        if name.is_empty() {
            issues.push(ValidationIssue::TypeMismatch {
                section,
                field: "model_name".into(),
                expected: "a non-empty string",
                actual: "an empty string".into(),
            });
        }
    }

    if let Some(value) = fetch(record, section, "model_parameters", true, &mut issues) {
        match value.as_object() {
            Some(params) => {
                for (key, param) in params {
                    if !param.is_number() {
                        push_type_mismatch(
                            &mut issues,
                            section,
                            &format!("model_parameters.{key}"),
                            "a number",
                            param,
                        );
                    }
                }
            }
            None => push_type_mismatch(&mut issues, section, "model_parameters", "an object", value),
        }
    }

    check_bool(record, section, "send_chat_history", true, &mut issues);
    check_bool(record, section, "use_gpu", false, &mut issues);

    if let Some(n) = check_integer(record, section, "num_gpu", false, &mut issues) {
        if n < 1 {
            issues.push(ValidationIssue::RangeViolation {
                section,
                field: "num_gpu".into(),
                constraint: "at least 1",
                actual: n.to_string(),
            });
        } else if n > i64::from(u32::MAX) {
            issues.push(ValidationIssue::RangeViolation {
                section,
                field: "num_gpu".into(),
                constraint: "at most 4294967295",
                actual: n.to_string(),
            });
        }
    }

    // Cross-field: a remote OpenAI backend needs a resolvable API key.
    // Ollama runs locally and is exempt.
    if source == Some("OpenAI") && api_key.map_or(true, |k| k.trim().is_empty()) {
        issues.push(ValidationIssue::MissingCredential {
            variable: OPENAI_API_KEY_ENV,
        });
    }

    issues
}

/// Validate the `prompt` section.
pub fn validate_prompt(record: &JsonRecord) -> Vec<ValidationIssue> {
    let section = Section::Prompt;
    let mut issues = Vec::new();

    let variables = check_string_array(record, section, "input_variables", true, &mut issues);

    if let Some(vars) = &variables {
        let mut seen = BTreeSet::new();
        for var in vars {
            if !seen.insert(*var) {
                issues.push(ValidationIssue::InvalidValue {
                    section,
                    field: "input_variables".into(),
                    actual: format!("duplicate variable '{var}'"),
                    allowed: Vec::new(),
                });
            }
        }
    }

    let template = check_string(record, section, "template", true, &mut issues);

    if let Some(format) = check_string(record, section, "template_format", false, &mut issues) {
        check_membership(section, "template_format", format, TEMPLATE_FORMATS, &mut issues);
    }

    // Reserved field: tolerated only as an explicit null.
    if let Some(value) = record.get("output_parser") {
        if !value.is_null() {
            push_type_mismatch(&mut issues, section, "output_parser", "null", value);
        }
    }

    let mut partials = BTreeSet::new();
    if let Some(value) = fetch(record, section, "partial_variables", false, &mut issues) {
        match value.as_object() {
            Some(map) => {
                for (key, item) in map {
                    if item.is_string() {
                        partials.insert(key.as_str());
                    } else {
                        push_type_mismatch(
                            &mut issues,
                            section,
                            &format!("partial_variables.{key}"),
                            "a string",
                            item,
                        );
                    }
                }
            }
            None => push_type_mismatch(&mut issues, section, "partial_variables", "an object", value),
        }
    }

    let validate_template =
        check_bool(record, section, "validate_template", false, &mut issues).unwrap_or(true);

    // Cross-field: placeholder / input-variable symmetry.  Placeholders
    // satisfied by partial_variables are exempt.
    if validate_template {
        if let (Some(vars), Some(template)) = (&variables, template) {
            let declared: BTreeSet<&str> = vars.iter().copied().collect();
            let placeholders = template_placeholders(template);

            let undeclared: Vec<String> = placeholders
                .iter()
                .filter(|name| {
                    !declared.contains(name.as_str()) && !partials.contains(name.as_str())
                })
                .cloned()
                .collect();
            if !undeclared.is_empty() {
                issues.push(ValidationIssue::TemplateVariableMismatch {
                    kind: MismatchKind::MissingInDeclaration,
                    names: undeclared,
                });
            }

            let unused: Vec<String> = declared
                .iter()
                .filter(|name| !placeholders.contains(**name))
                .map(|name| name.to_string())
                .collect();
            if !unused.is_empty() {
                issues.push(ValidationIssue::TemplateVariableMismatch {
                    kind: MismatchKind::MissingInTemplate,
                    names: unused,
                });
            }
        }
    }

    issues
}

/// Validate the `response` section.
pub fn validate_response(record: &JsonRecord) -> Vec<ValidationIssue> {
    let section = Section::Response;
    let mut issues = Vec::new();

    check_bool(record, section, "speak_responses", true, &mut issues);

    for field in ["response_delay_time", "response_stream_lag_time"] {
        if let Some(n) = check_number(record, section, field, true, &mut issues) {
            if n < 0.0 {
                issues.push(ValidationIssue::RangeViolation {
                    section,
                    field: field.into(),
                    constraint: "non-negative",
                    actual: n.to_string(),
                });
            }
        }
    }

    check_string(record, section, "voice_name", false, &mut issues);

    if let Some(n) = check_integer(record, section, "speech_rate_wpm", false, &mut issues) {
        if n < 1 {
            issues.push(ValidationIssue::RangeViolation {
                section,
                field: "speech_rate_wpm".into(),
                constraint: "at least 1",
                actual: n.to_string(),
            });
        } else if n > i64::from(u32::MAX) {
            issues.push(ValidationIssue::RangeViolation {
                section,
                field: "speech_rate_wpm".into(),
                constraint: "at most 4294967295",
                actual: n.to_string(),
            });
        }
    }

    issues
}

/// Validate the `theme` section.
pub fn validate_theme(record: &JsonRecord) -> Vec<ValidationIssue> {
    let section = Section::Theme;
    let mut issues = Vec::new();

    check_string(record, section, "app_name", false, &mut issues);
    check_string(record, section, "chat_placeholder_text", false, &mut issues);
    check_string(record, section, "textbox_placeholder_text", false, &mut issues);
    check_string(record, section, "primary_hue", false, &mut issues);
    check_string_array(record, section, "font", false, &mut issues);

    // A present source_theme must always name a built-in, even when the
    // hub theme overrides it — the typed section has to hold it either
    // way.  Absent source_theme falls back to the default built-in.
    if let Some(theme) = check_string(record, section, "source_theme", false, &mut issues) {
        check_membership(section, "source_theme", theme, BUILTIN_THEMES, &mut issues);
    }

    let from_hub =
        check_bool(record, section, "load_theme_from_hf_hub", false, &mut issues).unwrap_or(false);

    if from_hub {
        // Hub themes need a name.
        match check_string(record, section, "hf_hub_theme_name", true, &mut issues) {
            Some(name) if name.is_empty() => {
                issues.push(ValidationIssue::TypeMismatch {
                    section,
                    field: "hf_hub_theme_name".into(),
                    expected: "a non-empty string",
                    actual: "an empty string".into(),
                });
            }
            _ => {}
        }
    } else {
        check_string(record, section, "hf_hub_theme_name", false, &mut issues);
    }

    issues
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
