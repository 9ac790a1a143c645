//! Prompt template rendering.
//!
//! [`PromptTemplate`] is built from a validated [`PromptConfig`] and
//! substitutes `{name}` placeholders f-string style: `{{` and `}}` render
//! as literal braces, partial variables are pre-bound at construction,
//! and an unbound placeholder is an error rather than silent passthrough.
//!
//! What counts as a placeholder matches the schema validator exactly:
//! only `{identifier}` tokens are substituted, anything else (`{}`,
//! `{not valid}`, an unclosed `{`) is emitted as written — a template the
//! validator accepts always renders.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::config::settings::PromptConfig;
use crate::config::validator::is_identifier;

// ---------------------------------------------------------------------------
// TemplateError
// ---------------------------------------------------------------------------

/// Errors raised while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A placeholder had no value bound to it.
    #[error("no value bound for template variable '{0}'")]
    UnboundVariable(String),
}

// ---------------------------------------------------------------------------
// PromptTemplate
// ---------------------------------------------------------------------------

/// A compiled prompt template.
///
/// # Example
/// ```rust
/// use llm_voice_chat::config::settings::PromptConfig;
/// use llm_voice_chat::llm::PromptTemplate;
///
/// let template = PromptTemplate::from_config(&PromptConfig::default());
/// let prompt = template.render_primary("What is an LLM?").unwrap();
/// assert!(prompt.contains("What is an LLM?"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
    partial_variables: BTreeMap<String, String>,
}

impl PromptTemplate {
    /// Build a template from a (validated) prompt configuration.
    pub fn from_config(config: &PromptConfig) -> Self {
        Self {
            template: config.template.clone(),
            input_variables: config.input_variables.clone(),
            partial_variables: config.partial_variables.clone(),
        }
    }

    /// The variables the caller must bind when rendering.
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Render with explicit variable bindings.  Partial variables fill
    /// any placeholder not present in `values`.
    pub fn render(&self, values: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.template.len() + 64);
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
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
                        match values
                            .get(&name)
                            .or_else(|| self.partial_variables.get(&name))
                        {
                            Some(value) => out.push_str(value),
                            None => return Err(TemplateError::UnboundVariable(name)),
                        }
                    } else {
                        // Not a placeholder per the schema rules — keep
                        // the token as written.
                        out.push('{');
                        out.push_str(&name);
                        if closed {
                            out.push('}');
                        }
                    }
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }

    /// Render binding `input` to the first declared input variable — the
    /// chat loop's single-question case.  A template with no input
    /// variables renders as-is.
    pub fn render_primary(&self, input: &str) -> Result<String, TemplateError> {
        let mut values = BTreeMap::new();
        if let Some(primary) = self.input_variables.first() {
            values.insert(primary.clone(), input.to_string());
        }
        self.render(&values)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(template: &str, variables: &[&str]) -> PromptConfig {
        PromptConfig {
            input_variables: variables.iter().map(|s| s.to_string()).collect(),
            template: template.into(),
            ..PromptConfig::default()
        }
    }

    #[test]
    fn renders_single_variable() {
        let template = PromptTemplate::from_config(&config("Question: {question}", &["question"]));
        let prompt = template.render_primary("What is Rust?").unwrap();
        assert_eq!(prompt, "Question: What is Rust?");
    }

    #[test]
    fn renders_multiple_variables() {
        let template = PromptTemplate::from_config(&config(
            "{greeting}, {name}!",
            &["greeting", "name"],
        ));
        let values = BTreeMap::from([
            ("greeting".to_string(), "Hello".to_string()),
            ("name".to_string(), "world".to_string()),
        ]);
        assert_eq!(template.render(&values).unwrap(), "Hello, world!");
    }

    #[test]
    fn escaped_braces_render_literally() {
        let template = PromptTemplate::from_config(&config(
            "Reply as JSON: {{\"answer\": \"{question}\"}}",
            &["question"],
        ));
        let prompt = template.render_primary("why").unwrap();
        assert_eq!(prompt, "Reply as JSON: {\"answer\": \"why\"}");
    }

    #[test]
    fn partial_variables_fill_unbound_placeholders() {
        let mut cfg = config("{persona}: {question}", &["question"]);
        cfg.partial_variables
            .insert("persona".into(), "You are a helpful assistant".into());
        let template = PromptTemplate::from_config(&cfg);
        let prompt = template.render_primary("hi").unwrap();
        assert_eq!(prompt, "You are a helpful assistant: hi");
    }

    #[test]
    fn unbound_placeholder_errors() {
        let template = PromptTemplate::from_config(&config("{question} {context}", &["question"]));
        assert_eq!(
            template.render_primary("hi"),
            Err(TemplateError::UnboundVariable("context".into()))
        );
    }

    #[test]
    fn non_identifier_tokens_render_literally() {
        let template = PromptTemplate::from_config(&config(
            "Answer in {not valid} style: {question}",
            &["question"],
        ));
        let prompt = template.render_primary("why?").unwrap();
        assert_eq!(prompt, "Answer in {not valid} style: why?");

        let template = PromptTemplate::from_config(&config("{} {1st} {question}", &["question"]));
        assert_eq!(template.render_primary("x").unwrap(), "{} {1st} x");
    }

    #[test]
    fn unclosed_brace_renders_literally() {
        let template = PromptTemplate::from_config(&config("version {question", &["question"]));
        assert_eq!(template.render_primary("hi").unwrap(), "version {question");
    }

    /// The renderer must substitute exactly the tokens the schema
    /// validator counts as placeholders: a template that validates
    /// cleanly renders cleanly.
    #[test]
    fn renderer_agrees_with_validator() {
        use crate::config::validator::validate_prompt;

        let record = serde_json::json!({
            "input_variables": ["question"],
            "template": "Answer in {not valid} style: {question}"
        })
        .as_object()
        .cloned()
        .unwrap();
        assert!(validate_prompt(&record).is_empty());

        let template = PromptTemplate::from_config(&config(
            "Answer in {not valid} style: {question}",
            &["question"],
        ));
        assert!(template.render_primary("why?").is_ok());
    }

    #[test]
    fn template_without_variables_renders_as_is() {
        let template = PromptTemplate::from_config(&config("a fixed prompt", &[]));
        assert_eq!(template.render_primary("ignored").unwrap(), "a fixed prompt");
    }

    #[test]
    fn explicit_binding_overrides_partial() {
        let mut cfg = config("{tone}", &["tone"]);
        cfg.partial_variables.insert("tone".into(), "formal".into());
        let template = PromptTemplate::from_config(&cfg);

        let values = BTreeMap::from([("tone".to_string(), "casual".to_string())]);
        assert_eq!(template.render(&values).unwrap(), "casual");
    }
}
