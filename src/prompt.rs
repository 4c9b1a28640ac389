//! Prompt definitions and chat-prompt templating.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` stand for literal
//! braces. Substitution is a single pass, so a substituted value (retrieved
//! text, user input) is never scanned for placeholders itself.
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Fixed instruction for the assistant. `{context}` receives the retrieved passages.
pub const SYSTEM_PROMPT: &str = "You are a medical assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, say that you don't know. \
Use three sentences maximum and keep the answer concise.\
\n\n\
{context}";

/// Template of the single human turn.
pub const HUMAN_TEMPLATE: &str = "{input}";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PromptError {
    #[error("missing value for prompt variable `{0}`")]
    MissingVariable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    Human,
}

impl Role {
    /// Prefix used when a chat prompt is flattened to plain text.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Role::System => "System",
            Role::Human => "Human",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Ordered list of role/template pairs.
#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    messages: Vec<(Role, String)>,
}

impl ChatPromptTemplate {
    pub fn from_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = (Role, S)>,
        S: Into<String>,
    {
        Self {
            messages: messages
                .into_iter()
                .map(|(role, template)| (role, template.into()))
                .collect(),
        }
    }

    /// System instruction followed by one human turn.
    #[must_use]
    pub fn question_answering() -> Self {
        Self::from_messages([(Role::System, SYSTEM_PROMPT), (Role::Human, HUMAN_TEMPLATE)])
    }

    /// Names of every placeholder across all messages.
    #[must_use]
    pub fn input_variables(&self) -> BTreeSet<String> {
        self.messages
            .iter()
            .flat_map(|(_, template)| PLACEHOLDER.captures_iter(template))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }

    pub fn format_messages(&self, vars: &HashMap<&str, &str>) -> Result<Vec<Message>, PromptError> {
        self.messages
            .iter()
            .map(|(role, template)| {
                Ok(Message {
                    role: *role,
                    content: format_template(template, vars)?,
                })
            })
            .collect()
    }
}

/// Substitute `{name}` placeholders in `template` from `vars`.
pub fn format_template(template: &str, vars: &HashMap<&str, &str>) -> Result<String, PromptError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&template[last..whole.start()]);
        match caps.get(1) {
            Some(name) => {
                let value = vars
                    .get(name.as_str())
                    .ok_or_else(|| PromptError::MissingVariable(name.as_str().to_string()))?;
                out.push_str(value);
            }
            // `{{` or `}}`
            None => out.push_str(&whole.as_str()[..1]),
        }
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

/// Flatten chat messages into the text sent to a completion model.
#[must_use]
pub fn to_buffer_string(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_template() {
        let vars = HashMap::from([("input", "What is acne?")]);
        assert_eq!(
            format_template("Q: {input}", &vars).unwrap(),
            "Q: What is acne?"
        );
    }

    #[test]
    fn test_format_escaped_braces() {
        let vars = HashMap::from([("x", "1")]);
        assert_eq!(
            format_template("{{literal}} {x} }}", &vars).unwrap(),
            "{literal} 1 }"
        );
    }

    #[test]
    fn test_format_missing_variable() {
        let err = format_template("{context}", &HashMap::new()).unwrap_err();
        assert_eq!(err, PromptError::MissingVariable("context".to_string()));
    }

    #[test]
    fn test_substituted_values_are_not_reexpanded() {
        let vars = HashMap::from([("context", "see {input} and {{x}}"), ("input", "q")]);
        assert_eq!(
            format_template("{context}|{input}", &vars).unwrap(),
            "see {input} and {{x}}|q"
        );
    }

    #[test]
    fn test_question_answering_variables() {
        let template = ChatPromptTemplate::question_answering();
        let vars: Vec<String> = template.input_variables().into_iter().collect();
        assert_eq!(vars, vec!["context", "input"]);
    }

    #[test]
    fn test_format_messages_and_buffer() {
        let template = ChatPromptTemplate::from_messages([
            (Role::System, "Context: {context}"),
            (Role::Human, "{input}"),
        ]);
        let vars = HashMap::from([("context", "Fever is a symptom."), ("input", "hello")]);
        let messages = template.format_messages(&vars).unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(
            to_buffer_string(&messages),
            "System: Context: Fever is a symptom.\nHuman: hello"
        );
    }

    #[test]
    fn test_system_prompt_ends_with_context_slot() {
        assert!(SYSTEM_PROMPT.ends_with("\n\n{context}"));
        assert!(SYSTEM_PROMPT.contains("three sentences maximum"));
    }
}
