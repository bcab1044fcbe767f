//! Prompt templates for the map, reduce, and summarize calls.

use std::collections::BTreeMap;
use thiserror::Error;

const MAP_TEMPLATE: &str = "The following is a set of documents:
{docs}
Based on this list of documents, please identify the information that is most relevant to the following query:
{user_query}
If the document is not relevant, please write \"not relevant\".
Helpful Answer:";

const REDUCE_TEMPLATE: &str = "The following is a set of partial answers to a user query:
{docs}
Take these and distill them into a final, consolidated answer to the following query:
{user_query}
Complete Answer:";

const SUMMARIZE_TEMPLATE: &str = "Write a long summary of the following document.
Only include information that is part of the document.
Do not include your own opinion or analysis.

Document:
\"{document}\"
Summary:";

/// Errors raised while rendering a template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    /// A placeholder had no bound value.
    #[error("prompt variable '{0}' was not provided")]
    MissingVariable(String),
}

/// Immutable string with named `{placeholder}` slots.
///
/// Substitution is a single left-to-right pass, so braces inside substituted values are never
/// interpreted as placeholders. Braces that do not wrap an identifier are kept verbatim.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: &'static str,
    partials: BTreeMap<String, String>,
}

impl PromptTemplate {
    /// Wrap a template string.
    pub fn new(template: &'static str) -> Self {
        Self {
            template,
            partials: BTreeMap::new(),
        }
    }

    /// Bind `name` ahead of time; later `format` calls may still override it.
    pub fn partial(mut self, name: &str, value: &str) -> Self {
        self.partials.insert(name.to_string(), value.to_string());
        self
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.template;
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_identifier(&after[..close]) => {
                    names.push(&after[..close]);
                    rest = &after[close + 1..];
                }
                _ => rest = after,
            }
        }
        names
    }

    /// Render the template, failing if any placeholder is unbound.
    pub fn format(&self, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let lookup = |name: &str| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
                .or_else(|| self.partials.get(name).map(String::as_str))
        };

        let mut rendered = String::with_capacity(self.template.len());
        let mut rest = self.template;
        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_identifier(&after[..close]) => {
                    let name = &after[..close];
                    let value =
                        lookup(name).ok_or_else(|| PromptError::MissingVariable(name.to_string()))?;
                    rendered.push_str(value);
                    rest = &after[close + 1..];
                }
                _ => {
                    rendered.push('{');
                    rest = after;
                }
            }
        }
        rendered.push_str(rest);
        Ok(rendered)
    }
}

fn is_identifier(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Map prompt with the user query bound; expects `{docs}`.
pub fn map_template(user_query: &str) -> PromptTemplate {
    PromptTemplate::new(MAP_TEMPLATE).partial("user_query", user_query)
}

/// Reduce/collapse prompt with the user query bound; expects `{docs}`.
pub fn reduce_template(user_query: &str) -> PromptTemplate {
    PromptTemplate::new(REDUCE_TEMPLATE).partial("user_query", user_query)
}

/// Summarize prompt; expects `{document}`.
pub fn summarize_template() -> PromptTemplate {
    PromptTemplate::new(SUMMARIZE_TEMPLATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_template_binds_query_and_docs() {
        let prompt = map_template("What data is used?")
            .format(&[("docs", "Page text")])
            .expect("render");
        assert!(prompt.contains("Page text\nBased on this list"));
        assert!(prompt.contains("following query:\nWhat data is used?\n"));
        assert!(prompt.contains("\"not relevant\""));
    }

    #[test]
    fn missing_variable_is_reported() {
        let error = summarize_template().format(&[]).unwrap_err();
        assert_eq!(error, PromptError::MissingVariable("document".into()));
    }

    #[test]
    fn substituted_braces_are_not_expanded() {
        let prompt = reduce_template("q")
            .format(&[("docs", "literal {user_query} and {not closed")])
            .expect("render");
        assert!(prompt.contains("literal {user_query} and {not closed"));
    }

    #[test]
    fn non_identifier_braces_stay_verbatim() {
        let template = PromptTemplate::new("json: {\"a\": 1} then {name}");
        assert_eq!(template.placeholders(), vec!["name"]);
        assert_eq!(
            template.format(&[("name", "x")]).expect("render"),
            "json: {\"a\": 1} then x"
        );
    }

    #[test]
    fn placeholders_are_listed_in_order() {
        assert_eq!(
            PromptTemplate::new(REDUCE_TEMPLATE).placeholders(),
            vec!["docs", "user_query"]
        );
        assert_eq!(summarize_template().placeholders(), vec!["document"]);
    }
}
