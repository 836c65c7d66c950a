//! Prompt templates and assembly.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::errors::AppError;
use crate::rag::index::RetrievalMatch;

/// Template used when relevant passages were retrieved. The model answers
/// only from the supplied passages and falls back to fixed refusal
/// sentences otherwise.
const GROUNDED_TEMPLATE: &str = r#"Answer the following question to the best of your ability:
    {{question}}

Base your answer on these relevant parts of the documentation:
    {{information}}

Do not provide any additional information.
Do not provide answers about other programming languages, but write "Sorry, that's a question I can't answer".
Do not generate source code, but write "Sorry, that's a question I can't answer".
If the answer cannot be found in the documents, write "Sorry, I could not find an answer to your question in our docs".
"#;

/// Template used when retrieval found nothing relevant. No document text is
/// embedded; the model is told to redirect instead of answering.
const REDIRECT_TEMPLATE: &str = r#"A user asked the following question:
    {{question}}

No relevant documentation was found for this question. Do not attempt to
answer it. Politely explain that the documentation does not cover this
topic and redirect the user to {{contact}} for further help.
"#;

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("static placeholder regex")
    })
}

/// A prompt template with `{{variable}}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn from(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Names of the placeholders present in the template text.
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        for captures in placeholder_re().captures_iter(&self.template) {
            if let Some(name) = captures.get(1) {
                if !names.iter().any(|n| n == name.as_str()) {
                    names.push(name.as_str().to_string());
                }
            }
        }
        names
    }

    /// Substitute `variables` into the template.
    ///
    /// Every supplied variable must have a placeholder in the template and
    /// every placeholder must be supplied. A mismatch is a defect in the
    /// template or the call site, not a runtime input problem, so it fails
    /// loudly instead of producing a half-filled prompt.
    pub fn apply(&self, variables: &HashMap<&str, String>) -> Result<String, AppError> {
        let mut rendered = self.template.clone();
        for (name, value) in variables {
            let placeholder = format!("{{{{{name}}}}}");
            if !rendered.contains(&placeholder) {
                return Err(AppError::Template(format!(
                    "placeholder {placeholder} missing from template"
                )));
            }
            rendered = rendered.replace(&placeholder, value);
        }

        if let Some(captures) = placeholder_re().captures(&rendered) {
            return Err(AppError::Template(format!(
                "unresolved placeholder {{{{{}}}}}",
                &captures[1]
            )));
        }

        Ok(rendered)
    }
}

/// Chooses and fills the prompt for a question given its retrieval result.
pub struct PromptBuilder {
    grounded: PromptTemplate,
    redirect: PromptTemplate,
    support_contact: String,
}

impl PromptBuilder {
    pub fn new(support_contact: impl Into<String>) -> Self {
        Self {
            grounded: PromptTemplate::from(GROUNDED_TEMPLATE),
            redirect: PromptTemplate::from(REDIRECT_TEMPLATE),
            support_contact: support_contact.into(),
        }
    }

    /// Build the prompt text for `question`.
    ///
    /// Empty `matches` selects the redirect template; otherwise the grounded
    /// template embeds every match's text, link and group id in retrieval
    /// order.
    pub fn build(&self, question: &str, matches: &[RetrievalMatch]) -> Result<String, AppError> {
        if matches.is_empty() {
            let mut variables = HashMap::new();
            variables.insert("question", question.to_string());
            variables.insert("contact", self.support_contact.clone());
            return self.redirect.apply(&variables);
        }

        let information = matches
            .iter()
            .map(|m| {
                format!(
                    "{}. LINK: {}. GROUP_ID: {}",
                    m.passage.text, m.passage.metadata.link, m.passage.metadata.group_id
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut variables = HashMap::new();
        variables.insert("question", question.to_string());
        variables.insert("information", information);
        self.grounded.apply(&variables)
    }
}
