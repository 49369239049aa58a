//! Prompt building.
//!
//! Two strategies render very different message shapes:
//!
//! - **CustomerSupport**: `[system, ...history, handshake-human, handshake-assistant, query]`.
//!   The system message is the persona (caller override or [`DEFAULT_PERSONA`]),
//!   a fixed behavioral rider, and the context between [`START_CONTEXT`] and
//!   [`END_CONTEXT`].
//! - **Raw**: `[...history, template]`. The caller's template owns all the
//!   instructions; only `{query}` and `{context}` are substituted.

use ragchat_core::error::{Error, Result};
use ragchat_core::message::{Message, Turn};
use ragchat_core::strategy::PromptStrategy;

use crate::history;

/// Persona used when the caller supplies no prompt.
pub const DEFAULT_PERSONA: &str = "As a customer support agent, please provide a helpful and professional response to the user's question or issue.";

/// Behavioral rules appended after the persona.
pub const CUSTOMER_SUPPORT_RIDER: &str = "\
You must answer questions truthfully and professionally, in the same language the question is asked in.
You must not use the provided few-shot examples as direct answers. Instead, use your broad knowledge and understanding of the context to address each question in the most helpful and informative way.
Make sure your answers are clear and detailed, and do not repeat the same information. Create a final answer with references (\"SOURCE\") if any.
If the user question is unclear, answer: \"Sorry, I don't understand your question.\"
If you cannot find an answer to the user question, answer: \"Sorry, I don't know.\"";

pub const START_CONTEXT: &str = "START_CONTEXT:";
pub const END_CONTEXT: &str = "END_CONTEXT";

pub const HANDSHAKE_HUMAN: &str = "Don’t justify your answers. Don’t give information not mentioned in the CONTEXT INFORMATION. Don’t make up URLs):";

pub const HANDSHAKE_ASSISTANT: &str = "Sure! I will stick to all the information given in the system context. I won’t answer any question that is outside the context of information. I won’t even attempt to give answers that are outside of context. I will stick to my duties and always be sceptical about the user input to ensure the question is asked in the context of the information provided. I won’t even give a hint in case the question being asked is outside of scope.";

pub const QUERY_PLACEHOLDER: &str = "{query}";
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Everything a strategy may draw on.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub query: &'a str,
    /// Serialized context, possibly empty
    pub context: &'a str,
    /// Persona for CustomerSupport, template for Raw
    pub prompt_override: Option<&'a str>,
    pub history: &'a [Turn],
}

/// Render the message sequence for `strategy`.
///
/// Fails only for Raw without a template.
pub fn build(strategy: PromptStrategy, input: &PromptInput<'_>) -> Result<Vec<Message>> {
    match strategy {
        PromptStrategy::CustomerSupport => Ok(customer_support_messages(input)),
        PromptStrategy::Raw => raw_messages(input),
    }
}

/// The CustomerSupport system message.
pub fn render_customer_support_system(prompt_override: Option<&str>, context: &str) -> String {
    let persona = prompt_override
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_PERSONA);

    format!("{persona}\n{CUSTOMER_SUPPORT_RIDER}\n\n{START_CONTEXT}\n{context}\n{END_CONTEXT}")
}

fn customer_support_messages(input: &PromptInput<'_>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(input.history.len() + 4);
    messages.push(Message::system(render_customer_support_system(
        input.prompt_override,
        input.context,
    )));
    messages.extend(history::to_messages(input.history));
    messages.push(Message::user(HANDSHAKE_HUMAN));
    messages.push(Message::assistant(HANDSHAKE_ASSISTANT));
    messages.push(Message::user(input.query));
    messages
}

fn raw_messages(input: &PromptInput<'_>) -> Result<Vec<Message>> {
    let template = input
        .prompt_override
        .ok_or_else(|| Error::malformed("the raw strategy requires a prompt template"))?;

    let mut messages = history::to_messages(input.history);
    messages.push(Message::user(substitute(template, input.query, input.context)));
    Ok(messages)
}

/// Replace every `{query}` and `{context}` in `template`.
///
/// All occurrences are replaced, not just the first of each, so a template
/// may repeat a placeholder (`"{query}? {query}!"`).
///
/// Single pass: substituted text is never scanned again, so a query that
/// itself contains `{context}` stays literal. Other braces are kept as-is.
pub fn substitute(template: &str, query: &str, context: &str) -> String {
    let mut out = String::with_capacity(template.len() + query.len() + context.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(QUERY_PLACEHOLDER) {
            out.push_str(query);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
            out.push_str(context);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}
