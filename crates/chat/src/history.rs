//! Conversation history to model messages.

use ragchat_core::message::{Message, Speaker, Turn};

/// Translate one turn: human speech is a user message, agent speech an
/// assistant message.
pub fn to_message(turn: &Turn) -> Message {
    match turn.speaker {
        Speaker::Human => Message::user(&turn.content),
        Speaker::Agent => Message::assistant(&turn.content),
    }
}

/// Translate the history 1:1, preserving order.
pub fn to_messages(history: &[Turn]) -> Vec<Message> {
    history.iter().map(to_message).collect()
}
