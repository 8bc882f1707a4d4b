use serde::{Deserialize, Serialize};

/// Who produced a message in a chat conversation with the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged message sent to the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Validates the conversation's role invariant: only the first message may
/// carry role `system`; every other message must be `user` or `assistant`.
/// Checked before any network activity.
pub fn validate_roles(messages: &[ChatMessage]) -> Result<(), crate::WeaveError> {
    if messages.is_empty() {
        return Err(crate::WeaveError::Internal(
            "conversation must be nonempty".into(),
        ));
    }
    for (i, msg) in messages.iter().enumerate() {
        if msg.role == Role::System && i != 0 {
            return Err(crate::WeaveError::Internal(format!(
                "role `system` only allowed as the first message, found at index {i}"
            )));
        }
    }
    Ok(())
}
