//! Argument checks that serde cannot express.

use crate::error::ApiError;

const NAME_MIN: usize = 3;
const NAME_MAX: usize = 80;
const REACTION_MAX: usize = 64;

/// Trimmed display name of 3..=80 characters.
pub fn name(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(ApiError::Invalid("Name must be between 3 and 80 characters"));
    }
    Ok(trimmed.to_string())
}

/// Channel names are lowercase with whitespace runs collapsed to `-`.
pub fn channel_name(raw: &str) -> Result<String, ApiError> {
    let normalized = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    name(&normalized)
}

/// Message bodies are serialized rich-text documents.
pub fn body(raw: &str) -> Result<(), ApiError> {
    if raw.trim().is_empty() {
        return Err(ApiError::Invalid("Message body can not be empty"));
    }
    serde_json::from_str::<serde_json::Value>(raw)
        .map_err(|_| ApiError::Invalid("Message body must be a serialized document"))?;
    Ok(())
}

pub fn reaction(raw: &str) -> Result<(), ApiError> {
    if raw.is_empty() || raw.len() > REACTION_MAX || raw.chars().any(char::is_whitespace) {
        return Err(ApiError::Invalid("Invalid reaction"));
    }
    Ok(())
}
