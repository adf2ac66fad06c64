//! Message transformations applied by the relay

use crate::{Error, Message, Result};

/// Pure mapping from one message to a new one
pub trait Transform: Send + Sync {
    fn apply(&self, message: &Message) -> Result<Message>;
}

/// Reverses the value and keeps the key.
///
/// Reversal runs over Unicode scalar values, not grapheme clusters, so
/// `"😀!"` becomes `"!😀"` while a base letter and its combining mark swap
/// places.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reverser;

impl Reverser {
    pub fn reverse(value: &str) -> String {
        value.chars().rev().collect()
    }
}

impl Transform for Reverser {
    fn apply(&self, message: &Message) -> Result<Message> {
        let value = message
            .value()
            .ok_or_else(|| Error::InvalidInput("message has no value to reverse".into()))?;

        Ok(Message::new(
            message.key().map(str::to_string),
            Self::reverse(value),
        ))
    }
}
