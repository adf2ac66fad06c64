use reverser_middleware::Record;

use crate::Error;

/// Immutable key/value pair passed between relay stages
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    key: Option<String>,
    value: Option<String>,
}

impl Message {
    pub fn new(key: Option<String>, value: impl Into<String>) -> Self {
        Self {
            key,
            value: Some(value.into()),
        }
    }

    /// A message whose record carried no value
    pub fn without_value(key: Option<String>) -> Self {
        Self { key, value: None }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn into_parts(self) -> (Option<String>, Option<String>) {
        (self.key, self.value)
    }
}

impl TryFrom<Record> for Message {
    type Error = Error;

    /// Fails only when the value is present but not UTF-8. A missing value is
    /// carried through so the transformer decides.
    fn try_from(record: Record) -> Result<Self, Self::Error> {
        let Some(payload) = record.value else {
            return Ok(Self::without_value(record.key));
        };

        let value = String::from_utf8(payload.to_vec()).map_err(|e| {
            Error::InvalidInput(format!(
                "value on {} is not UTF-8 text: {}",
                record.topic, e
            ))
        })?;

        Ok(Self::new(record.key, value))
    }
}
