//! Messages fetched from a pull-based queue.

use std::fmt;

/// Identifier a queue assigns to a fetched message.
///
/// The consumer hands it back to the queue in terminal operations and
/// otherwise treats it as opaque.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeliveryTag(pub u64);

impl DeliveryTag {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DeliveryTag {
    fn from(tag: u64) -> Self {
        DeliveryTag(tag)
    }
}

/// A message delivered by a queue.
///
/// The payload is opaque to the consumer; headers are carried through untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    delivery_tag: DeliveryTag,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// Optional transport headers (routing keys, correlation IDs, etc.)
    pub headers: Option<Vec<(String, String)>>,
}

impl Message {
    /// Create a message with the given tag and payload.
    pub fn new(delivery_tag: impl Into<DeliveryTag>, payload: Vec<u8>) -> Self {
        Self {
            delivery_tag: delivery_tag.into(),
            payload,
            headers: None,
        }
    }

    /// Create a message with a string payload.
    pub fn with_string_payload(
        delivery_tag: impl Into<DeliveryTag>,
        payload: impl Into<String>,
    ) -> Self {
        Self::new(delivery_tag, payload.into().into_bytes())
    }

    /// Add a header to the message.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    pub fn delivery_tag(&self) -> DeliveryTag {
        self.delivery_tag
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Look up the first header with the given key.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn set_delivery_tag(&mut self, tag: DeliveryTag) {
        self.delivery_tag = tag;
    }
}
