//! Deterministic generation of message batches.

use std::collections::HashSet;

use crate::{Message, MessageAttribute, QueueError, Result};

/// Maximum number of entries a single batch request may carry.
pub const MAX_BATCH_ENTRIES: usize = 10;

/// An ordered group of 1 to [`MAX_BATCH_ENTRIES`] messages with distinct ids.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Batch {
    messages: Vec<Message>,
}

impl Batch {
    pub fn new(messages: Vec<Message>) -> Result<Self> {
        if messages.is_empty() {
            return Err(QueueError::invalid_argument(
                "a batch must contain at least one message",
            ));
        }
        if messages.len() > MAX_BATCH_ENTRIES {
            return Err(QueueError::invalid_argument(format!(
                "a batch may contain at most {MAX_BATCH_ENTRIES} messages, got {}",
                messages.len()
            )));
        }

        let mut seen = HashSet::with_capacity(messages.len());
        if let Some(dup) = messages.iter().find(|m| !seen.insert(m.id())) {
            return Err(QueueError::invalid_argument(format!(
                "message id `{}` appears more than once in the batch",
                dup.id()
            )));
        }

        Ok(Self { messages })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always `false`; a batch holds at least one message.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Describes how generated messages look.
///
/// Every `{}` in `body` is replaced with the message index, and every message
/// carries one string attribute `attribute_name = attribute_value`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessageTemplate {
    pub body: String,
    pub attribute_name: String,
    pub attribute_value: String,
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self {
            body: "ME$$AGE: {}.".to_owned(),
            attribute_name: "Author".to_owned(),
            attribute_value: "Donald Trump".to_owned(),
        }
    }
}

impl MessageTemplate {
    pub fn render(&self, index: usize) -> Message {
        Message::new(
            index.to_string(),
            self.body.replace("{}", &index.to_string()),
        )
        .with_attribute(
            self.attribute_name.clone(),
            MessageAttribute::string(self.attribute_value.clone()),
        )
    }
}

/// Builds one batch of `size` messages with ids `id_start..id_start + size`.
///
/// `size` must be between 1 and [`MAX_BATCH_ENTRIES`]; an empty batch cannot
/// be sent, so `size == 0` fails with [`QueueError::InvalidArgument`] rather
/// than yielding nothing.
pub fn generate_batch(size: usize, id_start: usize, template: &MessageTemplate) -> Result<Batch> {
    if size > MAX_BATCH_ENTRIES {
        return Err(QueueError::invalid_argument(format!(
            "maximum number of entries per request is {MAX_BATCH_ENTRIES}, got {size}"
        )));
    }

    Batch::new(
        (id_start..id_start + size)
            .map(|index| template.render(index))
            .collect(),
    )
}

/// Splits `total_count` messages into full batches.
///
/// Ids are assigned as `batch_index * 10 + position`, so they are unique across
/// the whole set and increase from 0. `total_count` must be a multiple of
/// [`MAX_BATCH_ENTRIES`]; zero yields no batches.
pub fn partition(total_count: usize, template: &MessageTemplate) -> Result<Vec<Batch>> {
    if total_count % MAX_BATCH_ENTRIES != 0 {
        return Err(QueueError::invalid_argument(format!(
            "only multiples of {MAX_BATCH_ENTRIES} messages are supported, got {total_count}"
        )));
    }

    (0..total_count / MAX_BATCH_ENTRIES)
        .map(|batch_index| {
            generate_batch(
                MAX_BATCH_ENTRIES,
                batch_index * MAX_BATCH_ENTRIES,
                template,
            )
        })
        .collect()
}
