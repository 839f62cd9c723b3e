use std::fmt;

use crate::{Message, QueueError};

mod acker;
mod admin;
mod consumer;
mod producer;

use self::acker::DynAcker;
pub use self::{
    acker::Acker,
    admin::{QueueAdmin, QueueHandle, QueueOptions, DELAY_SECONDS_ATTRIBUTE, MAX_DELAY_SECONDS},
    consumer::{DynConsumer, PollOptions, QueueConsumer, MAX_WAIT_TIME},
    producer::{BatchSendResult, DynProducer, FailedEntry, QueueProducer, SentEntry},
};

/// A message received from a queue, together with the means to settle it.
pub struct Delivery {
    message: Message,
    acker: DynAcker,
}

impl Delivery {
    #[doc(hidden)]
    pub fn new(message: Message, acker: impl Acker + 'static) -> Self {
        Self {
            message,
            acker: DynAcker::new(acker),
        }
    }

    /// Acknowledges the receipt and successful processing of this [`Delivery`].
    ///
    /// On failure, `self` is returned alongside the error for inspection; it
    /// cannot be settled again.
    ///
    /// This deletes the message from the queue, so that it is not delivered
    /// again. Fails with [`QueueError::MessageNotFound`] if the message was
    /// already deleted.
    pub async fn ack(mut self) -> Result<(), (QueueError, Self)> {
        self.acker.ack().await.map_err(|e| (e, self))
    }

    /// Explicitly does not acknowledge the successful processing of this
    /// [`Delivery`].
    ///
    /// On failure, `self` is returned alongside the error for inspection; it
    /// cannot be settled again.
    ///
    /// The message becomes visible to consumers again right away.
    pub async fn nack(mut self) -> Result<(), (QueueError, Self)> {
        self.acker.nack().await.map_err(|e| (e, self))
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn body(&self) -> &str {
        self.message.body()
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
