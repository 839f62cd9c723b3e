use std::{future::Future, pin::Pin, time::Duration};

use crate::{QueueError, Result, MAX_BATCH_ENTRIES};

use super::Delivery;

/// Longest long-poll wait a receive request may ask for.
pub const MAX_WAIT_TIME: Duration = Duration::from_secs(20);

/// Parameters of a single receive request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollOptions {
    /// Upper bound on the number of messages returned, 1 to 10.
    pub max_messages: usize,
    /// How long to block waiting for messages when none are available.
    ///
    /// Whole seconds only, up to [`MAX_WAIT_TIME`]; SQS has no finer long-poll
    /// granularity.
    pub wait_time: Duration,
    /// Custom message attributes to fetch along with each message.
    pub attribute_names: Vec<String>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_messages: MAX_BATCH_ENTRIES,
            wait_time: Duration::from_secs(10),
            attribute_names: Vec::new(),
        }
    }
}

impl PollOptions {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BATCH_ENTRIES).contains(&self.max_messages) {
            return Err(QueueError::invalid_argument(format!(
                "max_messages must be between 1 and {MAX_BATCH_ENTRIES}, got {}",
                self.max_messages
            )));
        }
        if self.wait_time > MAX_WAIT_TIME || self.wait_time.subsec_nanos() != 0 {
            return Err(QueueError::invalid_argument(format!(
                "wait_time must be a whole number of seconds up to {MAX_WAIT_TIME:?}, got {:?}",
                self.wait_time
            )));
        }
        Ok(())
    }
}

pub trait QueueConsumer: Send {
    /// Receives up to `options.max_messages` messages, waiting at most
    /// `options.wait_time` for the first one to become available.
    ///
    /// An empty result means the wait elapsed without any message arriving.
    fn poll(&mut self, options: &PollOptions)
        -> impl Future<Output = Result<Vec<Delivery>>> + Send;

    fn into_dyn(self) -> DynConsumer
    where
        Self: Sized + 'static,
    {
        DynConsumer::new(self)
    }
}

pub struct DynConsumer(Box<dyn ErasedQueueConsumer>);

impl DynConsumer {
    fn new(inner: impl QueueConsumer + 'static) -> Self {
        let c = DynConsumerInner { inner };
        Self(Box::new(c))
    }
}

trait ErasedQueueConsumer: Send {
    fn poll<'a>(
        &'a mut self,
        options: &'a PollOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Delivery>>> + Send + 'a>>;
}

struct DynConsumerInner<C> {
    inner: C,
}

impl<C: QueueConsumer> ErasedQueueConsumer for DynConsumerInner<C> {
    fn poll<'a>(
        &'a mut self,
        options: &'a PollOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Delivery>>> + Send + 'a>> {
        Box::pin(async move { self.inner.poll(options).await })
    }
}

impl QueueConsumer for DynConsumer {
    async fn poll(&mut self, options: &PollOptions) -> Result<Vec<Delivery>> {
        self.0.poll(options).await
    }

    fn into_dyn(self) -> DynConsumer {
        self
    }
}
