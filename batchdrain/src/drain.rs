//! The drain loop: poll until the queue looks empty often enough.

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::{MessageHandler, PollOptions, QueueConsumer, QueueError, Result};

/// What a poll that returned messages does to the empty-poll count.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum EmptyPollPolicy {
    /// Empty polls accumulate over the whole drain; messages never reset the
    /// count.
    #[default]
    NeverReset,
    /// Only consecutive empty polls count; any message resets the count.
    ResetOnMessages,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DrainConfig {
    /// The drain stops once this many empty polls have been counted.
    pub max_empty_polls: usize,
    pub poll: PollOptions,
    pub empty_poll_policy: EmptyPollPolicy,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            max_empty_polls: 4,
            poll: PollOptions::default(),
            empty_poll_policy: EmptyPollPolicy::default(),
        }
    }
}

impl DrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_empty_polls == 0 {
            return Err(QueueError::invalid_argument(
                "max_empty_polls must be positive",
            ));
        }
        self.poll.validate()
    }
}

/// Counters of one drain run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DrainSummary {
    /// Messages the handler completed successfully.
    pub messages_processed: usize,
    pub empty_polls: usize,
    pub polls: usize,
}

/// A drain that stopped on an error, with the progress made until then.
#[derive(Debug, Error)]
#[error("drain aborted after {} messages", .summary.messages_processed)]
pub struct DrainError {
    pub summary: DrainSummary,
    #[source]
    pub source: QueueError,
}

/// Polls `consumer` and hands every delivery to `handler`, in the order each
/// poll returned them, until `config.max_empty_polls` empty polls have been
/// counted.
///
/// Nothing is retried: the first poll or handler error ends the drain.
pub async fn drain<C, H>(
    consumer: &mut C,
    handler: &mut H,
    config: &DrainConfig,
) -> Result<DrainSummary, DrainError>
where
    C: QueueConsumer,
    H: MessageHandler,
{
    let mut summary = DrainSummary::default();
    config
        .validate()
        .map_err(|source| DrainError { summary, source })?;

    while summary.empty_polls < config.max_empty_polls {
        let deliveries = consumer
            .poll(&config.poll)
            .await
            .map_err(|source| DrainError { summary, source })?;
        summary.polls += 1;

        if deliveries.is_empty() {
            summary.empty_polls += 1;
            debug!(
                empty_polls = summary.empty_polls,
                max_empty_polls = config.max_empty_polls,
                "poll returned no messages"
            );
            continue;
        }

        if config.empty_poll_policy == EmptyPollPolicy::ResetOnMessages {
            summary.empty_polls = 0;
        }

        trace!(count = deliveries.len(), "handling messages");
        for delivery in deliveries {
            handler
                .handle(delivery)
                .await
                .map_err(|source| DrainError { summary, source })?;
            summary.messages_processed += 1;
        }
    }

    info!(
        messages_processed = summary.messages_processed,
        empty_polls = summary.empty_polls,
        polls = summary.polls,
        "drain finished"
    );
    Ok(summary)
}
