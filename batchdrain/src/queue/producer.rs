use std::{future::Future, pin::Pin};

use tracing::warn;

use crate::{Batch, Message, QueueError, Result};

/// A batch entry the queue accepted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SentEntry {
    /// The entry id from the batch.
    pub id: String,
    /// The id the queue assigned to the stored message.
    pub message_id: String,
}

/// A batch entry the queue refused.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailedEntry {
    pub id: String,
    pub code: String,
    pub message: Option<String>,
    /// Whether the failure was caused by the request rather than the service.
    pub sender_fault: bool,
}

/// Per-entry outcome of a batch send, keyed by the entry ids.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchSendResult {
    pub successful: Vec<SentEntry>,
    pub failed: Vec<FailedEntry>,
}

impl BatchSendResult {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub trait QueueProducer: Send + Sync + Sized {
    /// Sends all messages of `batch` in a single request.
    ///
    /// Failures of individual entries are reported in the result rather than
    /// as an error.
    fn send_batch(&self, batch: &Batch) -> impl Future<Output = Result<BatchSendResult>> + Send;

    /// Sends every batch in order, one request per batch.
    fn send_batches(
        &self,
        batches: &[Batch],
    ) -> impl Future<Output = Result<Vec<BatchSendResult>>> + Send {
        async move {
            let mut out = Vec::with_capacity(batches.len());
            for batch in batches {
                let result = self.send_batch(batch).await?;
                if !result.is_complete() {
                    warn!(
                        failed = result.failed.len(),
                        sent = result.successful.len(),
                        "batch was only partially accepted"
                    );
                }
                out.push(result);
            }
            Ok(out)
        }
    }

    /// Sends a single message and returns the id the queue assigned to it.
    fn send_message(&self, message: &Message) -> impl Future<Output = Result<String>> + Send {
        async move {
            let batch = Batch::new(vec![message.clone()])?;
            let mut result = self.send_batch(&batch).await?;
            if let Some(failed) = result.failed.pop() {
                return Err(QueueError::Generic(
                    format!(
                        "message `{}` was rejected: {} {}",
                        failed.id,
                        failed.code,
                        failed.message.unwrap_or_default()
                    )
                    .into(),
                ));
            }
            result
                .successful
                .pop()
                .map(|sent| sent.message_id)
                .ok_or_else(|| QueueError::Generic("no result for the sent message".into()))
        }
    }

    fn into_dyn(self) -> DynProducer
    where
        Self: 'static,
    {
        DynProducer::new(self)
    }
}

pub struct DynProducer(Box<dyn ErasedQueueProducer>);

impl DynProducer {
    fn new(inner: impl QueueProducer + 'static) -> Self {
        let dyn_inner = DynProducerInner { inner };
        Self(Box::new(dyn_inner))
    }
}

trait ErasedQueueProducer: Send + Sync {
    fn send_batch<'a>(
        &'a self,
        batch: &'a Batch,
    ) -> Pin<Box<dyn Future<Output = Result<BatchSendResult>> + Send + 'a>>;
}

struct DynProducerInner<P> {
    inner: P,
}

impl<P: QueueProducer> ErasedQueueProducer for DynProducerInner<P> {
    fn send_batch<'a>(
        &'a self,
        batch: &'a Batch,
    ) -> Pin<Box<dyn Future<Output = Result<BatchSendResult>> + Send + 'a>> {
        Box::pin(async move { self.inner.send_batch(batch).await })
    }
}

impl QueueProducer for DynProducer {
    async fn send_batch(&self, batch: &Batch) -> Result<BatchSendResult> {
        self.0.send_batch(batch).await
    }

    fn into_dyn(self) -> DynProducer {
        self
    }
}
