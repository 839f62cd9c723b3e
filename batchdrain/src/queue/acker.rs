use std::{future::Future, pin::Pin};

use sync_wrapper::SyncWrapper;

use crate::{QueueError, Result};

/// Settles a single received message with the queue it came from.
///
/// Implementations only talk to the queue; [`Delivery`](super::Delivery)
/// makes sure they are called at most once.
pub trait Acker: Send {
    /// Deletes the message from the queue.
    fn ack(&mut self) -> impl Future<Output = Result<()>> + Send;
    /// Makes the message visible to other consumers again.
    fn nack(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// A boxed [`Acker`] that allows a single settle attempt.
///
/// The attempt is used up even when it fails: after a failed delete the
/// receipt handle may or may not still be valid, so a second ack or nack
/// fails with [`QueueError::CannotAckOrNackTwice`] without reaching the
/// queue.
pub(crate) struct DynAcker {
    inner: SyncWrapper<Box<dyn ErasedAcker>>,
    settled: bool,
}

impl DynAcker {
    pub(super) fn new(inner: impl Acker + 'static) -> Self {
        let c = DynAckerInner { inner };
        Self {
            inner: SyncWrapper::new(Box::new(c)),
            settled: false,
        }
    }

    fn begin_settle(&mut self) -> Result<&mut Box<dyn ErasedAcker>> {
        if self.settled {
            return Err(QueueError::CannotAckOrNackTwice);
        }
        self.settled = true;
        Ok(self.inner.get_mut())
    }
}

impl Acker for DynAcker {
    async fn ack(&mut self) -> Result<()> {
        self.begin_settle()?.ack().await
    }

    async fn nack(&mut self) -> Result<()> {
        self.begin_settle()?.nack().await
    }
}

trait ErasedAcker: Send {
    fn ack(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
    fn nack(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

struct DynAckerInner<C> {
    inner: C,
}

impl<C: Acker> ErasedAcker for DynAckerInner<C> {
    fn ack(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { self.inner.ack().await })
    }

    fn nack(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { self.inner.nack().await })
    }
}
