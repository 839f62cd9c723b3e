//! A process-local queue broker.
//!
//! Queues live as long as the [`InMemoryBroker`] that created them. They
//! honour the delivery delay, batch limits and long-poll wait of SQS, but
//! messages received and never settled stay in flight forever.

use std::{
    collections::{HashMap, VecDeque},
    pin::pin,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use svix_ksuid::{KsuidLike as _, KsuidMs};
use tokio::{sync::Notify, time::Instant};
use tracing::trace;

use crate::{
    queue::Acker, Batch, BatchSendResult, Delivery, DynConsumer, DynProducer, Message, PollOptions,
    QueueConsumer as _, QueueError, QueueHandle, QueueOptions, QueueProducer as _, Result,
    SentEntry,
};

const URL_SCHEME: &str = "memory://";
const MAX_QUEUE_NAME_LEN: usize = 80;

fn poisoned() -> QueueError {
    QueueError::Generic("in-memory queue lock poisoned".into())
}

fn validate_queue_name(name: &str) -> Result<()> {
    let stem = name.strip_suffix(".fifo").unwrap_or(name);
    if stem.is_empty()
        || name.len() > MAX_QUEUE_NAME_LEN
        || !stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(QueueError::invalid_argument(format!(
            "invalid queue name `{name}`: use 1 to {MAX_QUEUE_NAME_LEN} alphanumeric characters, \
             hyphens or underscores"
        )));
    }
    Ok(())
}

/// Copies `message` as it is seen by a receiver: under the id the queue
/// assigned and with only the attributes the receive request asked for.
///
/// `All` and `.*` select everything, `Prefix.*` selects by prefix.
fn received_copy(message_id: &str, message: &Message, names: &[String]) -> Message {
    let wanted = |attr: &str| {
        names.iter().any(|name| match name.as_str() {
            "All" | ".*" => true,
            name => match name.strip_suffix(".*") {
                Some(prefix) => attr.starts_with(prefix),
                None => attr == name,
            },
        })
    };

    message
        .attributes()
        .iter()
        .filter(|(name, _)| wanted(name))
        .fold(
            Message::new(message_id, message.body()),
            |out, (name, attr)| out.with_attribute(name.clone(), attr.clone()),
        )
}

/// Owns a set of named in-memory queues.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    queues: Arc<Mutex<HashMap<String, InMemoryQueue>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects a producer and a consumer to an existing queue.
    pub fn pair(&self, queue: &QueueHandle) -> Result<(InMemoryProducer, InMemoryConsumer)> {
        Ok(self.queue(&queue.name)?.pair())
    }

    /// Like [`pair`](Self::pair), for callers that pick the backend at runtime.
    pub fn dyn_pair(&self, queue: &QueueHandle) -> Result<(DynProducer, DynConsumer)> {
        let (p, c) = self.pair(queue)?;
        Ok((p.into_dyn(), c.into_dyn()))
    }

    pub fn queue(&self, name: &str) -> Result<InMemoryQueue> {
        self.queues()?
            .get(name)
            .cloned()
            .ok_or_else(|| QueueError::QueueNotFound(name.to_owned()))
    }

    fn queues(&self) -> Result<MutexGuard<'_, HashMap<String, InMemoryQueue>>> {
        self.queues.lock().map_err(|_| poisoned())
    }

    pub async fn create_queue(&self, name: &str, options: &QueueOptions) -> Result<QueueHandle> {
        validate_queue_name(name)?;
        options.validate()?;

        let mut queues = self.queues()?;
        if let Some(existing) = queues.get(name) {
            if existing.inner.options != *options {
                return Err(QueueError::invalid_argument(format!(
                    "queue `{name}` already exists with different attributes"
                )));
            }
            return Ok(existing.handle());
        }

        let queue = InMemoryQueue::new(name, options.clone());
        let handle = queue.handle();
        queues.insert(name.to_owned(), queue);
        trace!(queue = name, "created in-memory queue");
        Ok(handle)
    }

    pub async fn get_queue(&self, name: &str) -> Result<QueueHandle> {
        self.queue(name).map(|q| q.handle())
    }

    pub async fn delete_queue(&self, name: &str) -> Result<()> {
        let queue = self
            .queues()?
            .remove(name)
            .ok_or_else(|| QueueError::QueueNotFound(name.to_owned()))?;
        queue.close();
        trace!(queue = name, "deleted in-memory queue");
        Ok(())
    }
}

impl_queue_admin!(InMemoryBroker);

struct Stored {
    message_id: String,
    message: Message,
    visible_at: Instant,
}

#[derive(Default)]
struct Store {
    ready: VecDeque<Stored>,
    in_flight: HashMap<String, Stored>,
    deleted: bool,
}

struct QueueInner {
    name: String,
    options: QueueOptions,
    store: Mutex<Store>,
    notify: Notify,
}

/// A shared handle to one in-memory queue.
#[derive(Clone)]
pub struct InMemoryQueue {
    inner: Arc<QueueInner>,
}

impl InMemoryQueue {
    fn new(name: &str, options: QueueOptions) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name: name.to_owned(),
                options,
                store: Mutex::new(Store::default()),
                notify: Notify::new(),
            }),
        }
    }

    pub fn pair(&self) -> (InMemoryProducer, InMemoryConsumer) {
        (
            InMemoryProducer {
                queue: self.clone(),
            },
            InMemoryConsumer {
                queue: self.clone(),
            },
        )
    }

    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            name: self.inner.name.clone(),
            url: format!("{URL_SCHEME}{}", self.inner.name),
            attributes: self.inner.options.to_attributes(),
        }
    }

    /// Number of messages waiting to be received, including delayed ones.
    pub fn approximate_number_of_messages(&self) -> Result<usize> {
        Ok(self.store()?.ready.len())
    }

    /// Number of received messages that have not been settled yet.
    pub fn approximate_number_of_messages_not_visible(&self) -> Result<usize> {
        Ok(self.store()?.in_flight.len())
    }

    fn store(&self) -> Result<MutexGuard<'_, Store>> {
        let store = self.inner.store.lock().map_err(|_| poisoned())?;
        if store.deleted {
            return Err(QueueError::QueueNotFound(self.inner.name.clone()));
        }
        Ok(store)
    }

    fn push(&self, batch: &Batch) -> Result<BatchSendResult> {
        let visible_at =
            Instant::now() + Duration::from_secs(self.inner.options.delay_seconds.into());
        let mut result = BatchSendResult::default();
        {
            let mut store = self.store()?;
            for message in batch {
                let message_id = KsuidMs::new(None, None).to_string();
                result.successful.push(SentEntry {
                    id: message.id().to_owned(),
                    message_id: message_id.clone(),
                });
                store.ready.push_back(Stored {
                    message_id,
                    message: message.clone(),
                    visible_at,
                });
            }
        }
        self.inner.notify.notify_waiters();
        Ok(result)
    }

    /// Moves up to `max_messages` visible messages in flight.
    ///
    /// When nothing is visible yet, also returns when the earliest delayed
    /// message will be.
    fn take_visible(
        &self,
        options: &PollOptions,
    ) -> Result<(Vec<(String, Message)>, Option<Instant>)> {
        let now = Instant::now();
        let mut store = self.store()?;
        let mut taken = Vec::new();

        let mut i = 0;
        while i < store.ready.len() && taken.len() < options.max_messages {
            if store.ready[i].visible_at > now {
                i += 1;
                continue;
            }
            if let Some(stored) = store.ready.remove(i) {
                let receipt_handle = KsuidMs::new(None, None).to_string();
                let message =
                    received_copy(&stored.message_id, &stored.message, &options.attribute_names);
                store.in_flight.insert(receipt_handle.clone(), stored);
                taken.push((receipt_handle, message));
            }
        }

        let next_visible = if taken.is_empty() {
            store.ready.iter().map(|s| s.visible_at).min()
        } else {
            None
        };
        Ok((taken, next_visible))
    }

    fn ack(&self, receipt_handle: &str) -> Result<()> {
        self.store()?
            .in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or(QueueError::MessageNotFound)
    }

    fn nack(&self, receipt_handle: &str) -> Result<()> {
        {
            let mut store = self.store()?;
            let mut stored = store
                .in_flight
                .remove(receipt_handle)
                .ok_or(QueueError::MessageNotFound)?;
            stored.visible_at = Instant::now();
            store.ready.push_front(stored);
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    fn close(&self) {
        if let Ok(mut store) = self.inner.store.lock() {
            store.deleted = true;
            store.ready.clear();
            store.in_flight.clear();
        }
        self.inner.notify.notify_waiters();
    }

    async fn poll(&self, options: &PollOptions) -> Result<Vec<Delivery>> {
        options.validate()?;
        let deadline = Instant::now() + options.wait_time;

        loop {
            // Registered before looking at the store so a concurrent send
            // cannot slip in between the check and the wait.
            let mut notified = pin!(self.inner.notify.notified());
            notified.as_mut().enable();

            let (taken, next_visible) = self.take_visible(options)?;
            if !taken.is_empty() {
                trace!(queue = %self.inner.name, count = taken.len(), "received messages");
                return Ok(taken
                    .into_iter()
                    .map(|(receipt_handle, message)| {
                        Delivery::new(
                            message,
                            InMemoryAcker {
                                queue: self.clone(),
                                receipt_handle,
                            },
                        )
                    })
                    .collect());
            }

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            let wake = next_visible.map_or(deadline, |at| at.min(deadline));
            let _ = tokio::time::timeout_at(wake, notified).await;
        }
    }
}

pub struct InMemoryProducer {
    queue: InMemoryQueue,
}

impl InMemoryProducer {
    pub async fn send_batch(&self, batch: &Batch) -> Result<BatchSendResult> {
        let result = self.queue.push(batch)?;
        trace!(queue = %self.queue.inner.name, count = batch.len(), "sent batch");
        Ok(result)
    }
}

impl_queue_producer!(InMemoryProducer);

pub struct InMemoryConsumer {
    queue: InMemoryQueue,
}

impl InMemoryConsumer {
    pub async fn poll(&self, options: &PollOptions) -> Result<Vec<Delivery>> {
        self.queue.poll(options).await
    }
}

impl_queue_consumer!(InMemoryConsumer);

struct InMemoryAcker {
    queue: InMemoryQueue,
    receipt_handle: String,
}

impl Acker for InMemoryAcker {
    async fn ack(&mut self) -> Result<()> {
        self.queue.ack(&self.receipt_handle)
    }

    async fn nack(&mut self) -> Result<()> {
        self.queue.nack(&self.receipt_handle)
    }
}
