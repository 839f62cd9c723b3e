//! # Batchdrain
//!
//! Batchdrain fills an SQS-style queue with deterministic batches of synthetic
//! messages and drains it again, handing every received message to a
//! caller-supplied handler.
//!
//! It is built from two small pieces of logic sitting on top of a queue
//! capability:
//!
//!   * The batch partitioner ([`partition`]) splits a total message count into
//!     batches of exactly [`MAX_BATCH_ENTRIES`] messages with globally unique,
//!     increasing identifiers.
//!
//!   * The drain loop ([`drain()`]) long-polls a [`QueueConsumer`], runs a
//!     [`MessageHandler`] on each [`Delivery`] and stops after a bounded number
//!     of empty polls.
//!
//! ## Cargo Features
//!
//! * `in_memory`: a process-local broker, mostly useful in tests
//! * `sqs`: Amazon SQS and SQS-compatible services such as ElasticMQ
//! * `cli`: the `batchdrain` binary
//!
//! All of them are enabled by default.
//!
//! ## How to Use Batchdrain
//!
//! ```no_run
//! # async {
//! use batchdrain::{
//!     backends::{SqsAdmin, SqsBackend, SqsConfig},
//!     drain, partition, AttributeEchoHandler, DrainConfig, MessageTemplate, QueueOptions,
//!     QueueProducer as _,
//! };
//!
//! let admin = SqsAdmin::from_env(None).await;
//! let queue = admin
//!     .create_queue("demo", &QueueOptions { delay_seconds: 5 })
//!     .await?;
//!
//! let (p, mut c) = SqsBackend::pair(SqsConfig {
//!     queue_dsn: queue.url.clone(),
//!     override_endpoint: false,
//! })
//! .await;
//!
//! let batches = partition(200, &MessageTemplate::default())?;
//! p.send_batches(&batches).await?;
//!
//! let mut handler = AttributeEchoHandler::stdout("Author");
//! let summary = drain(&mut c, &mut handler, &DrainConfig::default()).await?;
//! println!("{} messages processed", summary.messages_processed);
//! # anyhow::Ok(())
//! # };
//! ```
//!
//! ## `DynProducer`s and `DynConsumer`s
//!
//! When the backend is only known at runtime, ask for type-erased halves:
//!
//! ```no_run
//! # async {
//! use batchdrain::backends::InMemoryBroker;
//!
//! let broker = InMemoryBroker::new();
//! let queue = broker.create_queue("demo", &Default::default()).await?;
//! let (p, mut c) = broker.dyn_pair(&queue)?;
//! # anyhow::Ok(())
//! # };
//! ```
#![warn(unreachable_pub)]

use thiserror::Error;

#[macro_use]
mod macros;

pub mod backends;
pub mod batch;
pub mod drain;
pub mod handler;
pub mod message;
mod queue;

pub use self::{
    batch::{generate_batch, partition, Batch, MessageTemplate, MAX_BATCH_ENTRIES},
    drain::{drain, DrainConfig, DrainError, DrainSummary, EmptyPollPolicy},
    handler::{AttributeEchoHandler, MessageHandler},
    message::{AttributeDataType, Message, MessageAttribute},
    queue::{
        Acker, BatchSendResult, Delivery, DynConsumer, DynProducer, FailedEntry, PollOptions,
        QueueAdmin, QueueConsumer, QueueHandle, QueueOptions, QueueProducer, SentEntry,
        DELAY_SECONDS_ATTRIBUTE, MAX_DELAY_SECONDS, MAX_WAIT_TIME,
    },
};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("queue `{0}` does not exist")]
    QueueNotFound(String),
    #[error("message does not exist or its receipt handle has expired")]
    MessageNotFound,

    #[error("a single delivery may only be ACKed or NACKed once")]
    CannotAckOrNackTwice,

    #[error("{0}")]
    Generic(Box<dyn std::error::Error + Send + Sync>),
}

impl QueueError {
    pub fn generic<E: 'static + std::error::Error + Send + Sync>(e: E) -> Self {
        Self::Generic(Box::new(e))
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

pub type Result<T, E = QueueError> = std::result::Result<T, E>;
