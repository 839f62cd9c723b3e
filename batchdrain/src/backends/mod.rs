#[cfg(feature = "in_memory")]
pub mod in_memory;
#[cfg(feature = "sqs")]
pub mod sqs;

#[cfg(feature = "in_memory")]
pub use in_memory::{InMemoryBroker, InMemoryConsumer, InMemoryProducer, InMemoryQueue};
#[cfg(feature = "sqs")]
pub use sqs::{SqsAdmin, SqsBackend, SqsConfig, SqsConsumer, SqsProducer};
