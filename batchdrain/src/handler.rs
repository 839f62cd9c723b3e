//! Per-message processing used by [`drain`][crate::drain()].

use std::{future::Future, io::Write};

use crate::{Delivery, QueueError, Result};

/// Processes one delivery.
///
/// A handler is responsible for settling the delivery itself; nothing is
/// acknowledged on its behalf. Returning an error stops the drain.
pub trait MessageHandler: Send {
    fn handle(&mut self, delivery: Delivery) -> impl Future<Output = Result<()>> + Send;
}

impl<F, Fut> MessageHandler for F
where
    F: FnMut(Delivery) -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
{
    fn handle(&mut self, delivery: Delivery) -> impl Future<Output = Result<()>> + Send {
        self(delivery)
    }
}

/// Prints the body and one custom attribute of every message, then
/// acknowledges it.
///
/// Messages lacking the attribute are printed with an empty value.
pub struct AttributeEchoHandler<W> {
    attribute: String,
    out: W,
}

impl AttributeEchoHandler<std::io::Stdout> {
    pub fn stdout(attribute: impl Into<String>) -> Self {
        Self::new(attribute, std::io::stdout())
    }
}

impl<W: Write + Send> AttributeEchoHandler<W> {
    pub fn new(attribute: impl Into<String>, out: W) -> Self {
        Self {
            attribute: attribute.into(),
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> MessageHandler for AttributeEchoHandler<W> {
    async fn handle(&mut self, delivery: Delivery) -> Result<()> {
        let author = delivery
            .message()
            .attribute_value(&self.attribute)
            .unwrap_or_default();
        writeln!(self.out, "AUTHOR: {author} \t | BODY: {}", delivery.body())
            .map_err(QueueError::generic)?;

        delivery.ack().await.map_err(|(e, _)| e)
    }
}
