use std::{collections::HashMap, future::Future};

use crate::{QueueError, Result};

/// Queue attribute holding the delivery delay, in seconds.
pub const DELAY_SECONDS_ATTRIBUTE: &str = "DelaySeconds";

/// Largest delivery delay a queue may be created with.
pub const MAX_DELAY_SECONDS: u32 = 900;

/// Settings applied when a queue is created.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueueOptions {
    /// Delay before a newly sent message becomes visible to consumers.
    pub delay_seconds: u32,
}

impl QueueOptions {
    pub fn validate(&self) -> Result<()> {
        if self.delay_seconds > MAX_DELAY_SECONDS {
            return Err(QueueError::invalid_argument(format!(
                "delay_seconds must be at most {MAX_DELAY_SECONDS}, got {}",
                self.delay_seconds
            )));
        }
        Ok(())
    }

    pub(crate) fn to_attributes(&self) -> HashMap<String, String> {
        HashMap::from([(
            DELAY_SECONDS_ATTRIBUTE.to_owned(),
            self.delay_seconds.to_string(),
        )])
    }
}

/// A reference to an existing queue.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueueHandle {
    pub name: String,
    pub url: String,
    pub attributes: HashMap<String, String>,
}

impl QueueHandle {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Queue lifecycle operations.
pub trait QueueAdmin: Send + Sync {
    /// Creates the queue `name`, or returns it if it already exists with the
    /// same attributes.
    fn create_queue(
        &self,
        name: &str,
        options: &QueueOptions,
    ) -> impl Future<Output = Result<QueueHandle>> + Send;

    /// Looks up an existing queue, failing with [`QueueError::QueueNotFound`].
    fn get_queue(&self, name: &str) -> impl Future<Output = Result<QueueHandle>> + Send;

    fn delete_queue(&self, name: &str) -> impl Future<Output = Result<()>> + Send;
}
