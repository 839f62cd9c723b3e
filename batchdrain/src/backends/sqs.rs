use aws_sdk_sqs::{
    operation::{
        change_message_visibility::ChangeMessageVisibilityError,
        create_queue::CreateQueueError, delete_message::DeleteMessageError,
        get_queue_url::GetQueueUrlError,
    },
    primitives::Blob,
    types::{
        error::ReceiptHandleIsInvalid, Message as SqsMessage, MessageAttributeValue,
        QueueAttributeName, SendMessageBatchRequestEntry,
    },
    Client,
};
use tracing::{debug, trace};

use crate::{
    queue::Acker, AttributeDataType, Batch, BatchSendResult, Delivery, DynConsumer, DynProducer,
    FailedEntry, Message, MessageAttribute, PollOptions, QueueConsumer as _, QueueError,
    QueueHandle, QueueOptions, QueueProducer as _, Result, SentEntry,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SqsConfig {
    /// URL of the queue to produce to and consume from.
    pub queue_dsn: String,
    /// Send requests to `queue_dsn` instead of the regional AWS endpoint,
    /// e.g. for ElasticMQ.
    pub override_endpoint: bool,
}

async fn load_client(endpoint: Option<&str>) -> Client {
    let aws_cfg = match endpoint {
        Some(url) => aws_config::from_env().endpoint_url(url).load().await,
        None => aws_config::load_from_env().await,
    };

    Client::new(&aws_cfg)
}

fn to_attribute_value(attr: &MessageAttribute) -> Result<MessageAttributeValue> {
    let builder = MessageAttributeValue::builder().data_type(attr.data_type.as_str());
    let builder = match attr.data_type {
        AttributeDataType::Binary => builder.binary_value(Blob::new(attr.value.as_bytes())),
        AttributeDataType::String | AttributeDataType::Number => {
            builder.string_value(&attr.value)
        }
    };
    builder.build().map_err(QueueError::generic)
}

fn from_attribute_value(value: &MessageAttributeValue) -> MessageAttribute {
    let data_type = AttributeDataType::from_sqs(value.data_type());
    let value = match data_type {
        AttributeDataType::Binary => value
            .binary_value()
            .map(|b| String::from_utf8_lossy(b.as_ref()).into_owned()),
        AttributeDataType::String | AttributeDataType::Number => {
            value.string_value().map(ToOwned::to_owned)
        }
    };

    MessageAttribute {
        value: value.unwrap_or_default(),
        data_type,
    }
}

fn to_batch_entry(message: &Message) -> Result<SendMessageBatchRequestEntry> {
    let mut entry = SendMessageBatchRequestEntry::builder()
        .id(message.id())
        .message_body(message.body());
    for (name, attr) in message.attributes() {
        entry = entry.message_attributes(name, to_attribute_value(attr)?);
    }
    entry.build().map_err(QueueError::generic)
}

fn from_sqs_message(message: &SqsMessage) -> Message {
    message
        .message_attributes()
        .into_iter()
        .flatten()
        .fold(
            Message::new(
                message.message_id().unwrap_or_default(),
                message.body().unwrap_or_default(),
            ),
            |out, (name, value)| out.with_attribute(name.clone(), from_attribute_value(value)),
        )
}

pub struct SqsBackend;

impl SqsBackend {
    /// Connects a producer and a consumer to the queue at `cfg.queue_dsn`.
    ///
    /// Both halves share one client.
    pub async fn pair(cfg: SqsConfig) -> (SqsProducer, SqsConsumer) {
        let client = load_client(cfg.override_endpoint.then_some(cfg.queue_dsn.as_str())).await;

        let producer = SqsProducer {
            client: client.clone(),
            queue_dsn: cfg.queue_dsn.clone(),
        };
        let consumer = SqsConsumer {
            client,
            queue_dsn: cfg.queue_dsn,
        };

        (producer, consumer)
    }

    /// Like [`pair`](Self::pair), for callers that pick the backend at runtime.
    pub async fn dyn_pair(cfg: SqsConfig) -> (DynProducer, DynConsumer) {
        let (p, c) = Self::pair(cfg).await;
        (p.into_dyn(), c.into_dyn())
    }
}

/// Creates, looks up and deletes SQS queues.
#[derive(Clone)]
pub struct SqsAdmin {
    client: Client,
}

impl SqsAdmin {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Loads the AWS configuration from the environment, optionally pointing
    /// the client at an SQS-compatible `endpoint`.
    pub async fn from_env(endpoint: Option<&str>) -> Self {
        Self::new(load_client(endpoint).await)
    }

    pub async fn create_queue(&self, name: &str, options: &QueueOptions) -> Result<QueueHandle> {
        options.validate()?;

        let out = self
            .client
            .create_queue()
            .queue_name(name)
            .attributes(
                QueueAttributeName::DelaySeconds,
                options.delay_seconds.to_string(),
            )
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                CreateQueueError::QueueNameExists(_) => QueueError::invalid_argument(format!(
                    "queue `{name}` already exists with different attributes"
                )),
                e => QueueError::generic(e),
            })?;
        let url = out
            .queue_url()
            .ok_or_else(|| QueueError::Generic("CreateQueue returned no queue URL".into()))?;

        debug!(queue = name, url, "created queue");
        self.describe(name, url).await
    }

    pub async fn get_queue(&self, name: &str) -> Result<QueueHandle> {
        let url = self.queue_url(name).await?;
        self.describe(name, &url).await
    }

    pub async fn delete_queue(&self, name: &str) -> Result<()> {
        let url = self.queue_url(name).await?;
        self.client
            .delete_queue()
            .queue_url(&url)
            .send()
            .await
            .map_err(QueueError::generic)?;

        debug!(queue = name, url = %url, "deleted queue");
        Ok(())
    }

    async fn queue_url(&self, name: &str) -> Result<String> {
        let out = self
            .client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                GetQueueUrlError::QueueDoesNotExist(_) => {
                    QueueError::QueueNotFound(name.to_owned())
                }
                e => QueueError::generic(e),
            })?;

        out.queue_url()
            .map(ToOwned::to_owned)
            .ok_or_else(|| QueueError::QueueNotFound(name.to_owned()))
    }

    async fn describe(&self, name: &str, url: &str) -> Result<QueueHandle> {
        let out = self
            .client
            .get_queue_attributes()
            .queue_url(url)
            .attribute_names(QueueAttributeName::All)
            .send()
            .await
            .map_err(QueueError::generic)?;

        let attributes = out
            .attributes()
            .into_iter()
            .flatten()
            .map(|(k, v)| (k.as_str().to_owned(), v.clone()))
            .collect();

        Ok(QueueHandle {
            name: name.to_owned(),
            url: url.to_owned(),
            attributes,
        })
    }
}

impl_queue_admin!(SqsAdmin);

struct SqsAcker {
    ack_client: Client,
    queue_dsn: String,
    receipt_handle: Option<String>,
}

impl SqsAcker {
    fn receipt_handle(&self) -> Result<String> {
        self.receipt_handle.clone().ok_or_else(|| {
            QueueError::generic(
                ReceiptHandleIsInvalid::builder()
                    .message("message was received without a receipt handle")
                    .build(),
            )
        })
    }
}

impl Acker for SqsAcker {
    async fn ack(&mut self) -> Result<()> {
        let receipt_handle = self.receipt_handle()?;

        self.ack_client
            .delete_message()
            .queue_url(&self.queue_dsn)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                DeleteMessageError::ReceiptHandleIsInvalid(_) => QueueError::MessageNotFound,
                e => QueueError::generic(e),
            })?;

        Ok(())
    }

    async fn nack(&mut self) -> Result<()> {
        let receipt_handle = self.receipt_handle()?;

        self.ack_client
            .change_message_visibility()
            .queue_url(&self.queue_dsn)
            .receipt_handle(receipt_handle)
            .visibility_timeout(0)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                ChangeMessageVisibilityError::ReceiptHandleIsInvalid(_)
                | ChangeMessageVisibilityError::MessageNotInflight(_) => {
                    QueueError::MessageNotFound
                }
                e => QueueError::generic(e),
            })?;

        Ok(())
    }
}

pub struct SqsProducer {
    client: Client,
    queue_dsn: String,
}

impl SqsProducer {
    pub async fn send_batch(&self, batch: &Batch) -> Result<BatchSendResult> {
        let entries = batch
            .iter()
            .map(to_batch_entry)
            .collect::<Result<Vec<_>>>()?;

        let out = self
            .client
            .send_message_batch()
            .queue_url(&self.queue_dsn)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(QueueError::generic)?;

        let result = BatchSendResult {
            successful: out
                .successful()
                .iter()
                .map(|e| SentEntry {
                    id: e.id().to_owned(),
                    message_id: e.message_id().to_owned(),
                })
                .collect(),
            failed: out
                .failed()
                .iter()
                .map(|e| FailedEntry {
                    id: e.id().to_owned(),
                    code: e.code().to_owned(),
                    message: e.message().map(ToOwned::to_owned),
                    sender_fault: e.sender_fault(),
                })
                .collect(),
        };

        trace!(
            sent = result.successful.len(),
            failed = result.failed.len(),
            "sent batch"
        );
        Ok(result)
    }
}

impl_queue_producer!(SqsProducer);

pub struct SqsConsumer {
    client: Client,
    queue_dsn: String,
}

impl SqsConsumer {
    fn wrap_message(&self, message: &SqsMessage) -> Delivery {
        Delivery::new(
            from_sqs_message(message),
            SqsAcker {
                ack_client: self.client.clone(),
                queue_dsn: self.queue_dsn.clone(),
                receipt_handle: message.receipt_handle().map(ToOwned::to_owned),
            },
        )
    }

    pub async fn poll(&self, options: &PollOptions) -> Result<Vec<Delivery>> {
        options.validate()?;

        let out = self
            .client
            .receive_message()
            .queue_url(&self.queue_dsn)
            .max_number_of_messages(options.max_messages.try_into().map_err(QueueError::generic)?)
            .wait_time_seconds(
                options
                    .wait_time
                    .as_secs()
                    .try_into()
                    .map_err(QueueError::generic)?,
            )
            .set_message_attribute_names(
                (!options.attribute_names.is_empty()).then(|| options.attribute_names.clone()),
            )
            .send()
            .await
            .map_err(QueueError::generic)?;

        trace!(count = out.messages().len(), "received messages");
        Ok(out
            .messages()
            .iter()
            .map(|message| self.wrap_message(message))
            .collect())
    }
}

impl_queue_consumer!(SqsConsumer);
