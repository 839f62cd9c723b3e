//! Creates a queue, optionally fills it with generated message batches and
//! drains it, printing every message body with one custom attribute.

use std::time::Duration;

use anyhow::Context as _;
use batchdrain::{
    backends::{InMemoryBroker, SqsAdmin, SqsBackend, SqsConfig},
    drain, partition, AttributeEchoHandler, DrainConfig, DrainSummary, DynConsumer, DynProducer,
    EmptyPollPolicy, MessageTemplate, PollOptions, QueueAdmin, QueueHandle, QueueOptions,
    QueueProducer as _, DELAY_SECONDS_ATTRIBUTE, MAX_BATCH_ENTRIES,
};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    /// Amazon SQS, or any SQS-compatible service given with --endpoint
    Sqs,
    /// A queue that lives only as long as this process
    Memory,
}

#[derive(Parser, Debug)]
#[command(name = "batchdrain")]
#[command(about = "Fill a queue with generated message batches and drain it", long_about = None)]
struct Args {
    /// Name of the queue to create and drain
    queue_name: String,

    /// Send a generated batch set before draining
    #[arg(long, env = "BATCHDRAIN_SEND")]
    send: bool,

    /// Number of messages to generate, a multiple of 10
    #[arg(long, default_value_t = 200)]
    count: usize,

    /// Value of the custom attribute carried by every generated message
    #[arg(long, default_value = "Donald Trump")]
    author: String,

    /// Name of the custom attribute to send and print
    #[arg(long, default_value = "Author")]
    attribute: String,

    /// Message body; `{}` is replaced with the message index
    #[arg(long, default_value = "ME$$AGE: {}.")]
    body_template: String,

    /// Delivery delay of the created queue, in seconds
    #[arg(long, default_value_t = 5)]
    delay_seconds: u32,

    /// Long-poll wait per receive request, in seconds
    #[arg(long, default_value_t = 10)]
    wait_seconds: u64,

    /// Stop draining after this many empty polls
    #[arg(long, default_value_t = 4)]
    max_empty_polls: usize,

    /// Only count consecutive empty polls
    #[arg(long)]
    reset_on_messages: bool,

    /// Queue backend
    #[arg(long, value_enum, default_value_t = Backend::Sqs, env = "BATCHDRAIN_BACKEND")]
    backend: Backend,

    /// SQS-compatible endpoint to use instead of AWS, e.g. http://localhost:9324
    #[arg(long, env = "BATCHDRAIN_ENDPOINT")]
    endpoint: Option<String>,

    /// Delete the queue once drained
    #[arg(long)]
    delete_queue: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "BATCHDRAIN_LOG_LEVEL")]
    log_level: String,
}

impl Args {
    fn template(&self) -> MessageTemplate {
        MessageTemplate {
            body: self.body_template.clone(),
            attribute_name: self.attribute.clone(),
            attribute_value: self.author.clone(),
        }
    }

    fn drain_config(&self) -> DrainConfig {
        DrainConfig {
            max_empty_polls: self.max_empty_polls,
            poll: PollOptions {
                max_messages: MAX_BATCH_ENTRIES,
                wait_time: Duration::from_secs(self.wait_seconds),
                attribute_names: vec![self.attribute.clone()],
            },
            empty_poll_policy: if self.reset_on_messages {
                EmptyPollPolicy::ResetOnMessages
            } else {
                EmptyPollPolicy::NeverReset
            },
        }
    }
}

async fn open_queue<A: QueueAdmin>(admin: &A, args: &Args) -> anyhow::Result<QueueHandle> {
    println!("Creating queue...");
    let created = admin
        .create_queue(
            &args.queue_name,
            &QueueOptions {
                delay_seconds: args.delay_seconds,
            },
        )
        .await
        .with_context(|| format!("failed to create queue `{}`", args.queue_name))?;
    println!("{}", created.url);
    println!(
        "{}",
        created.attribute(DELAY_SECONDS_ATTRIBUTE).unwrap_or_default()
    );

    let queue = admin.get_queue(&args.queue_name).await?;
    println!("\nGot queue...\n {}", queue.url);
    Ok(queue)
}

async fn run(
    args: &Args,
    producer: DynProducer,
    mut consumer: DynConsumer,
) -> anyhow::Result<DrainSummary> {
    if args.send {
        println!("\nSending BIG message batch...\n");
        let batches = partition(args.count, &args.template())?;
        for message in batches.iter().flatten() {
            println!("{}", serde_json::to_string(message)?);
        }

        let results = producer.send_batches(&batches).await?;
        let failed: usize = results.iter().map(|r| r.failed.len()).sum();
        if failed > 0 {
            warn!(failed, "some messages were not accepted by the queue");
        }
        info!(batches = batches.len(), "sent message batches");
    }

    println!("\nProcessing BIG message batch...");
    let mut handler = AttributeEchoHandler::stdout(&args.attribute);
    let summary = drain(&mut consumer, &mut handler, &args.drain_config()).await?;
    Ok(summary)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("batchdrain={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(backend = ?args.backend, queue = %args.queue_name, "starting");

    let summary = match args.backend {
        Backend::Sqs => {
            let admin = SqsAdmin::from_env(args.endpoint.as_deref()).await;
            let queue = open_queue(&admin, &args).await?;
            let (p, c) = SqsBackend::dyn_pair(SqsConfig {
                queue_dsn: queue.url,
                override_endpoint: args.endpoint.is_some(),
            })
            .await;

            let summary = run(&args, p, c).await?;
            if args.delete_queue {
                admin.delete_queue(&args.queue_name).await?;
            }
            summary
        }
        Backend::Memory => {
            let broker = InMemoryBroker::new();
            let queue = open_queue(&broker, &args).await?;
            let (p, c) = broker.dyn_pair(&queue)?;

            let summary = run(&args, p, c).await?;
            if args.delete_queue {
                broker.delete_queue(&args.queue_name).await?;
            }
            summary
        }
    };

    println!(
        "Finished! empty polls {}, messages processed {}",
        summary.empty_polls, summary.messages_processed
    );
    Ok(())
}
