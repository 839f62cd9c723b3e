use std::time::Duration;

use batchdrain::{
    backends::{InMemoryBroker, InMemoryConsumer, InMemoryProducer, InMemoryQueue},
    drain, partition, AttributeEchoHandler, Batch, Delivery, DrainConfig, EmptyPollPolicy,
    Message, MessageAttribute, MessageTemplate, PollOptions, QueueConsumer as _, QueueError,
    QueueHandle, QueueOptions, QueueProducer as _,
};
use tokio::time::Instant;

/// A fresh queue on its own broker, plus a producer and consumer for it.
async fn make_test_queue(
    delay_seconds: u32,
) -> (
    InMemoryBroker,
    QueueHandle,
    (InMemoryProducer, InMemoryConsumer),
) {
    let broker = InMemoryBroker::new();
    let queue_name: String = std::iter::repeat_with(fastrand::alphanumeric)
        .take(8)
        .collect();
    let handle = broker
        .create_queue(&queue_name, &QueueOptions { delay_seconds })
        .await
        .unwrap();
    let pair = broker.pair(&handle).unwrap();
    (broker, handle, pair)
}

fn poll_options(wait_time: Duration) -> PollOptions {
    PollOptions {
        max_messages: 10,
        wait_time,
        attribute_names: vec!["Author".to_owned()],
    }
}

/// Timers fire on millisecond ticks, so a paused clock may overshoot slightly.
fn assert_elapsed(since: Instant, expected: Duration) {
    let elapsed = since.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(100),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

fn queue_of(broker: &InMemoryBroker, handle: &QueueHandle) -> InMemoryQueue {
    broker.queue(&handle.name).unwrap()
}

#[tokio::test]
async fn test_send_recv_with_attribute() {
    let (_broker, _handle, (p, c)) = make_test_queue(0).await;

    let message =
        Message::new("0", "hello").with_attribute("Author", MessageAttribute::string("x"));
    let message_id = p.send_message(&message).await.unwrap();

    let mut xs = c.poll(&poll_options(Duration::ZERO)).await.unwrap();
    assert_eq!(xs.len(), 1);
    let d = xs.remove(0);
    assert_eq!(d.message().id(), message_id);
    assert_eq!(d.body(), "hello");
    assert_eq!(d.message().attribute_value("Author"), Some("x"));
    d.ack().await.unwrap();
}

#[tokio::test]
async fn test_unrequested_attributes_are_not_returned() {
    let (_broker, _handle, (p, c)) = make_test_queue(0).await;

    let message =
        Message::new("0", "hello").with_attribute("Owner", MessageAttribute::string("y"));
    p.send_message(&message).await.unwrap();

    let xs = c.poll(&poll_options(Duration::ZERO)).await.unwrap();
    assert_eq!(xs.len(), 1);
    assert!(xs[0].message().attributes().is_empty());
}

#[tokio::test]
async fn test_batch_preserves_order_and_ids() {
    let (_broker, _handle, (p, c)) = make_test_queue(0).await;

    let batches = partition(10, &MessageTemplate::default()).unwrap();
    let result = p.send_batch(&batches[0]).await.unwrap();
    assert!(result.is_complete());
    let entry_ids: Vec<_> = result.successful.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(entry_ids, ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]);

    let xs = c.poll(&poll_options(Duration::ZERO)).await.unwrap();
    let bodies: Vec<_> = xs.iter().map(Delivery::body).collect();
    let expected: Vec<_> = (0..10).map(|i| format!("ME$$AGE: {i}.")).collect();
    assert_eq!(bodies, expected);

    let message_ids: Vec<_> = xs.iter().map(|d| d.message().id()).collect();
    let sent_ids: Vec<_> = result
        .successful
        .iter()
        .map(|e| e.message_id.as_str())
        .collect();
    assert_eq!(message_ids, sent_ids);
}

/// A poll never returns more than the requested number of messages.
#[tokio::test]
async fn test_poll_respects_max_messages() {
    let (_broker, _handle, (p, c)) = make_test_queue(0).await;

    let batches = partition(20, &MessageTemplate::default()).unwrap();
    p.send_batches(&batches).await.unwrap();

    let options = PollOptions {
        max_messages: 3,
        ..poll_options(Duration::ZERO)
    };
    assert_eq!(c.poll(&options).await.unwrap().len(), 3);
    assert_eq!(c.poll(&poll_options(Duration::ZERO)).await.unwrap().len(), 10);
    assert_eq!(c.poll(&poll_options(Duration::ZERO)).await.unwrap().len(), 7);
    assert!(c.poll(&poll_options(Duration::ZERO)).await.unwrap().is_empty());
}

/// Messages sent to a queue with a delivery delay stay invisible until the
/// delay has passed; a long poll picks them up as soon as they are visible.
#[tokio::test(start_paused = true)]
async fn test_delay_is_honored() {
    let (_broker, _handle, (p, c)) = make_test_queue(5).await;

    let sent_at = Instant::now();
    p.send_message(&Message::new("0", "later")).await.unwrap();

    let xs = c.poll(&poll_options(Duration::from_secs(1))).await.unwrap();
    assert!(xs.is_empty());
    assert_elapsed(sent_at, Duration::from_secs(1));

    let xs = c.poll(&poll_options(Duration::from_secs(10))).await.unwrap();
    assert_eq!(xs.len(), 1);
    assert_elapsed(sent_at, Duration::from_secs(5));
}

/// An empty long poll returns after the wait time, a send wakes it early.
#[tokio::test(start_paused = true)]
async fn test_long_poll() {
    let (_broker, _handle, (p, c)) = make_test_queue(0).await;

    let now = Instant::now();
    let xs = c.poll(&poll_options(Duration::from_secs(10))).await.unwrap();
    assert!(xs.is_empty());
    assert_elapsed(now, Duration::from_secs(10));

    let sender = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        p.send_message(&Message::new("0", "wake up")).await.unwrap();
    });

    let now = Instant::now();
    let xs = c.poll(&poll_options(Duration::from_secs(10))).await.unwrap();
    assert_eq!(xs.len(), 1);
    assert_elapsed(now, Duration::from_secs(2));
    sender.await.unwrap();
}

#[tokio::test]
async fn test_nack_makes_message_visible_again() {
    let (broker, handle, (p, c)) = make_test_queue(0).await;
    let queue = queue_of(&broker, &handle);

    p.send_message(&Message::new("0", "again")).await.unwrap();

    let mut xs = c.poll(&poll_options(Duration::ZERO)).await.unwrap();
    assert_eq!(queue.approximate_number_of_messages_not_visible().unwrap(), 1);
    xs.remove(0).nack().await.unwrap();
    assert_eq!(queue.approximate_number_of_messages().unwrap(), 1);

    let mut xs = c.poll(&poll_options(Duration::ZERO)).await.unwrap();
    assert_eq!(xs.len(), 1);
    assert_eq!(xs[0].body(), "again");
    xs.remove(0).ack().await.unwrap();

    assert_eq!(queue.approximate_number_of_messages().unwrap(), 0);
    assert_eq!(queue.approximate_number_of_messages_not_visible().unwrap(), 0);
}

/// A failed acknowledgement hands the delivery back, but it cannot be used to
/// settle the message a second time.
#[tokio::test]
async fn test_cannot_ack_twice() {
    let (broker, handle, (p, c)) = make_test_queue(0).await;

    p.send_message(&Message::new("0", "doomed")).await.unwrap();
    let mut xs = c.poll(&poll_options(Duration::ZERO)).await.unwrap();

    broker.delete_queue(&handle.name).await.unwrap();

    let (e, d) = xs.remove(0).ack().await.unwrap_err();
    assert!(matches!(e, QueueError::QueueNotFound(_)));
    let (e, _) = d.ack().await.unwrap_err();
    assert!(matches!(e, QueueError::CannotAckOrNackTwice));
}

#[tokio::test]
async fn test_dynamic_pair() {
    let (broker, handle, _pair) = make_test_queue(0).await;
    let (p, mut c) = broker.dyn_pair(&handle).unwrap();

    let batches = partition(30, &MessageTemplate::default()).unwrap();
    let results = p.send_batches(&batches).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.successful.len() == 10));

    let mut bodies = Vec::new();
    loop {
        let xs = c.poll(&poll_options(Duration::ZERO)).await.unwrap();
        if xs.is_empty() {
            break;
        }
        for d in xs {
            bodies.push(d.body().to_owned());
            d.ack().await.unwrap();
        }
    }
    assert_eq!(bodies.len(), 30);
    assert_eq!(bodies[29], "ME$$AGE: 29.");
}

#[tokio::test]
async fn test_send_to_existing_queue_by_name() {
    let (broker, handle, _pair) = make_test_queue(0).await;

    let looked_up = broker.get_queue(&handle.name).await.unwrap();
    assert_eq!(looked_up, handle);

    let (p, c) = broker.pair(&looked_up).unwrap();
    let batch = Batch::new(vec![Message::new("only", "one")]).unwrap();
    p.send_batch(&batch).await.unwrap();
    assert_eq!(c.poll(&poll_options(Duration::ZERO)).await.unwrap().len(), 1);
}

/// The full flow of the command line tool: a delayed queue filled with 200
/// generated messages is drained with the echo handler.
#[tokio::test(start_paused = true)]
async fn test_fill_and_drain() {
    let (broker, handle, (p, mut c)) = make_test_queue(5).await;

    let template = MessageTemplate {
        attribute_value: "x".to_owned(),
        ..Default::default()
    };
    let batches = partition(200, &template).unwrap();
    assert_eq!(batches.len(), 20);
    let results = p.send_batches(&batches).await.unwrap();
    assert!(results.iter().all(|r| r.is_complete()));

    let mut handler = AttributeEchoHandler::new("Author", Vec::new());
    let config = DrainConfig {
        max_empty_polls: 4,
        poll: poll_options(Duration::from_secs(10)),
        empty_poll_policy: EmptyPollPolicy::NeverReset,
    };
    let summary = drain(&mut c, &mut handler, &config).await.unwrap();

    assert_eq!(summary.messages_processed, 200);
    assert_eq!(summary.empty_polls, 4);
    assert_eq!(summary.polls, 24);

    let out = String::from_utf8(handler.into_inner()).unwrap();
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 200);
    assert_eq!(lines[0], "AUTHOR: x \t | BODY: ME$$AGE: 0.");
    assert_eq!(lines[199], "AUTHOR: x \t | BODY: ME$$AGE: 199.");

    let queue = queue_of(&broker, &handle);
    assert_eq!(queue.approximate_number_of_messages().unwrap(), 0);
    assert_eq!(queue.approximate_number_of_messages_not_visible().unwrap(), 0);
}

/// Draining a queue that never receives anything stops after the configured
/// number of empty polls.
#[tokio::test(start_paused = true)]
async fn test_drain_empty_queue() {
    let (_broker, _handle, (_p, mut c)) = make_test_queue(0).await;

    let now = Instant::now();
    let mut handler = |d: Delivery| async move { d.ack().await.map_err(|(e, _)| e) };
    let config = DrainConfig {
        max_empty_polls: 3,
        poll: poll_options(Duration::from_secs(10)),
        ..Default::default()
    };
    let summary = drain(&mut c, &mut handler, &config).await.unwrap();

    assert_eq!(summary.messages_processed, 0);
    assert_eq!(summary.polls, 3);
    assert_elapsed(now, Duration::from_secs(30));
}

/// SQS long polls in whole seconds, so finer waits are refused up front
/// instead of being rounded down.
#[tokio::test]
async fn test_fractional_wait_is_rejected() {
    let (_broker, _handle, (_p, c)) = make_test_queue(0).await;

    let err = c
        .poll(&poll_options(Duration::from_millis(500)))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidArgument(_)));
}
