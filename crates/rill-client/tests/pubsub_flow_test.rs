//! End-to-end pub/sub flows against the in-memory broker.

use rill_client::{ClientError, ConnectionOptions, Event, EventStream, connect};
use rill_core::credentials::Credentials;
use rill_harness::Broker;
use tokio::sync::mpsc;

fn creds() -> Credentials {
    Credentials::new("read-key", "write-key", "admin-key").unwrap()
}

async fn next_event(events: &mut EventStream) -> Event {
    events.recv().await.expect("event stream ended early")
}

fn response_message(err: &ClientError) -> &str {
    match err {
        ClientError::Response(response) => &response.message,
        other => panic!("expected a response error, got {other:?}"),
    }
}

#[tokio::test]
async fn new_session_event_carries_the_session_id() {
    let (_broker, transport) = Broker::start();
    let (handle, mut events) = connect(transport, creds(), ConnectionOptions::default());

    let Event::NewSession { session_id } = next_event(&mut events).await else {
        panic!("expected the new session event first")
    };
    assert!(!session_id.is_empty());
    assert_eq!(handle.session_id().await.unwrap(), session_id);
}

#[tokio::test]
async fn subscription_lifecycle() {
    let (_broker, transport) = Broker::start();
    let (handle, _events) = connect(transport, creds(), ConnectionOptions::default());

    assert_eq!(handle.subscribe("news", None).await.unwrap(), vec!["news".to_string()]);
    assert_eq!(
        handle.subscribe("sport", None).await.unwrap(),
        vec!["news".to_string(), "sport".to_string()]
    );
    assert_eq!(
        handle.list_subscriptions().await.unwrap(),
        vec!["news".to_string(), "sport".to_string()]
    );

    assert_eq!(handle.unsubscribe("news").await.unwrap(), vec!["sport".to_string()]);

    let dropped = handle.unsubscribe_all().await.unwrap();
    assert_eq!(dropped, vec!["sport".to_string()]);
    assert!(handle.list_subscriptions().await.unwrap().is_empty());
}

#[tokio::test]
async fn resubscribing_does_not_duplicate() {
    let (_broker, transport) = Broker::start();
    let (handle, _events) = connect(transport, creds(), ConnectionOptions::default());

    handle.subscribe("news", None).await.unwrap();
    let list = handle.subscribe("news", None).await.unwrap();
    assert_eq!(list, vec!["news".to_string()]);
}

#[tokio::test]
async fn failed_mutation_leaves_subscriptions_untouched() {
    let (_broker, transport) = Broker::start();
    let (handle, _events) = connect(transport, creds(), ConnectionOptions::default());

    handle.subscribe("news", None).await.unwrap();

    let err = handle.unsubscribe("ghost").await.unwrap_err();
    assert_eq!(response_message(&err), "not subscribed to ghost");

    assert_eq!(handle.list_subscriptions().await.unwrap(), vec!["news".to_string()]);
}

#[tokio::test]
async fn published_messages_reach_subscribers() {
    let (_broker, transport) = Broker::start();
    let (publisher, _publisher_events) =
        connect(transport.clone(), creds(), ConnectionOptions::default());
    let (subscriber, mut events) = connect(transport, creds(), ConnectionOptions::default());

    subscriber.subscribe("news", None).await.unwrap();
    publisher.publish("news", "hello").await.unwrap();

    loop {
        match next_event(&mut events).await {
            Event::Message(message) => {
                assert_eq!(message.channel, "news");
                assert_eq!(message.message, "hello");
                break;
            }
            Event::NewSession { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn publish_with_ack_returns_the_message_id() {
    let (_broker, transport) = Broker::start();
    let (handle, mut events) = connect(transport, creds(), ConnectionOptions::default());

    handle.subscribe("news", None).await.unwrap();
    let message_id = handle.publish_with_ack("news", "hello").await.unwrap();
    assert!(!message_id.is_empty());

    loop {
        match next_event(&mut events).await {
            Event::Message(message) => {
                assert_eq!(message.message_id, message_id);
                break;
            }
            Event::NewSession { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn channel_handler_takes_precedence_over_the_event_stream() {
    let (broker, transport) = Broker::start();
    let (handle, mut events) = connect(transport, creds(), ConnectionOptions::default());

    let (handled_tx, mut handled_rx) = mpsc::unbounded_channel();
    let handler: rill_client::MessageHandler = Box::new(move |message| {
        let _ = handled_tx.send(message);
    });
    handle.subscribe("news", Some(handler)).await.unwrap();
    handle.subscribe("sport", None).await.unwrap();

    broker.push("news", "handled", false);
    broker.push("sport", "streamed", false);

    let handled = handled_rx.recv().await.unwrap();
    assert_eq!(handled.message, "handled");

    // Only the handlerless channel's message reaches the stream.
    loop {
        match next_event(&mut events).await {
            Event::Message(message) => {
                assert_eq!(message.channel, "sport");
                assert_eq!(message.message, "streamed");
                break;
            }
            Event::NewSession { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn ack_requested_messages_are_acknowledged() {
    let (broker, transport) = Broker::start();
    let (handle, _events) = connect(transport, creds(), ConnectionOptions::default());

    handle.subscribe("news", None).await.unwrap();
    let message_id = broker.push("news", "urgent", true);

    loop {
        if broker.acks().contains(&message_id) {
            break;
        }
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn close_is_terminal_and_idempotent() {
    let (_broker, transport) = Broker::start();
    let (handle, mut events) = connect(transport, creds(), ConnectionOptions::default());

    assert!(matches!(next_event(&mut events).await, Event::NewSession { .. }));

    handle.close().await;
    handle.close().await;

    let Event::Closed { error } = next_event(&mut events).await else {
        panic!("expected the closed event")
    };
    assert!(error.is_none());
    assert!(events.recv().await.is_none());

    let err = handle.subscribe("news", None).await.unwrap_err();
    assert_eq!(response_message(&err), "connection closed");
}

#[tokio::test]
async fn empty_channel_name_is_rejected_locally() {
    let (_broker, transport) = Broker::start();
    let (handle, _events) = connect(transport, creds(), ConnectionOptions::default());

    let err = handle.subscribe("", None).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let err = handle.publish("", "hello").await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}
