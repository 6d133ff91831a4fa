//! Streaming behaviour: reassembly, batching cadence, and per-message
//! failure handling as observed through the consumer event surface.

mod common;

use std::time::Duration;

use chatwire::ClientEvent;
use common::{connect_client, next_event, spawn_client, test_config};

#[tokio::test(start_paused = true)]
async fn chunks_coalesce_into_one_delta_and_complete() {
    let (client, mut events, connector) = spawn_client(test_config());
    let mut transport = connect_client(&client, &mut events, &connector).await;

    let id = client.send("question").await.expect("send should succeed");
    let (wire_id, content) = transport.written_text_message().await;
    assert_eq!(wire_id, id.as_str());
    assert_eq!(content, "question");

    // All three frames arrive inside one batch interval.
    transport.chunk(id.as_str(), "He");
    transport.chunk(id.as_str(), "llo");
    transport.complete(id.as_str());

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::TextDelta {
            id: id.clone(),
            delta: "Hello".to_owned(),
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::MessageComplete {
            id,
            text: "Hello".to_owned(),
        }
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn deltas_split_across_batch_intervals() {
    let (client, mut events, connector) = spawn_client(test_config());
    let mut transport = connect_client(&client, &mut events, &connector).await;

    let id = client.send("question").await.expect("send should succeed");
    let _ = transport.written_text_message().await;

    transport.chunk(id.as_str(), "He");
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::TextDelta {
            id: id.clone(),
            delta: "He".to_owned(),
        }
    );

    transport.chunk(id.as_str(), "llo");
    transport.complete(id.as_str());
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::TextDelta {
            id: id.clone(),
            delta: "llo".to_owned(),
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::MessageComplete {
            id,
            text: "Hello".to_owned(),
        }
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn many_chunks_concatenate_in_arrival_order() {
    let (client, mut events, connector) = spawn_client(test_config());
    let mut transport = connect_client(&client, &mut events, &connector).await;

    let id = client.send("question").await.expect("send should succeed");
    let _ = transport.written_text_message().await;

    let mut expected = String::new();
    for index in 0..40 {
        let piece = format!("part{index};");
        transport.chunk(id.as_str(), &piece);
        expected.push_str(&piece);
    }
    transport.complete(id.as_str());

    let mut assembled = String::new();
    loop {
        match next_event(&mut events).await {
            ClientEvent::TextDelta { delta, .. } => assembled.push_str(&delta),
            ClientEvent::MessageComplete {
                id: done,
                text,
            } => {
                assert_eq!(done, id);
                assert_eq!(text, expected);
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(assembled, expected);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn backend_error_fails_the_message_with_its_reason() {
    let (client, mut events, connector) = spawn_client(test_config());
    let mut transport = connect_client(&client, &mut events, &connector).await;

    let id = client.send("question").await.expect("send should succeed");
    let _ = transport.written_text_message().await;

    transport.chunk(id.as_str(), "partial");
    transport.error(id.as_str(), Some("overloaded"));

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::TextDelta {
            id: id.clone(),
            delta: "partial".to_owned(),
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::MessageFailed {
            id,
            reason: "overloaded".to_owned(),
        }
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn error_frame_without_reason_degrades_gracefully() {
    let (client, mut events, connector) = spawn_client(test_config());
    let mut transport = connect_client(&client, &mut events, &connector).await;

    let id = client.send("question").await.expect("send should succeed");
    let _ = transport.written_text_message().await;

    transport.error(id.as_str(), None);

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::MessageFailed {
            id,
            reason: "backend error".to_owned(),
        }
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_dropped_without_disturbing_the_stream() {
    let (client, mut events, connector) = spawn_client(test_config());
    let mut transport = connect_client(&client, &mut events, &connector).await;

    let id = client.send("question").await.expect("send should succeed");
    let _ = transport.written_text_message().await;

    transport.frame(r#"{"type":"status","message":"irrelevant"}"#);
    transport.frame("not json at all");
    transport.frame(r#"{"type":"chunk","content":7,"id":"bogus"}"#);
    transport.chunk(id.as_str(), "still ");
    transport.chunk(id.as_str(), "alive");
    transport.complete(id.as_str());

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::TextDelta {
            id: id.clone(),
            delta: "still alive".to_owned(),
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::MessageComplete {
            id,
            text: "still alive".to_owned(),
        }
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stalled_message_resolves_as_failure() {
    let config = test_config().stall_timeout(Duration::from_millis(200));
    let (client, mut events, connector) = spawn_client(config);
    let mut transport = connect_client(&client, &mut events, &connector).await;

    let id = client.send("question").await.expect("send should succeed");
    let _ = transport.written_text_message().await;

    transport.chunk(id.as_str(), "part");
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::TextDelta {
            id: id.clone(),
            delta: "part".to_owned(),
        }
    );

    // No completion ever arrives; the stall sweep resolves the message.
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::MessageFailed {
            id: id.clone(),
            reason: "stalled".to_owned(),
        }
    );

    // A late completion for the evicted identifier is ignored; a second
    // exchange proves the client is still healthy.
    transport.complete(id.as_str());
    let follow_up = client.send("again").await.expect("send should succeed");
    let _ = transport.written_text_message().await;
    transport.chunk(follow_up.as_str(), "ok");
    transport.complete(follow_up.as_str());

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::TextDelta {
            id: follow_up.clone(),
            delta: "ok".to_owned(),
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::MessageComplete {
            id: follow_up,
            text: "ok".to_owned(),
        }
    );

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_streams_resolve_independently() {
    let (client, mut events, connector) = spawn_client(test_config());
    let mut transport = connect_client(&client, &mut events, &connector).await;

    let first = client.send("one").await.expect("send should succeed");
    let _ = transport.written_text_message().await;
    let second = client.send("two").await.expect("send should succeed");
    let _ = transport.written_text_message().await;

    transport.chunk(first.as_str(), "alpha");
    transport.chunk(second.as_str(), "beta");
    transport.complete(second.as_str());

    // The second message resolves first; the first keeps streaming.
    let mut saw_second_complete = false;
    let mut first_delta = String::new();
    for _ in 0..3 {
        match next_event(&mut events).await {
            ClientEvent::TextDelta { id, delta } if id == first => first_delta.push_str(&delta),
            ClientEvent::TextDelta { id, delta } if id == second => {
                assert_eq!(delta, "beta");
            }
            ClientEvent::MessageComplete { id, text } => {
                assert_eq!(id, second);
                assert_eq!(text, "beta");
                saw_second_complete = true;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert!(saw_second_complete);

    transport.chunk(first.as_str(), " omega");
    transport.complete(first.as_str());
    loop {
        match next_event(&mut events).await {
            ClientEvent::TextDelta { id, delta } if id == first => first_delta.push_str(&delta),
            ClientEvent::MessageComplete { id, text } => {
                assert_eq!(id, first);
                assert_eq!(text, "alpha omega");
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(first_delta, "alpha omega");

    client.shutdown().await;
}
