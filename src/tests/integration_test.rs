use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::client::engine::{MergeEngine, PushOutcome, spawn_engine};
use crate::client::tail::run_tail;
use crate::queue::{InMemoryQueueService, Message};
use crate::registry::SubscriptionRegistry;
use crate::tests::support::{fast_schedule, within};
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::transport::session::KeepAlive;
use crate::transport::websocket::serve;

fn ids(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.message_id.as_str()).collect()
}

#[tokio::test]
async fn integration_live_tail_end_to_end() {
    // short visibility so fetched messages keep coming back as duplicates
    let service = Arc::new(InMemoryQueueService::with_queues(
        ["orders", "payments"],
        Duration::from_millis(50),
    ));
    service.enqueue("orders", "late", 300).unwrap();
    service.enqueue("orders", "early", 100).unwrap();

    let registry = Arc::new(SubscriptionRegistry::new(service.clone(), fast_schedule()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(serve(listener, registry.clone(), KeepAlive::default()));

    // a raw client on the same queue, to feed a view that watches another queue
    let (mut raw, _) = connect_async(url.as_str()).await.expect("raw client connect");
    raw.send(
        ClientMessage::Subscribe {
            queue_id: "orders".to_string(),
        }
        .to_frame()
        .unwrap(),
    )
    .await
    .unwrap();

    let (handle, engine_task) = spawn_engine(MergeEngine::new());
    let tail = tokio::spawn({
        let handle = handle.clone();
        let url = url.clone();
        async move { run_tail(&url, "orders", &handle).await.map_err(|e| e.to_string()) }
    });

    let snapshot = within(async {
        loop {
            let messages = handle.ordered_messages().await.unwrap();
            if messages.len() == 2 {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert_eq!(ids(&snapshot), vec!["msg-000001", "msg-000002"]);

    service.enqueue("orders", "middle", 200).unwrap();
    let merged = within(async {
        loop {
            let messages = handle.ordered_messages().await.unwrap();
            if messages.len() == 3 {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert_eq!(ids(&merged), vec!["msg-000001", "msg-000003", "msg-000002"]);
    let bodies: Vec<_> = merged.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["late", "middle", "early"]);

    // redeliveries keep arriving but never grow the view
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(ids(&handle.ordered_messages().await.unwrap()), ids(&merged));

    let mut other_view = MergeEngine::new();
    other_view.select_queue("payments");
    let mut seen = 0;
    while seen < 2 {
        let frame = within(raw.next()).await.unwrap().unwrap();
        let WsMessage::Text(text) = frame else { continue };
        let push: ServerMessage = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(push.queue_id(), Some("orders"));
        assert_eq!(
            other_view.apply(push).unwrap(),
            PushOutcome::IgnoredOtherQueue
        );
        seen += 1;
    }
    assert!(other_view.view().is_empty());

    registry.shutdown();
    let received = within(tail).await.unwrap().unwrap();
    assert!(received >= 2);

    drop(handle);
    let engine = within(engine_task).await.unwrap();
    assert_eq!(engine.selected_queue(), Some("orders"));
    assert_eq!(engine.view().len(), 3);
}
