use super::engine::{MergeEngine, PushOutcome, spawn_engine};
use super::tail::render;
use super::view::MessageView;
use crate::queue::Message;
use crate::queue::message::SENT_TIMESTAMP;
use crate::transport::message::ServerMessage;
use crate::utils::error::ViewError;

fn msg(id: &str, sent: i64) -> Message {
    Message::new(id, format!("body-{id}")).with_sent_time(sent)
}

fn live(queue: &str, messages: Vec<Message>) -> ServerMessage {
    ServerMessage::Messages {
        queue_id: queue.to_string(),
        messages,
    }
}

fn initial(queue: &str, messages: Vec<Message>) -> ServerMessage {
    ServerMessage::InitialMessages {
        queue_id: queue.to_string(),
        messages,
    }
}

#[test]
fn test_replace_sorts_newest_first() {
    let mut view = MessageView::new();
    view.replace(vec![msg("1", 100), msg("2", 300)]);
    assert_eq!(view.ids(), vec!["2", "1"]);
}

#[test]
fn test_merge_skips_duplicates_and_resorts() {
    let mut view = MessageView::new();
    view.replace(vec![msg("1", 100), msg("2", 300)]);

    let added = view.merge(vec![msg("1", 100), msg("3", 200)]);
    assert_eq!(added, 1);
    assert_eq!(view.ids(), vec!["2", "3", "1"]);
}

#[test]
fn test_duplicate_keeps_first_copy() {
    let mut view = MessageView::new();
    view.replace(vec![Message::new("1", "original").with_sent_time(100)]);
    view.merge(vec![Message::new("1", "replayed").with_sent_time(900)]);

    assert_eq!(view.len(), 1);
    assert_eq!(view.ordered_messages()[0].body, "original");
}

#[test]
fn test_replace_discards_previous_view() {
    let mut view = MessageView::new();
    view.replace(vec![msg("1", 100), msg("2", 200)]);
    view.replace(vec![msg("9", 50)]);
    assert_eq!(view.ids(), vec!["9"]);
    assert!(!view.contains("1"));
}

#[test]
fn test_missing_timestamp_sorts_last() {
    let mut view = MessageView::new();
    view.replace(vec![msg("1", 100), msg("2", 300)]);

    view.prepend(vec![Message::new("undated", "?")]);
    assert_eq!(view.ids(), vec!["2", "1", "undated"]);

    // a later merge of older messages still leaves it at the bottom
    view.append(vec![msg("0", 1)]);
    assert_eq!(view.ids().last(), Some(&"undated"));

    let garbage = Message::new("garbage", "?").with_attribute(SENT_TIMESTAMP, "not-a-time");
    view.merge(vec![garbage]);
    let ids = view.ids();
    assert_eq!(&ids[ids.len() - 2..], &["undated", "garbage"]);
}

#[test]
fn test_equal_timestamps_keep_insertion_order() {
    let mut view = MessageView::new();
    view.replace(vec![msg("a", 100), msg("b", 100)]);
    view.merge(vec![msg("c", 100), msg("d", 200)]);
    assert_eq!(view.ids(), vec!["d", "a", "b", "c"]);
}

#[test]
fn test_append_and_prepend_reach_the_same_view() {
    let batches = [
        vec![msg("1", 10), msg("2", 20)],
        vec![msg("3", 15), msg("2", 20)],
        vec![msg("4", 5)],
    ];

    let mut appended = MessageView::new();
    let mut prepended = MessageView::new();
    for batch in &batches {
        appended.append(batch.clone());
        prepended.prepend(batch.clone());
    }
    assert_eq!(appended.ids(), prepended.ids());
    assert_eq!(appended.ids(), vec!["2", "3", "1", "4"]);
}

#[test]
fn test_engine_routes_initial_and_live_pushes() {
    let mut engine = MergeEngine::new();
    engine.select_queue("orders");

    let outcome = engine
        .apply(initial("orders", vec![msg("1", 100), msg("2", 300)]))
        .unwrap();
    assert_eq!(outcome, PushOutcome::Replaced { count: 2 });

    let outcome = engine
        .apply(live("orders", vec![msg("1", 100), msg("3", 200)]))
        .unwrap();
    assert_eq!(outcome, PushOutcome::Merged { added: 1 });

    let ids: Vec<_> = engine
        .ordered_messages()
        .into_iter()
        .map(|m| m.message_id)
        .collect();
    assert_eq!(ids, vec!["2", "3", "1"]);

    // a fresh snapshot replaces rather than merges
    engine
        .apply(initial("orders", vec![msg("7", 700)]))
        .unwrap();
    assert_eq!(engine.view().ids(), vec!["7"]);
}

#[test]
fn test_engine_ignores_other_queues() {
    let mut engine = MergeEngine::new();
    engine.select_queue("orders");
    engine.replace(vec![msg("1", 100)]);

    let outcome = engine
        .apply(live("payments", vec![msg("x", 999)]))
        .unwrap();
    assert_eq!(outcome, PushOutcome::IgnoredOtherQueue);
    assert_eq!(engine.view().ids(), vec!["1"]);

    // nothing selected: everything is someone else's queue
    let mut idle = MergeEngine::new();
    assert_eq!(
        idle.apply(live("orders", vec![msg("1", 1)])).unwrap(),
        PushOutcome::IgnoredOtherQueue
    );
    assert!(idle.view().is_empty());
}

#[test]
fn test_selecting_a_queue_discards_the_view() {
    let mut engine = MergeEngine::new();
    engine.select_queue("orders");
    engine.replace(vec![msg("1", 100)]);

    engine.select_queue("payments");
    assert_eq!(engine.selected_queue(), Some("payments"));
    assert!(engine.view().is_empty());
}

#[test]
fn test_pause_discards_and_resume_does_not_replay() {
    let mut engine = MergeEngine::new();
    engine.select_queue("orders");
    engine.replace(vec![msg("1", 100)]);

    engine.pause();
    assert!(engine.is_paused());
    let outcome = engine
        .apply(live("orders", vec![msg("2", 200)]))
        .unwrap();
    assert_eq!(outcome, PushOutcome::IgnoredPaused);
    assert_eq!(engine.view().ids(), vec!["1"]);

    engine.resume();
    engine
        .apply(live("orders", vec![msg("3", 300)]))
        .unwrap();

    // the push skipped while paused stays absent
    assert_eq!(engine.view().ids(), vec!["3", "1"]);
    assert!(!engine.view().contains("2"));
}

#[test]
fn test_malformed_push_leaves_view_unchanged() {
    let mut engine = MergeEngine::new();
    engine.select_queue("orders");
    engine.replace(vec![msg("1", 100)]);

    let err = engine.apply_text("{\"type\":\"messages\",\"queueId\":").unwrap_err();
    assert!(matches!(err, ViewError::Malformed(_)));

    let err = engine
        .apply_text(r#"{"type":"messages","queueId":"orders","messages":[{"body":"no id"}]}"#)
        .unwrap_err();
    assert!(matches!(err, ViewError::Malformed(_)));

    // one bad message poisons the whole batch
    let err = engine
        .apply(live("orders", vec![msg("2", 200), Message::new("", "blank")]))
        .unwrap_err();
    assert!(matches!(err, ViewError::MissingMessageId(1)));

    assert_eq!(engine.view().ids(), vec!["1"]);
}

#[test]
fn test_apply_text_accepts_wire_payload() {
    let mut engine = MergeEngine::new();
    engine.select_queue("orders");

    let text = r#"{
        "type": "initial_messages",
        "queueId": "orders",
        "messages": [
            {"messageId": "a", "body": "x", "attributes": {"SentTimestamp": "5"}, "receiptHandle": "a#1"},
            {"messageId": "b", "body": "y", "attributes": {"SentTimestamp": "9"}, "receiptHandle": "b#1"}
        ]
    }"#;
    assert_eq!(
        engine.apply_text(text).unwrap(),
        PushOutcome::Replaced { count: 2 }
    );
    assert_eq!(engine.view().ids(), vec!["b", "a"]);

    let notice = engine
        .apply_text(r#"{"type":"error","message":"bad"}"#)
        .unwrap();
    assert_eq!(notice, PushOutcome::Notice("bad".to_string()));
}

#[tokio::test]
async fn test_spawned_engine_serializes_commands() {
    let (handle, task) = spawn_engine(MergeEngine::new());
    let mut revisions = handle.revisions();

    handle.select_queue("orders").unwrap();
    handle
        .push(initial("orders", vec![msg("1", 100), msg("2", 300)]))
        .unwrap();
    handle.pause().unwrap();
    handle.push(live("orders", vec![msg("4", 400)])).unwrap();
    handle.resume().unwrap();
    handle.append(vec![msg("0", 50)]).unwrap();
    handle
        .push_text(r#"{"type":"messages","queueId":"orders","messages":[{"messageId":"3","body":"b","attributes":{"SentTimestamp":"200"}}]}"#)
        .unwrap();
    handle.push_text("not json").unwrap();

    let ids: Vec<_> = handle
        .ordered_messages()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.message_id)
        .collect();
    assert_eq!(ids, vec!["2", "3", "1", "0"]);

    assert!(revisions.has_changed().unwrap());
    assert_eq!(*revisions.borrow_and_update(), 4);

    let revisions_probe = handle.revisions();
    drop(handle);
    drop(revisions_probe);
    let engine = task.await.unwrap();
    assert_eq!(engine.view().len(), 4);
}

#[test]
fn test_render_lists_messages_in_view_order() {
    let mut view = MessageView::new();
    view.replace(vec![msg("1", 0), Message::new("2", "undated")]);

    let text = render(&view.ordered_messages());
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("1970-01-01 00:00:00.000  1  body-1"));
    assert!(lines[1].starts_with("-  2  undated"));
}
