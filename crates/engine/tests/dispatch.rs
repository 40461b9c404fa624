mod common;

use common::{eventually, harness, settings};
use serde_json::json;
use vaultlab_engine::{ClickOutcome, DispatchError, DispatchOutcome, PluginError, ViewBody};
use vaultlab_types::{OperationId, Speaker};

fn panel_settings() -> serde_json::Value {
    settings(json!({
        "hello_world": {"active": true, "label": "Hello world", "mode": "insert-text"},
        "similar": {"active": true, "label": "Similar", "mode": "panel"},
        "chat": {"active": true, "label": "Chat", "mode": "conversation"}
    }))
}

#[tokio::test]
async fn error_response_changes_nothing() {
    let h = harness(Some(panel_settings()), &["hello_world", "similar"]);
    h.plugin.load().await.unwrap();
    h.remote.reply("similar", json!({"contents": [{"path": "notes/a.md", "name": "a"}]}));
    h.plugin.invoke(&OperationId::from("similar")).await.unwrap();
    let before = h.slots.view("vaultlab_similar").unwrap();

    h.remote.reply("similar", json!({"errors": true, "message": "boom"}));
    h.remote.reply("hello_world", json!({"errors": true, "message": "boom"}));

    let err = h.plugin.invoke(&OperationId::from("similar")).await.unwrap_err();
    assert!(matches!(err, PluginError::Dispatch(DispatchError::Application { .. })));
    h.plugin.invoke(&OperationId::from("hello_world")).await.unwrap_err();

    assert_eq!(h.slots.view("vaultlab_similar").unwrap(), before);
    assert_eq!(h.editor.text(), "hello");
    assert_eq!(h.notifier.notices(), vec!["boom".to_string(), "boom".to_string()]);
}

#[tokio::test]
async fn clicking_a_missing_item_heals_the_panel() {
    let h = harness(Some(panel_settings()), &["similar"]);
    h.plugin.load().await.unwrap();
    h.remote.reply(
        "similar",
        json!({"contents": [{"path": "/vault/gone.md", "name": "gone"}, {"path": "/vault/notes/b.md", "basename": "b"}]}),
    );
    let id = OperationId::from("similar");
    h.plugin.invoke(&id).await.unwrap();

    let outcome = h.plugin.click_item(&id, "/vault/gone.md", false).await.unwrap();
    assert_eq!(outcome, ClickOutcome::Removed { path: "gone.md".into() });
    assert_eq!(h.notifier.notices(), vec!["'gone.md' not found".to_string()]);
    let view = h.slots.view("vaultlab_similar").unwrap();
    let paths: Vec<_> = view.items().iter().map(|item| item.path.as_str()).collect();
    assert_eq!(paths, ["/vault/notes/b.md"]);

    let outcome = h.plugin.click_item(&id, "/vault/notes/b.md", true).await.unwrap();
    assert_eq!(outcome, ClickOutcome::Opened { path: "notes/b.md".into() });
    assert_eq!(h.vault.opened(), vec![("notes/b.md".to_string(), true)]);
}

#[tokio::test]
async fn focus_change_fires_subscribed_operations() {
    let stored = settings(json!({
        "similar": {"active": true, "label": "Similar", "mode": "panel", "invokeOnFocus": true},
        "hello_world": {"active": true, "label": "Hello", "mode": "insert-text"}
    }));
    let h = harness(Some(stored), &["similar", "hello_world"]);
    h.remote.reply("similar", json!({"contents": [{"path": "notes/a.md", "name": "a"}]}));
    h.plugin.load().await.unwrap();

    h.editor.set_active_document(Some("notes/b.md"));
    h.plugin.notify_focus_change(Some("notes/b.md")).await;

    let remote = h.remote.clone();
    assert!(eventually(|| remote.calls().len() == 1).await);
    let (url, context) = h.remote.calls().remove(0);
    assert_eq!(url, "http://localhost:5000/similar");
    assert_eq!(context.note_path.as_deref(), Some("notes/b.md"));

    let slots = h.slots.clone();
    assert!(eventually(|| slots.view("vaultlab_similar").is_some_and(|view| view.items().len() == 1)).await);

    h.plugin.notify_focus_change(None).await;
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert_eq!(h.remote.calls().len(), 1);
}

#[tokio::test]
async fn focus_trigger_never_fires_text_operations() {
    let stored = settings(json!({
        "hello_world": {"active": true, "label": "Hello", "mode": "insert-text", "invokeOnFocus": true},
        "to_upper_case": {"active": true, "label": "Upper", "mode": "replace-text", "invokeOnFocus": true}
    }));
    let h = harness(Some(stored), &["hello_world", "to_upper_case"]);
    h.remote.reply("hello_world", json!({"contents": " INSERTED"}));
    h.remote.reply("to_upper_case", json!({"contents": "REPLACED"}));
    h.plugin.load().await.unwrap();
    assert_eq!(h.plugin.commands().await.len(), 2);

    h.editor.set_active_document(Some("notes/b.md"));
    h.plugin.notify_focus_change(Some("notes/b.md")).await;
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    assert!(h.remote.calls().is_empty());
    assert_eq!(h.editor.mutation_count(), 0);
    assert_eq!(h.editor.text(), "hello");
}

#[tokio::test]
async fn response_for_torn_down_surface_is_discarded() {
    let h = harness(Some(panel_settings()), &["similar"]);
    h.plugin.load().await.unwrap();
    h.remote.reply("similar", json!({"contents": [{"path": "notes/a.md"}]}));
    let gate = h.remote.hold("similar");

    let plugin = h.plugin.clone();
    let in_flight = tokio::spawn(async move { plugin.invoke(&OperationId::from("similar")).await });
    let remote = h.remote.clone();
    assert!(eventually(|| remote.calls().len() == 1).await);

    h.plugin.refresh().await.unwrap();
    gate.notify_one();

    let outcome = in_flight.await.unwrap().unwrap();
    assert_eq!(outcome, DispatchOutcome::Discarded);
    let view = h.slots.view("vaultlab_similar").unwrap();
    assert_eq!(view.body, ViewBody::Empty);
}

#[tokio::test]
async fn conversation_appends_turns() {
    let h = harness(Some(panel_settings()), &["chat", "hello_world"]);
    h.plugin.load().await.unwrap();
    h.remote.reply("chat", json!({"contents": "pong"}));
    let chat = OperationId::from("chat");

    assert_eq!(h.plugin.invoke(&chat).await.unwrap(), DispatchOutcome::Revealed);
    assert_eq!(h.slots.record("vaultlab_chat").unwrap().reveals, 1);

    h.plugin.submit_message(&chat, "ping").await.unwrap();
    h.plugin.submit_message(&chat, "again").await.unwrap();
    let view = h.slots.view("vaultlab_chat").unwrap();
    let ViewBody::Transcript(turns) = view.body else {
        panic!("expected a transcript");
    };
    let speakers: Vec<_> = turns.iter().map(|turn| turn.speaker).collect();
    assert_eq!(speakers, [Speaker::User, Speaker::Remote, Speaker::User, Speaker::Remote]);
    assert_eq!(h.remote.calls()[1].1.text.as_deref(), Some("again"));

    let err = h
        .plugin
        .submit_message(&OperationId::from("hello_world"), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::WrongMode { .. }));
}

#[tokio::test]
async fn closed_panel_reopens_on_next_invocation() {
    let h = harness(Some(panel_settings()), &["similar"]);
    h.plugin.load().await.unwrap();
    let id = OperationId::from("similar");
    h.remote.reply("similar", json!({"contents": [{"path": "notes/a.md"}]}));
    h.plugin.invoke(&id).await.unwrap();

    h.plugin.clear_panel(&id).await.unwrap();
    assert!(h.slots.view("vaultlab_similar").unwrap().items().is_empty());

    h.plugin.close_panel(&id).await.unwrap();
    assert!(h.slots.slot_ids().is_empty());
    assert!(h.plugin.attached_surfaces().await.is_empty());

    h.plugin.invoke(&id).await.unwrap();
    assert_eq!(h.slots.slot_ids(), vec!["vaultlab_similar".to_string()]);
    assert_eq!(h.slots.view("vaultlab_similar").unwrap().items().len(), 1);
}

#[tokio::test]
async fn inactive_operations_cannot_be_invoked() {
    let h = harness(Some(panel_settings()), &["hello_world", "random"]);
    h.plugin.load().await.unwrap();
    let err = h.plugin.invoke(&OperationId::from("random")).await.unwrap_err();
    assert!(matches!(err, PluginError::NotActive { .. }));
    assert!(h.remote.calls().is_empty());
}
