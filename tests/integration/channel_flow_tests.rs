//! Channel writes, merge output, publishing and master overrides.

use pattern_jam::models::channel::{ChannelPayload, ChannelStatus};
use pattern_jam::AppError;

use super::test_helpers::{count_rows, live, manager, register, session_with};

#[tokio::test]
async fn empty_channel_is_left_out_of_the_merge() {
    let (manager, _db) = manager().await;
    register(&manager, "ada", "DJ Ada").await;
    register(&manager, "bob", "Bobby").await;
    let snapshot = session_with(&manager, "ada", &["bob"]).await;

    manager
        .upsert_channel(&snapshot.id, "ada", live("bass", "s(\"bd\")"))
        .await
        .unwrap();
    manager
        .upsert_channel(&snapshot.id, "bob", live("lead", "note(\"c e g\")"))
        .await
        .unwrap();
    let err = manager
        .upsert_channel(&snapshot.id, "bob", live("pad", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let master = manager
        .recompute_master(&snapshot.id)
        .await
        .unwrap()
        .expect("session exists");

    assert!(master.master_code.contains("// bass by DJ Ada\ns(\"bd\")"));
    assert!(master.master_code.contains("// lead by Bobby\nnote(\"c e g\")"));
    assert!(!master.master_code.contains("pad"));

    assert!(master.merged_stack.starts_with("stack(\n"));
    assert!(master.merged_stack.ends_with("\n)"));
    let entries: Vec<&str> = master
        .merged_stack
        .lines()
        .filter(|line| line.starts_with("  "))
        .collect();
    assert_eq!(entries.len(), 2);
    assert!(entries.contains(&"  s(\"bd\"),") || entries.contains(&"  s(\"bd\")"));

    let stored = manager.get_session_snapshot(&snapshot.id, true).await.unwrap();
    assert_eq!(stored.master_code, master.master_code);
    assert_eq!(stored.merged_stack, master.merged_stack);
    assert!(stored
        .channels
        .iter()
        .all(|channel| channel.last_evaluated_at.is_some()));
}

#[tokio::test]
async fn whitespace_code_writes_nothing() {
    let (manager, db) = manager().await;
    let snapshot = manager.create_session("ada", "Blank").await.unwrap();

    let err = manager
        .upsert_channel(&snapshot.id, "ada", live("pad", " \n\t "))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(count_rows(&db, "channel", &snapshot.id).await, 0);
    assert_eq!(count_rows(&db, "channel_revision", &snapshot.id).await, 0);
    assert!(!manager.scheduler().is_pending(&snapshot.id).await);
}

#[tokio::test]
async fn only_participants_write_channels() {
    let (manager, db) = manager().await;
    let snapshot = manager.create_session("ada", "Members").await.unwrap();

    let err = manager
        .upsert_channel(&snapshot.id, "mallory", live("x", "s(\"bd\")"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
    assert_eq!(count_rows(&db, "channel", &snapshot.id).await, 0);
}

#[tokio::test]
async fn only_the_author_edits_a_channel() {
    let (manager, _db) = manager().await;
    let snapshot = session_with(&manager, "ada", &["bob"]).await;

    let after = manager
        .upsert_channel(&snapshot.id, "ada", live("bass", "s(\"bd\")"))
        .await
        .unwrap();
    let channel_id = after.channels[0].id.clone();

    let hijack = ChannelPayload {
        id: Some(channel_id),
        ..ChannelPayload::with_code("s(\"hh\")")
    };
    let err = manager
        .upsert_channel(&snapshot.id, "bob", hijack)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn element_id_updates_the_same_channel() {
    let (manager, _db) = manager().await;
    let snapshot = manager.create_session("ada", "Elements").await.unwrap();

    let first = ChannelPayload {
        element_id: Some("el-7".into()),
        volume: Some(3.0),
        ..ChannelPayload::with_code("s(\"bd\")")
    };
    manager
        .upsert_channel(&snapshot.id, "ada", first)
        .await
        .unwrap();

    let second = ChannelPayload {
        element_id: Some("el-7".into()),
        pan: Some(-4.0),
        ..ChannelPayload::with_code("  s(\"bd sd\")  ")
    };
    let after = manager
        .upsert_channel(&snapshot.id, "ada", second)
        .await
        .unwrap();

    assert_eq!(after.channels.len(), 1);
    let channel = &after.channels[0];
    assert_eq!(channel.code, "s(\"bd sd\")");
    assert!((channel.volume - 1.0).abs() < f64::EPSILON);
    assert!((channel.pan + 1.0).abs() < f64::EPSILON);
    assert_eq!(channel.status, ChannelStatus::Draft);

    let history = manager.channel_history(&channel.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].code, "s(\"bd sd\")");
}

#[tokio::test]
async fn unknown_channel_id_is_not_found() {
    let (manager, _db) = manager().await;
    let snapshot = manager.create_session("ada", "Unknown").await.unwrap();

    let payload = ChannelPayload {
        id: Some("missing".into()),
        ..ChannelPayload::with_code("s(\"bd\")")
    };
    let err = manager
        .upsert_channel(&snapshot.id, "ada", payload)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = manager
        .publish_channel(&snapshot.id, "missing", ChannelStatus::Live)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = manager.channel_history("missing", 10).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn publishing_a_draft_brings_it_into_the_master() {
    let (manager, _db) = manager().await;
    let snapshot = manager.create_session("ada", "Publish").await.unwrap();

    let draft = ChannelPayload {
        name: Some("hats".into()),
        ..ChannelPayload::with_code("s(\"hh*8\")")
    };
    let after = manager
        .upsert_channel(&snapshot.id, "ada", draft)
        .await
        .unwrap();
    let channel_id = after.channels[0].id.clone();

    let drafted = manager.recompute_master(&snapshot.id).await.unwrap().unwrap();
    assert!(drafted.master_code.is_empty());
    assert!(drafted.merged_stack.is_empty());

    let published = manager
        .publish_channel(&snapshot.id, &channel_id, ChannelStatus::Published)
        .await
        .unwrap();
    assert_eq!(published.channels[0].status, ChannelStatus::Published);

    manager.flush().await;
    let settled = manager.get_session_snapshot(&snapshot.id, true).await.unwrap();
    assert!(settled.master_code.contains("// hats by anonymous"));
    assert_eq!(settled.merged_stack, "stack(\n  s(\"hh*8\")\n)");

    let history = manager.channel_history(&channel_id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].applied_to_master);
}

#[tokio::test]
async fn override_is_transient() {
    let (manager, _db) = manager().await;
    let snapshot = session_with(&manager, "ada", &["bob"]).await;
    manager
        .upsert_channel(&snapshot.id, "ada", live("bass", "s(\"bd\")"))
        .await
        .unwrap();
    manager.flush().await;

    let overridden = manager
        .override_master_code(&snapshot.id, "bob", "  s(\"cp\")  ")
        .await
        .unwrap();
    assert_eq!(overridden.master_code, "s(\"cp\")");
    assert_eq!(overridden.merged_stack, "s(\"cp\")");

    let err = manager
        .override_master_code(&snapshot.id, "mallory", "s(\"cp\")")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = manager
        .override_master_code(&snapshot.id, "ada", "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let recomputed = manager.recompute_master(&snapshot.id).await.unwrap().unwrap();
    assert!(recomputed.master_code.contains("s(\"bd\")"));
    let after = manager.get_session_snapshot(&snapshot.id, false).await.unwrap();
    assert_eq!(after.master_code, recomputed.master_code);
}
