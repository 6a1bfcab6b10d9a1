use std::sync::Arc;

use pattern_jam::models::channel::{Channel, ChannelPayload, ChannelStatus};
use pattern_jam::models::session::Session;
use pattern_jam::models::user::UserSummary;
use pattern_jam::persistence::{
    channel_repo::ChannelRepo, db, revision_repo::RevisionRepo, session_repo::SessionRepo,
    user_repo::UserRepo,
};
use pattern_jam::AppError;

struct Fixture {
    channels: ChannelRepo,
    revisions: RevisionRepo,
    users: UserRepo,
    session: Session,
}

async fn fixture() -> Fixture {
    let db = Arc::new(db::connect_memory().await.expect("db connect"));
    let sessions = SessionRepo::new(Arc::clone(&db));
    let session = Session::new("owner".into(), "Jam".into(), "jam-chan".into());
    sessions.try_create_with_owner(&session).await.unwrap();
    Fixture {
        channels: ChannelRepo::new(Arc::clone(&db)),
        revisions: RevisionRepo::new(Arc::clone(&db)),
        users: UserRepo::new(db),
        session,
    }
}

fn channel(session_id: &str, name: &str, status: ChannelStatus, code: &str) -> Channel {
    let payload = ChannelPayload {
        name: Some(name.into()),
        status: Some(status),
        ..ChannelPayload::with_code(code)
    };
    Channel::from_payload(session_id.into(), "owner".into(), &payload, code)
}

#[tokio::test]
async fn insert_appends_revision() {
    let f = fixture().await;
    let ch = channel(&f.session.id, "bass", ChannelStatus::Live, "s(\"bd\")");
    f.channels.save_with_revision(&ch, true).await.expect("save");

    let stored = f.channels.get_by_id(&ch.id).await.unwrap().unwrap();
    assert_eq!(stored.code, "s(\"bd\")");
    assert_eq!(stored.status, ChannelStatus::Live);

    let history = f.revisions.list_for_channel(&ch.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].applied_to_master);
}

#[tokio::test]
async fn update_appends_newest_first() {
    let f = fixture().await;
    let mut ch = channel(&f.session.id, "lead", ChannelStatus::Draft, "note(\"c\")");
    f.channels.save_with_revision(&ch, true).await.unwrap();

    let payload = ChannelPayload::with_code("note(\"c e g\")");
    ch.apply_payload(&payload, "note(\"c e g\")");
    f.channels.save_with_revision(&ch, false).await.unwrap();

    let history = f.revisions.list_for_channel(&ch.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].code, "note(\"c e g\")");
    assert_eq!(history[1].code, "note(\"c\")");
    assert!(!history[0].applied_to_master);
    assert_eq!(f.revisions.count_for_session(&f.session.id).await.unwrap(), 2);
}

#[tokio::test]
async fn blank_code_is_rejected_before_writing() {
    let f = fixture().await;
    let mut ch = channel(&f.session.id, "pad", ChannelStatus::Live, "x");
    ch.code = "   ".into();

    let err = f.channels.save_with_revision(&ch, true).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(f.channels.count_for_session(&f.session.id).await.unwrap(), 0);
    assert_eq!(f.revisions.count_for_session(&f.session.id).await.unwrap(), 0);
}

#[tokio::test]
async fn views_sort_by_status_then_recency() {
    let f = fixture().await;
    f.users
        .upsert(&UserSummary {
            id: "owner".into(),
            name: Some("Ada".into()),
            artist_name: None,
        })
        .await
        .unwrap();

    let draft = channel(&f.session.id, "draft", ChannelStatus::Draft, "a");
    let live_old = channel(&f.session.id, "live-old", ChannelStatus::Live, "b");
    let published = channel(&f.session.id, "pub", ChannelStatus::Published, "c");
    let live_new = channel(&f.session.id, "live-new", ChannelStatus::Live, "d");
    for ch in [&draft, &live_old, &published, &live_new] {
        f.channels.save_with_revision(ch, true).await.unwrap();
    }

    let views = f.channels.list_views(&f.session.id).await.unwrap();
    let names: Vec<&str> = views.iter().filter_map(|v| v.name.as_deref()).collect();
    assert_eq!(names, vec!["pub", "live-new", "live-old", "draft"]);
    assert_eq!(views[0].author.display_name(), "Ada");
}

#[tokio::test]
async fn find_by_element_scopes_to_author() {
    let f = fixture().await;
    let payload = ChannelPayload {
        element_id: Some("el-1".into()),
        ..ChannelPayload::with_code("s(\"hh\")")
    };
    let ch = Channel::from_payload(f.session.id.clone(), "owner".into(), &payload, "s(\"hh\")");
    f.channels.save_with_revision(&ch, true).await.unwrap();

    let found = f
        .channels
        .find_by_element(&f.session.id, "owner", "el-1")
        .await
        .unwrap();
    assert_eq!(found.map(|c| c.id), Some(ch.id));
    assert!(f
        .channels
        .find_by_element(&f.session.id, "someone-else", "el-1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn mark_evaluated_stamps_only_given_channels() {
    let f = fixture().await;
    let a = channel(&f.session.id, "a", ChannelStatus::Live, "a");
    let b = channel(&f.session.id, "b", ChannelStatus::Draft, "b");
    f.channels.save_with_revision(&a, true).await.unwrap();
    f.channels.save_with_revision(&b, true).await.unwrap();

    f.channels.mark_evaluated(&[a.id.clone()]).await.unwrap();

    let a = f.channels.get_by_id(&a.id).await.unwrap().unwrap();
    let b = f.channels.get_by_id(&b.id).await.unwrap().unwrap();
    assert!(a.last_evaluated_at.is_some());
    assert!(b.last_evaluated_at.is_none());
}
