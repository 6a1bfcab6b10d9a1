use std::sync::Arc;

use pattern_jam::models::invite::InviteStatus;
use pattern_jam::models::participant::ParticipantRole;
use pattern_jam::models::session::{Session, SessionStatus};
use pattern_jam::models::user::UserSummary;
use pattern_jam::persistence::{
    db, invite_repo::InviteRepo, participant_repo::ParticipantRepo, session_repo::SessionRepo,
    user_repo::UserRepo,
};
use pattern_jam::AppError;

async fn fixture() -> (InviteRepo, UserRepo, Session) {
    let db = Arc::new(db::connect_memory().await.expect("db connect"));
    let sessions = SessionRepo::new(Arc::clone(&db));
    let session = Session::new("owner".into(), "Late Set".into(), "late-set-1".into());
    sessions.try_create_with_owner(&session).await.unwrap();
    (InviteRepo::new(Arc::clone(&db)), UserRepo::new(db), session)
}

#[tokio::test]
async fn upsert_creates_pending_invite() {
    let (invites, _, session) = fixture().await;
    let invite = invites
        .upsert_pending(&session.id, "owner", "guest")
        .await
        .expect("upsert");
    assert_eq!(invite.status, InviteStatus::Pending);
    assert_eq!(invite.invitee_id, "guest");
    assert!(invite.responded_at.is_none());
}

#[tokio::test]
async fn resolve_only_moves_pending_rows() {
    let (invites, _, session) = fixture().await;
    let invite = invites.upsert_pending(&session.id, "owner", "guest").await.unwrap();

    assert!(invites
        .resolve_pending(&invite.id, InviteStatus::Declined)
        .await
        .unwrap());
    assert!(!invites
        .resolve_pending(&invite.id, InviteStatus::Accepted)
        .await
        .unwrap());

    let stored = invites.get_by_id(&invite.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InviteStatus::Declined);
    assert!(stored.responded_at.is_some());
}

#[tokio::test]
async fn reinvite_resets_existing_row() {
    let (invites, _, session) = fixture().await;
    let first = invites.upsert_pending(&session.id, "owner", "guest").await.unwrap();
    invites
        .resolve_pending(&first.id, InviteStatus::Declined)
        .await
        .unwrap();

    let again = invites.upsert_pending(&session.id, "owner", "guest").await.unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.status, InviteStatus::Pending);
    assert!(again.responded_at.is_none());
    assert_eq!(invites.count_for_session(&session.id).await.unwrap(), 1);
}

#[tokio::test]
async fn pending_list_joins_session_and_inviter() {
    let (invites, users, session) = fixture().await;
    users
        .upsert(&UserSummary {
            id: "owner".into(),
            name: Some("Ada".into()),
            artist_name: Some("DJ Ada".into()),
        })
        .await
        .unwrap();
    let open = invites.upsert_pending(&session.id, "owner", "guest").await.unwrap();

    let listed = invites.list_pending_for_invitee("guest").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, open.id);
    assert_eq!(listed[0].session_slug, "late-set-1");
    assert_eq!(listed[0].session_title, "Late Set");
    assert_eq!(listed[0].inviter.display_name(), "DJ Ada");

    invites
        .resolve_pending(&open.id, InviteStatus::Accepted)
        .await
        .unwrap();
    assert!(invites.list_pending_for_invitee("guest").await.unwrap().is_empty());
}

async fn membership_fixture() -> (InviteRepo, ParticipantRepo, SessionRepo, Session) {
    let db = Arc::new(db::connect_memory().await.expect("db connect"));
    let sessions = SessionRepo::new(Arc::clone(&db));
    let session = Session::new("owner".into(), "Warehouse".into(), "warehouse-1".into());
    sessions.try_create_with_owner(&session).await.unwrap();
    (
        InviteRepo::new(Arc::clone(&db)),
        ParticipantRepo::new(db),
        sessions,
        session,
    )
}

#[tokio::test]
async fn accept_moves_invite_and_adds_member_together() {
    let (invites, participants, _, session) = membership_fixture().await;
    let invite = invites.upsert_pending(&session.id, "owner", "guest").await.unwrap();

    assert!(invites.accept_and_join(&invite.id).await.unwrap());

    let stored = invites.get_by_id(&invite.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InviteStatus::Accepted);
    assert!(stored.responded_at.is_some());
    let member = participants.get(&session.id, "guest").await.unwrap().unwrap();
    assert_eq!(member.role, ParticipantRole::Member);

    assert!(!invites.accept_and_join(&invite.id).await.unwrap());
    assert_eq!(participants.count_for_session(&session.id).await.unwrap(), 2);
}

#[tokio::test]
async fn accept_into_closed_session_writes_nothing() {
    let (invites, participants, sessions, session) = membership_fixture().await;
    let invite = invites.upsert_pending(&session.id, "owner", "guest").await.unwrap();
    sessions
        .update_status(&session.id, SessionStatus::Closed)
        .await
        .unwrap();

    let err = invites.accept_and_join(&invite.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {err:?}");

    let stored = invites.get_by_id(&invite.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InviteStatus::Pending);
    assert!(stored.responded_at.is_none());
    assert!(participants.get(&session.id, "guest").await.unwrap().is_none());

    sessions
        .update_status(&session.id, SessionStatus::Active)
        .await
        .unwrap();
    assert!(invites.accept_and_join(&invite.id).await.unwrap());
    assert!(participants.get(&session.id, "guest").await.unwrap().is_some());
}

#[tokio::test]
async fn accept_keeps_an_existing_membership() {
    let (invites, participants, _, session) = membership_fixture().await;
    let invite = invites.upsert_pending(&session.id, "owner", "owner").await.unwrap();

    assert!(invites.accept_and_join(&invite.id).await.unwrap());
    let owner = participants.get(&session.id, "owner").await.unwrap().unwrap();
    assert_eq!(owner.role, ParticipantRole::Owner);
}
