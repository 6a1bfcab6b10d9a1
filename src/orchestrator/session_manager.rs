//! Session facade: the public operation surface.
//!
//! Composes persistence, the snapshot cache, the merge engine, the
//! debounced scheduler, the resource sampler and the invite workflow.
//! Every mutating operation ends with a forced snapshot reload, which also
//! emits [`SessionEvent::SessionUpdated`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::cache::{MemorySnapshotStore, SnapshotCache, SnapshotStore};
use crate::config::GlobalConfig;
use crate::merge;
use crate::models::channel::{Channel, ChannelPayload, ChannelStatus};
use crate::models::invite::{Invite, InviteDecision};
use crate::models::revision::ChannelRevision;
use crate::models::session::{generate_slug, Session, SessionStatus};
use crate::models::snapshot::{
    InviteResponse, InviteSummary, MasterUpdate, SessionSnapshot, SessionSummary,
};
use crate::models::user::UserSummary;
use crate::persistence::channel_repo::ChannelRepo;
use crate::persistence::db::{self, Database};
use crate::persistence::invite_repo::InviteRepo;
use crate::persistence::participant_repo::ParticipantRepo;
use crate::persistence::revision_repo::RevisionRepo;
use crate::persistence::session_repo::SessionRepo;
use crate::persistence::user_repo::UserRepo;
use crate::{AppError, Result};

use super::events::{EventBus, SessionEvent};
use super::invite_workflow;
use super::refresh_scheduler::RefreshScheduler;
use super::resource_sampler::ResourceSampler;

/// Attempts at finding a free slug before giving up.
const SLUG_ATTEMPTS: usize = 5;

/// Long-lived owner of all per-process session state.
///
/// Cheap to clone; clones share the cache, the scheduler and the event bus.
#[derive(Clone)]
pub struct SessionManager {
    config: Arc<GlobalConfig>,
    sessions: SessionRepo,
    participants: ParticipantRepo,
    channels: ChannelRepo,
    revisions: RevisionRepo,
    invites: InviteRepo,
    users: UserRepo,
    cache: SnapshotCache,
    scheduler: Arc<RefreshScheduler>,
    sampler: ResourceSampler,
    events: EventBus,
}

impl SessionManager {
    /// Connect to the configured database and build a manager.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the database cannot be opened.
    pub async fn connect(config: GlobalConfig) -> Result<Self> {
        let db = db::connect(&config.database_path).await?;
        Ok(Self::new(Arc::new(config), Arc::new(db)))
    }

    /// Build a manager over an open database with an in-process cache.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>, db: Arc<Database>) -> Self {
        Self::with_store(config, db, MemorySnapshotStore::new_shared())
    }

    /// Build a manager with a caller-provided snapshot store.
    #[must_use]
    pub fn with_store(
        config: Arc<GlobalConfig>,
        db: Arc<Database>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            cache: SnapshotCache::new(Arc::clone(&db), store, config.snapshot_ttl()),
            sessions: SessionRepo::new(Arc::clone(&db)),
            participants: ParticipantRepo::new(Arc::clone(&db)),
            channels: ChannelRepo::new(Arc::clone(&db)),
            revisions: RevisionRepo::new(Arc::clone(&db)),
            invites: InviteRepo::new(Arc::clone(&db)),
            users: UserRepo::new(db),
            scheduler: RefreshScheduler::new(),
            sampler: ResourceSampler::new(&config.sampler),
            events: EventBus::new(),
            config,
        }
    }

    /// Subscribe to session and master events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The debounced refresh scheduler shared by all clones.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Mirror an account from the identity provider.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a blank id, `AppError::Db` on
    /// persistence failure.
    pub async fn register_user(&self, user: UserSummary) -> Result<UserSummary> {
        if user.id.trim().is_empty() {
            return Err(AppError::Validation("user id must not be empty".into()));
        }
        self.users.upsert(&user).await
    }

    /// Resolve an id or slug to the canonical session id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a lookup fails.
    pub async fn resolve(&self, identifier: &str) -> Result<Option<String>> {
        self.cache.resolve(identifier).await
    }

    /// Create a session owned by `owner_id`, with its owner participant.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a blank title or owner,
    /// `AppError::Db` on persistence failure or slug exhaustion.
    pub async fn create_session(
        &self,
        owner_id: &str,
        title: &str,
    ) -> Result<Arc<SessionSnapshot>> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("session title must not be empty".into()));
        }
        if owner_id.trim().is_empty() {
            return Err(AppError::Validation("owner id must not be empty".into()));
        }

        for attempt in 1..=SLUG_ATTEMPTS {
            let session = Session::new(owner_id.to_owned(), title.to_owned(), generate_slug(title));
            if self.sessions.try_create_with_owner(&session).await? {
                info!(session_id = %session.id, slug = %session.slug, owner_id, "session created");
                return self.refresh_snapshot(&session.id).await;
            }
            debug!(slug = %session.slug, attempt, "slug collision, retrying");
        }

        Err(AppError::Db(format!(
            "could not allocate a unique slug after {SLUG_ATTEMPTS} attempts"
        )))
    }

    /// Snapshot for an id or slug, served from cache when fresh enough.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown identifier.
    pub async fn get_session_snapshot(
        &self,
        id_or_slug: &str,
        force_refresh: bool,
    ) -> Result<Arc<SessionSnapshot>> {
        let session_id = self.require_session_id(id_or_slug).await?;
        if force_refresh {
            return self.refresh_snapshot(&session_id).await;
        }
        self.cache
            .get(&session_id, false)
            .await?
            .ok_or_else(|| not_found(id_or_slug))
    }

    /// Add `user_id` as a member; an existing participant keeps its role.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown session and
    /// `AppError::Validation` if the session is closed.
    pub async fn join_session(
        &self,
        id_or_slug: &str,
        user_id: &str,
    ) -> Result<Arc<SessionSnapshot>> {
        let session = self.require_session(id_or_slug).await?;
        ensure_active(&session)?;

        if self.participants.upsert_member(&session.id, user_id).await? {
            info!(session_id = %session.id, user_id, "participant joined");
        }
        self.refresh_snapshot(&session.id).await
    }

    /// Remove `user_id` from the session. Not being a member is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown session and
    /// `AppError::Validation` when the owner tries to leave.
    pub async fn leave_session(
        &self,
        id_or_slug: &str,
        user_id: &str,
    ) -> Result<Arc<SessionSnapshot>> {
        let session = self.require_session(id_or_slug).await?;
        if session.is_owner(user_id) {
            return Err(AppError::Validation(
                "the owner cannot leave; delete the session instead".into(),
            ));
        }

        if self.participants.remove(&session.id, user_id).await? {
            info!(session_id = %session.id, user_id, "participant left");
        }
        self.refresh_snapshot(&session.id).await
    }

    /// Create or update the caller's channel, log a revision and schedule a
    /// master recomputation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for blank code or a closed session,
    /// `AppError::NotFound` for an unknown session or channel id, and
    /// `AppError::Unauthorized` when the caller is not a participant or not
    /// the channel's author. Nothing is written on error.
    pub async fn upsert_channel(
        &self,
        id_or_slug: &str,
        user_id: &str,
        payload: ChannelPayload,
    ) -> Result<Arc<SessionSnapshot>> {
        let code = payload.validated_code()?;
        let session = self.require_session(id_or_slug).await?;
        ensure_active(&session)?;
        self.ensure_participant(&session.id, user_id).await?;

        let existing = self.find_existing_channel(&session.id, user_id, &payload).await?;
        let (channel, is_new) = match existing {
            Some(mut channel) => {
                if channel.user_id != user_id {
                    return Err(AppError::Unauthorized(
                        "only the author can edit this channel".into(),
                    ));
                }
                channel.apply_payload(&payload, code);
                (channel, false)
            }
            None => (
                Channel::from_payload(session.id.clone(), user_id.to_owned(), &payload, code),
                true,
            ),
        };

        self.channels.save_with_revision(&channel, is_new).await?;
        self.sessions.touch(&session.id).await?;
        info!(
            session_id = %session.id,
            channel_id = %channel.id,
            status = channel.status.as_str(),
            is_new,
            "channel saved"
        );

        self.schedule_refresh(&session.id).await;
        self.refresh_snapshot(&session.id).await
    }

    /// Move a channel to a new status and schedule a recomputation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session or the channel (within
    /// that session) is unknown, `AppError::Validation` if the session is
    /// closed.
    pub async fn publish_channel(
        &self,
        id_or_slug: &str,
        channel_id: &str,
        status: ChannelStatus,
    ) -> Result<Arc<SessionSnapshot>> {
        let session = self.require_session(id_or_slug).await?;
        ensure_active(&session)?;

        let mut channel = self
            .channels
            .get_by_id(channel_id)
            .await?
            .filter(|channel| channel.session_id == session.id)
            .ok_or_else(|| AppError::NotFound(format!("channel {channel_id} not found")))?;

        channel.status = status;
        channel.updated_at = chrono::Utc::now();
        self.channels.save_with_revision(&channel, false).await?;
        self.sessions.touch(&session.id).await?;
        info!(
            session_id = %session.id,
            channel_id,
            status = status.as_str(),
            "channel status changed"
        );

        self.schedule_refresh(&session.id).await;
        self.refresh_snapshot(&session.id).await
    }

    /// Overwrite the master directly, bypassing the merge engine.
    ///
    /// The override lasts until the next natural recomputation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for blank code, `AppError::NotFound`
    /// for an unknown session and `AppError::Unauthorized` for callers that
    /// are neither owner nor participant.
    pub async fn override_master_code(
        &self,
        id_or_slug: &str,
        user_id: &str,
        code: &str,
    ) -> Result<Arc<SessionSnapshot>> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::Validation("master code must not be empty".into()));
        }
        let session = self.require_session(id_or_slug).await?;
        if !session.is_owner(user_id) {
            self.ensure_participant(&session.id, user_id).await?;
        }

        let master = MasterUpdate {
            master_code: code.to_owned(),
            merged_stack: code.to_owned(),
        };
        self.sessions.update_master(&session.id, &master, None).await?;
        info!(session_id = %session.id, user_id, "master overridden");

        if master.master_code != session.master_code {
            self.events.publish(SessionEvent::MasterUpdated {
                session_id: session.id.clone(),
                master,
            });
        }
        self.refresh_snapshot(&session.id).await
    }

    /// Store a new apply delay, clamped into `[0, max_apply_delay_ms]`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown session.
    pub async fn adjust_delay(&self, id_or_slug: &str, ms: i64) -> Result<Arc<SessionSnapshot>> {
        let session_id = self.require_session_id(id_or_slug).await?;
        let clamped = self.config.clamp_apply_delay(ms);
        self.sessions.update_apply_delay(&session_id, clamped).await?;
        info!(session_id = %session_id, requested = ms, applied = clamped, "apply delay adjusted");
        self.refresh_snapshot(&session_id).await
    }

    /// Close the session to further edits. Owner only.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Unauthorized`.
    pub async fn close_session(
        &self,
        id_or_slug: &str,
        user_id: &str,
    ) -> Result<Arc<SessionSnapshot>> {
        let session = self.require_session(id_or_slug).await?;
        ensure_owner(&session, user_id, "close")?;

        self.sessions
            .update_status(&session.id, SessionStatus::Closed)
            .await?;
        info!(session_id = %session.id, "session closed");
        self.refresh_snapshot(&session.id).await
    }

    /// Delete the session and everything hanging off it. Owner only.
    ///
    /// Cancels any armed refresh and evicts the snapshot and slug mapping.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Unauthorized`.
    pub async fn delete_session(&self, id_or_slug: &str, user_id: &str) -> Result<()> {
        let session = self.require_session(id_or_slug).await?;
        ensure_owner(&session, user_id, "delete")?;

        self.scheduler.cancel(&session.id).await;
        self.sessions.delete(&session.id).await?;
        self.cache.evict(&session.id, &session.slug).await;

        info!(session_id = %session.id, slug = %session.slug, "session deleted");
        Ok(())
    }

    /// Invite up to `max_per_call` users into the session. Owner only.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound`, `AppError::Unauthorized`, or
    /// `AppError::Validation` when no eligible invitee remains.
    pub async fn send_invites(
        &self,
        id_or_slug: &str,
        inviter_id: &str,
        invitee_ids: &[String],
    ) -> Result<Vec<Invite>> {
        let session = self.require_session(id_or_slug).await?;
        invite_workflow::send_invites(
            &session,
            inviter_id,
            invitee_ids,
            self.config.invites.max_per_call,
            &self.participants,
            &self.invites,
        )
        .await
    }

    /// Accept or decline an invite. Accepting joins the session.
    ///
    /// Answering an invite that is no longer pending returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound`, `AppError::Unauthorized`, or
    /// `AppError::Validation` when accepting into a closed session.
    pub async fn respond_to_invite(
        &self,
        invite_id: &str,
        user_id: &str,
        decision: InviteDecision,
    ) -> Result<InviteResponse> {
        let outcome =
            invite_workflow::respond(invite_id, user_id, decision, &self.invites).await?;

        let snapshot = if outcome.transitioned && decision == InviteDecision::Accept {
            let session_id = &outcome.invite.session_id;
            info!(session_id = %session_id, user_id, "participant joined");
            Some(self.refresh_snapshot(session_id).await?)
        } else {
            None
        };

        Ok(InviteResponse {
            invite: outcome.invite,
            snapshot: snapshot.map(|s| (*s).clone()),
        })
    }

    /// Pending invites addressed to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_user_invites(&self, user_id: &str) -> Result<Vec<InviteSummary>> {
        self.invites.list_pending_for_invitee(user_id).await
    }

    /// Sessions `user_id` takes part in, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_recent_sessions(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SessionSummary>> {
        let limit = self.config.clamp_recent_limit(limit);
        self.sessions.list_recent_for_user(user_id, limit).await
    }

    /// Revision history of one channel, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown channel.
    pub async fn channel_history(
        &self,
        channel_id: &str,
        limit: u32,
    ) -> Result<Vec<ChannelRevision>> {
        if self.channels.get_by_id(channel_id).await?.is_none() {
            return Err(AppError::NotFound(format!("channel {channel_id} not found")));
        }
        self.revisions.list_for_channel(channel_id, limit.max(1)).await
    }

    /// Arm a debounced master recomputation for the session.
    ///
    /// The wait is the base delay plus the session's clamped apply delay as
    /// seen in the currently cached snapshot (zero when none is cached).
    /// Returns `false` when a refresh was already armed.
    pub async fn schedule_refresh(&self, session_id: &str) -> bool {
        let apply_delay = self
            .cache
            .peek(session_id)
            .await
            .map_or(0, |snapshot| self.config.clamp_apply_delay(snapshot.apply_delay_ms));
        let wait = self.config.base_delay()
            + Duration::from_millis(u64::try_from(apply_delay).unwrap_or(0));

        let this = self.clone();
        let owned_id = session_id.to_owned();
        self.scheduler
            .schedule(session_id, wait, move || async move {
                this.recompute_master(&owned_id).await.map(|_| ())
            })
            .await
    }

    /// Recompute the master from current channel state right now.
    ///
    /// Samples process health, stores the merge and the sample history in
    /// one update, stamps contributing channels and reloads the snapshot.
    /// Returns `None` if the session no longer exists. On failure the last
    /// stored master is left as it was.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn recompute_master(&self, session_id: &str) -> Result<Option<MasterUpdate>> {
        async {
            let Some(session) = self.sessions.get_by_id(session_id).await? else {
                debug!("session gone before recomputation");
                return Ok(None);
            };

            let channels = self.channels.list_views(session_id).await?;
            let merged = merge::build_merged_patterns(&channels);
            let contributing: Vec<String> = merge::contributing_entries(&channels)
                .iter()
                .map(|entry| entry.channel_id.to_owned())
                .collect();

            let mut stats = session.cpu_stats.clone();
            stats.push(self.sampler.sample(), self.config.sampler.history_len);

            self.sessions
                .update_master(session_id, &merged, Some(&stats))
                .await?;
            if let Err(err) = self.channels.mark_evaluated(&contributing).await {
                warn!(%err, "failed to stamp evaluated channels");
            }

            let changed = merged.master_code != session.master_code;
            info!(channels = contributing.len(), changed, "master recomputed");
            if changed {
                self.events.publish(SessionEvent::MasterUpdated {
                    session_id: session_id.to_owned(),
                    master: merged.clone(),
                });
            }

            self.refresh_snapshot(session_id).await?;
            Ok(Some(merged))
        }
        .instrument(info_span!("recompute_master", session_id))
        .await
    }

    /// Wait for every armed refresh to run.
    pub async fn flush(&self) {
        self.scheduler.flush().await;
    }

    /// Disarm pending refreshes and wait for in-flight ones.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    /// Force-reload a snapshot and announce it.
    async fn refresh_snapshot(&self, session_id: &str) -> Result<Arc<SessionSnapshot>> {
        let snapshot = self
            .cache
            .load(session_id)
            .await?
            .ok_or_else(|| not_found(session_id))?;

        self.events.publish(SessionEvent::SessionUpdated {
            session_id: session_id.to_owned(),
            snapshot: Arc::clone(&snapshot),
        });
        Ok(snapshot)
    }

    async fn require_session_id(&self, id_or_slug: &str) -> Result<String> {
        self.cache
            .resolve(id_or_slug)
            .await?
            .ok_or_else(|| not_found(id_or_slug))
    }

    async fn require_session(&self, id_or_slug: &str) -> Result<Session> {
        let session_id = self.require_session_id(id_or_slug).await?;
        self.sessions
            .get_by_id(&session_id)
            .await?
            .ok_or_else(|| not_found(id_or_slug))
    }

    async fn ensure_participant(&self, session_id: &str, user_id: &str) -> Result<()> {
        if self.participants.get(session_id, user_id).await?.is_none() {
            return Err(AppError::Unauthorized(
                "user is not a participant of this session".into(),
            ));
        }
        Ok(())
    }

    async fn find_existing_channel(
        &self,
        session_id: &str,
        user_id: &str,
        payload: &ChannelPayload,
    ) -> Result<Option<Channel>> {
        if let Some(channel_id) = payload.id.as_deref().filter(|id| !id.trim().is_empty()) {
            let channel = self
                .channels
                .get_by_id(channel_id)
                .await?
                .filter(|channel| channel.session_id == session_id)
                .ok_or_else(|| AppError::NotFound(format!("channel {channel_id} not found")))?;
            return Ok(Some(channel));
        }

        match payload.element_id.as_deref().map(str::trim) {
            Some(element_id) if !element_id.is_empty() => {
                self.channels
                    .find_by_element(session_id, user_id, element_id)
                    .await
            }
            _ => Ok(None),
        }
    }
}

fn not_found(identifier: &str) -> AppError {
    AppError::NotFound(format!("session {identifier} not found"))
}

fn ensure_active(session: &Session) -> Result<()> {
    if session.is_active() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "session {} is closed",
            session.id
        )))
    }
}

fn ensure_owner(session: &Session, user_id: &str, action: &str) -> Result<()> {
    if session.is_owner(user_id) {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "only the session owner can {action} it"
        )))
    }
}
