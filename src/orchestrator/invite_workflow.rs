//! Invite state machine.
//!
//! `pending -> accepted | declined`. Only the session owner invites; only
//! the invitee answers, and only once. Re-inviting resets an existing row
//! for the same `(session, invitee)` back to `pending` instead of adding a
//! second one.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::models::invite::{Invite, InviteDecision};
use crate::models::session::Session;
use crate::persistence::invite_repo::InviteRepo;
use crate::persistence::participant_repo::ParticipantRepo;
use crate::{AppError, Result};

/// Result of recording an invitee's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOutcome {
    /// Invite as stored after the call.
    pub invite: Invite,
    /// Whether this call moved the invite out of `pending`.
    pub transitioned: bool,
}

/// Trim, drop blanks and the inviter, dedupe (first occurrence wins) and
/// cap the candidate list at `max`.
#[must_use]
pub fn normalize_invitees(inviter_id: &str, candidates: &[String], max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && *id != inviter_id)
        .filter(|id| seen.insert(*id))
        .take(max)
        .map(str::to_owned)
        .collect()
}

/// Create or refresh pending invites for eligible candidates.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if `inviter_id` does not own the
/// session, `AppError::Validation` if the session is closed or no eligible
/// invitee remains, `AppError::Db` on persistence failure.
pub async fn send_invites(
    session: &Session,
    inviter_id: &str,
    candidates: &[String],
    max_per_call: usize,
    participants: &ParticipantRepo,
    invites: &InviteRepo,
) -> Result<Vec<Invite>> {
    if !session.is_owner(inviter_id) {
        return Err(AppError::Unauthorized(
            "only the session owner can send invites".into(),
        ));
    }
    if !session.is_active() {
        return Err(AppError::Validation(format!(
            "session {} is closed",
            session.id
        )));
    }

    let mut eligible = Vec::new();
    for invitee in normalize_invitees(inviter_id, candidates, max_per_call) {
        if participants.get(&session.id, &invitee).await?.is_some() {
            debug!(session_id = %session.id, invitee = %invitee, "already a participant, skipping");
            continue;
        }
        eligible.push(invitee);
    }

    if eligible.is_empty() {
        return Err(AppError::Validation("no eligible invitees".into()));
    }

    let mut sent = Vec::with_capacity(eligible.len());
    for invitee in &eligible {
        sent.push(
            invites
                .upsert_pending(&session.id, inviter_id, invitee)
                .await?,
        );
    }

    info!(session_id = %session.id, count = sent.len(), "invites sent");
    Ok(sent)
}

/// Record the invitee's answer.
///
/// A non-pending invite is returned unchanged and nothing is written.
/// Accepting also adds the invitee as a member, atomically with the status
/// change.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown invite,
/// `AppError::Unauthorized` if `user_id` is not the invitee,
/// `AppError::Validation` when accepting into a closed session, and
/// `AppError::Db` on persistence failure.
pub async fn respond(
    invite_id: &str,
    user_id: &str,
    decision: InviteDecision,
    invites: &InviteRepo,
) -> Result<ResponseOutcome> {
    let invite = load(invite_id, user_id, invites).await?;

    if !invite.can_respond() {
        debug!(invite_id, status = invite.status.as_str(), "invite already answered");
        return Ok(ResponseOutcome {
            invite,
            transitioned: false,
        });
    }

    let transitioned = match decision {
        InviteDecision::Accept => invites.accept_and_join(invite_id).await?,
        InviteDecision::Decline => {
            invites
                .resolve_pending(invite_id, decision.target_status())
                .await?
        }
    };
    let invite = invites
        .get_by_id(invite_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("invite {invite_id} not found")))?;

    if transitioned {
        info!(invite_id, status = invite.status.as_str(), "invite answered");
    }
    Ok(ResponseOutcome {
        invite,
        transitioned,
    })
}

/// Fetch an invite and check that `user_id` is its invitee.
///
/// # Errors
///
/// Returns `AppError::NotFound` or `AppError::Unauthorized`.
pub async fn load(invite_id: &str, user_id: &str, invites: &InviteRepo) -> Result<Invite> {
    let invite = invites
        .get_by_id(invite_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("invite {invite_id} not found")))?;

    if invite.invitee_id != user_id {
        return Err(AppError::Unauthorized(
            "only the invitee can respond to this invite".into(),
        ));
    }
    Ok(invite)
}
