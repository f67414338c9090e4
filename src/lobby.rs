//! Session coordinator: the multiplayer lobby.
//!
//! One process-wide store keyed by session id, shared by every connection,
//! with a broadcast channel per session and a private broadcast channel per
//! registered user. Roster state is in-memory and process-lifetime only;
//! abandoned sessions are reclaimed by a TTL reaper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    CategorySelection, Participant, ParticipantStatus, ProfileSnapshot, SessionSummary,
};
use crate::protocol::ServerWsMessage;

const CHANNEL_CAPACITY: usize = 64;

/// Lobby failures are logged server-side and also surfaced to the caller as
/// a typed `error` event.
#[derive(Debug, Error)]
pub enum LobbyError {
    #[error("unknown session: {0}")]
    UnknownSession(String),
    #[error("unknown user: {0}")]
    UnknownUser(String),
}

struct LobbySession {
    participants: Vec<Participant>,
    category: Option<CategorySelection>,
    last_activity: Instant,
    tx: broadcast::Sender<ServerWsMessage>,
}

impl LobbySession {
    fn new() -> Self {
        Self {
            participants: Vec::new(),
            category: None,
            last_activity: Instant::now(),
            tx: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    // Send errors only mean nobody is subscribed right now.
    fn broadcast(&self, msg: ServerWsMessage) {
        let _ = self.tx.send(msg);
    }
}

#[derive(Clone)]
pub struct LobbyStore {
    sessions: Arc<RwLock<HashMap<String, LobbySession>>>,
    users: Arc<RwLock<HashMap<String, broadcast::Sender<ServerWsMessage>>>>,
}

impl LobbyStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe the caller to that user's private channel, creating it on
    /// first registration.
    #[instrument(level = "info", skip(self))]
    pub async fn register_user(&self, user_id: &str) -> broadcast::Receiver<ServerWsMessage> {
        let mut users = self.users.write().await;
        users
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Join a session, creating it on first join. Idempotent by user id: a
    /// rejoin never duplicates the roster entry. New members are announced to
    /// existing subscribers before the joiner subscribes, so the joiner sees
    /// the roster snapshot instead of its own join event. The session's
    /// current category selection, if any, is returned so late joiners catch
    /// up without waiting for the next broadcast.
    #[instrument(level = "info", skip(self, profile), fields(user_id = %profile.user_id))]
    pub async fn join_session(
        &self,
        session_id: &str,
        profile: ProfileSnapshot,
    ) -> (
        broadcast::Receiver<ServerWsMessage>,
        Vec<Participant>,
        Option<CategorySelection>,
    ) {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!(target: "lobby", %session_id, "session created");
                LobbySession::new()
            });
        session.touch();

        let already_present = session
            .participants
            .iter()
            .any(|p| p.profile.user_id == profile.user_id);
        if !already_present {
            let participant = Participant {
                profile,
                status: ParticipantStatus::Pending,
            };
            session.broadcast(ServerWsMessage::UserJoined {
                participant: participant.clone(),
            });
            session.participants.push(participant);
        } else {
            debug!(target: "lobby", %session_id, "rejoin, roster unchanged");
        }

        (
            session.tx.subscribe(),
            session.participants.clone(),
            session.category.clone(),
        )
    }

    /// Deliver an invite to the target's private channel and announce it on
    /// the session channel. The target must have registered; the session
    /// announcement is best-effort (the host may invite before anyone else
    /// has joined).
    #[instrument(level = "info", skip(self, session), fields(session_id = %session.session_id))]
    pub async fn send_invite(
        &self,
        to_user_id: &str,
        session: SessionSummary,
    ) -> Result<(), LobbyError> {
        {
            let users = self.users.read().await;
            let tx = users
                .get(to_user_id)
                .ok_or_else(|| LobbyError::UnknownUser(to_user_id.to_string()))?;
            let _ = tx.send(ServerWsMessage::ReceiveInvite {
                session: session.clone(),
            });
        }

        let mut sessions = self.sessions.write().await;
        if let Some(s) = sessions.get_mut(&session.session_id) {
            s.touch();
            s.broadcast(ServerWsMessage::NewInvite { session });
        } else {
            debug!(target: "lobby", session_id = %session.session_id, "invite announced to nonexistent session");
        }
        Ok(())
    }

    /// Mirror of `send_invite` with a retraction notification; also drops the
    /// target from the roster if present.
    #[instrument(level = "info", skip(self, session), fields(session_id = %session.session_id))]
    pub async fn remove_invite(
        &self,
        to_user_id: &str,
        session: SessionSummary,
    ) -> Result<(), LobbyError> {
        {
            let users = self.users.read().await;
            let tx = users
                .get(to_user_id)
                .ok_or_else(|| LobbyError::UnknownUser(to_user_id.to_string()))?;
            let _ = tx.send(ServerWsMessage::UnInvite {
                session: session.clone(),
            });
        }

        let mut sessions = self.sessions.write().await;
        if let Some(s) = sessions.get_mut(&session.session_id) {
            s.touch();
            s.participants.retain(|p| p.profile.user_id != to_user_id);
            s.broadcast(ServerWsMessage::RemoveInvited { session });
        }
        Ok(())
    }

    /// Record and broadcast the host's category choice. Advisory only: the
    /// question selector runs separately once play starts.
    #[instrument(level = "info", skip(self, category))]
    pub async fn set_category(
        &self,
        session_id: &str,
        category: CategorySelection,
    ) -> Result<(), LobbyError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| LobbyError::UnknownSession(session_id.to_string()))?;
        session.touch();
        session.category = Some(category.clone());
        session.broadcast(ServerWsMessage::SetCategory { category });
        Ok(())
    }

    /// Update a participant's status (pending -> active/declined) and
    /// broadcast the change. A response from a user not yet on the roster
    /// adds them with the reported status.
    #[instrument(level = "info", skip(self, user), fields(user_id = %user.user_id, ?status))]
    pub async fn invite_response(
        &self,
        session_id: &str,
        user: ProfileSnapshot,
        status: ParticipantStatus,
    ) -> Result<(), LobbyError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| LobbyError::UnknownSession(session_id.to_string()))?;
        session.touch();

        match session
            .participants
            .iter_mut()
            .find(|p| p.profile.user_id == user.user_id)
        {
            Some(p) => p.status = status,
            None => session.participants.push(Participant {
                profile: user.clone(),
                status,
            }),
        }
        session.broadcast(ServerWsMessage::InviteStatusUpdate { user, status });
        Ok(())
    }

    /// Drop sessions idle longer than `ttl`, plus private channels whose user
    /// has no live subscriber left. Returns how many sessions were reaped.
    #[instrument(level = "debug", skip(self))]
    pub async fn reap_expired(&self, ttl: Duration) -> usize {
        let reaped = {
            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|id, s| {
                let live = s.last_activity.elapsed() < ttl;
                if !live {
                    info!(target: "lobby", session_id = %id, "reaping idle session");
                }
                live
            });
            before - sessions.len()
        };

        let mut users = self.users.write().await;
        users.retain(|id, tx| {
            let live = tx.receiver_count() > 0;
            if !live {
                debug!(target: "lobby", user_id = %id, "dropping disconnected user channel");
            }
            live
        });

        reaped
    }

    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for LobbyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic eviction of abandoned lobbies.
pub fn spawn_reaper(store: LobbyStore, ttl: Duration, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick is immediate
        loop {
            ticker.tick().await;
            let reaped = store.reap_expired(ttl).await;
            if reaped > 0 {
                warn!(target: "lobby", reaped, "evicted idle sessions");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(user_id: &str) -> ProfileSnapshot {
        ProfileSnapshot {
            user_id: user_id.to_string(),
            display_name: user_id.to_uppercase(),
            avatar_url: None,
        }
    }

    fn summary(session_id: &str, host: &str) -> SessionSummary {
        SessionSummary {
            session_id: session_id.to_string(),
            host: profile(host),
            category: None,
        }
    }

    #[tokio::test]
    async fn join_is_idempotent_per_user() {
        let store = LobbyStore::new();
        let (_rx1, _, _) = store.join_session("s1", profile("alice")).await;
        let (_rx2, roster, _) = store.join_session("s1", profile("alice")).await;
        assert_eq!(roster.len(), 1);
    }

    #[tokio::test]
    async fn second_joiner_sees_full_roster_and_first_is_notified() {
        let store = LobbyStore::new();
        let (mut rx_alice, roster_alice, _) = store.join_session("s1", profile("alice")).await;
        assert_eq!(roster_alice.len(), 1);

        let (_rx_bob, roster_bob, _) = store.join_session("s1", profile("bob")).await;
        let ids: Vec<&str> = roster_bob.iter().map(|p| p.profile.user_id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "bob"]);

        match rx_alice.try_recv().unwrap() {
            ServerWsMessage::UserJoined { participant } => {
                assert_eq!(participant.profile.user_id, "bob");
                assert_eq!(participant.status, ParticipantStatus::Pending);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn joiner_does_not_receive_its_own_join_event() {
        let store = LobbyStore::new();
        let (mut rx, _, _) = store.join_session("s1", profile("alice")).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn invite_reaches_target_private_channel_and_session() {
        let store = LobbyStore::new();
        let mut rx_bob = store.register_user("bob").await;
        let (mut rx_alice, _, _) = store.join_session("s1", profile("alice")).await;

        store.send_invite("bob", summary("s1", "alice")).await.unwrap();

        assert!(matches!(
            rx_bob.try_recv().unwrap(),
            ServerWsMessage::ReceiveInvite { .. }
        ));
        assert!(matches!(
            rx_alice.try_recv().unwrap(),
            ServerWsMessage::NewInvite { .. }
        ));
    }

    #[tokio::test]
    async fn invite_to_unregistered_user_errors() {
        let store = LobbyStore::new();
        let err = store
            .send_invite("ghost", summary("s1", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, LobbyError::UnknownUser(_)));
    }

    #[tokio::test]
    async fn remove_invite_drops_target_from_roster() {
        let store = LobbyStore::new();
        let _rx_bob = store.register_user("bob").await;
        let (_rx_a, _, _) = store.join_session("s1", profile("alice")).await;
        let (_rx_b, _, _) = store.join_session("s1", profile("bob")).await;

        store
            .remove_invite("bob", summary("s1", "alice"))
            .await
            .unwrap();

        let (_rx, roster, _) = store.join_session("s1", profile("alice")).await;
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].profile.user_id, "alice");
    }

    #[tokio::test]
    async fn invite_response_updates_status_and_broadcasts() {
        let store = LobbyStore::new();
        let (mut rx_alice, _, _) = store.join_session("s1", profile("alice")).await;
        let (_rx_bob, _, _) = store.join_session("s1", profile("bob")).await;
        let _ = rx_alice.try_recv(); // drain bob's join

        store
            .invite_response("s1", profile("bob"), ParticipantStatus::Active)
            .await
            .unwrap();

        match rx_alice.try_recv().unwrap() {
            ServerWsMessage::InviteStatusUpdate { user, status } => {
                assert_eq!(user.user_id, "bob");
                assert_eq!(status, ParticipantStatus::Active);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let (_rx, roster, _) = store.join_session("s1", profile("alice")).await;
        let bob = roster
            .iter()
            .find(|p| p.profile.user_id == "bob")
            .unwrap();
        assert_eq!(bob.status, ParticipantStatus::Active);
    }

    #[tokio::test]
    async fn ops_on_unknown_session_error() {
        let store = LobbyStore::new();
        assert!(matches!(
            store
                .set_category(
                    "nope",
                    CategorySelection {
                        category_id: "general".into(),
                        subject_ids: vec![],
                    }
                )
                .await,
            Err(LobbyError::UnknownSession(_))
        ));
        assert!(matches!(
            store
                .invite_response("nope", profile("bob"), ParticipantStatus::Active)
                .await,
            Err(LobbyError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn reaper_evicts_idle_sessions_only() {
        let store = LobbyStore::new();
        let (_rx, _, _) = store.join_session("s1", profile("alice")).await;
        assert_eq!(store.reap_expired(Duration::from_secs(60)).await, 0);
        assert_eq!(store.session_count().await, 1);
        assert_eq!(store.reap_expired(Duration::ZERO).await, 1);
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn reaper_drops_disconnected_user_channels() {
        let store = LobbyStore::new();
        let rx = store.register_user("bob").await;

        // Subscriber alive: the channel survives and invites still land.
        store.reap_expired(Duration::from_secs(60)).await;
        assert!(store.send_invite("bob", summary("s1", "alice")).await.is_ok());

        drop(rx);
        store.reap_expired(Duration::from_secs(60)).await;
        assert!(matches!(
            store
                .send_invite("bob", summary("s1", "alice"))
                .await
                .unwrap_err(),
            LobbyError::UnknownUser(_)
        ));
    }

    #[tokio::test]
    async fn late_joiner_receives_current_category() {
        let store = LobbyStore::new();
        let (_rx, _, none) = store.join_session("s1", profile("alice")).await;
        assert!(none.is_none());
        store
            .set_category(
                "s1",
                CategorySelection {
                    category_id: "general".into(),
                    subject_ids: vec![],
                },
            )
            .await
            .unwrap();
        let (_rx2, _, category) = store.join_session("s1", profile("bob")).await;
        assert_eq!(category.unwrap().category_id, "general");
    }

    #[tokio::test]
    async fn set_category_is_broadcast_to_members() {
        let store = LobbyStore::new();
        let (mut rx, _, _) = store.join_session("s1", profile("alice")).await;
        store
            .set_category(
                "s1",
                CategorySelection {
                    category_id: "general".into(),
                    subject_ids: vec!["math".into()],
                },
            )
            .await
            .unwrap();
        match rx.try_recv().unwrap() {
            ServerWsMessage::SetCategory { category } => {
                assert_eq!(category.category_id, "general");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
