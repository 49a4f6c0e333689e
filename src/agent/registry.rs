//! Live sessions keyed by id. Owned by whichever process serves them
//! (the HTTP server or the CLI), with explicit create, remove and idle
//! expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::models::Session;
use super::session::{Scheduler, TurnOutcome};

struct SessionHandle {
    // One turn at a time per session
    session: Mutex<Session>,
    closed: watch::Sender<bool>,
}

pub struct SessionRegistry {
    scheduler: Arc<Scheduler>,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    ttl: chrono::Duration,
}

impl SessionRegistry {
    pub fn new(scheduler: Arc<Scheduler>, ttl: Duration) -> Self {
        Self {
            scheduler,
            sessions: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    pub async fn create(&self, user_id: &str, timezone: Tz) -> Session {
        let id = Uuid::new_v4().to_string();
        let session = self.scheduler.open_session(&id, user_id, timezone).await;
        let (closed, _) = watch::channel(false);
        let handle = Arc::new(SessionHandle {
            session: Mutex::new(session.clone()),
            closed,
        });
        self.sessions.write().await.insert(id, handle);
        session
    }

    async fn handle(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// A copy of the session as of the last completed turn.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let handle = self.handle(id).await?;
        let session = handle.session.lock().await;
        Some(session.clone())
    }

    /// Run one turn. Turns on the same session queue behind each other.
    /// Returns `None` for an unknown session or one torn down while the
    /// turn was running, in which case nothing from the turn is kept.
    pub async fn process(&self, id: &str, message: &str) -> Option<TurnOutcome> {
        let handle = self.handle(id).await?;
        let mut closed = handle.closed.subscribe();
        if *closed.borrow() {
            return None;
        }

        let turn = async {
            let mut session = handle.session.lock().await;
            // Work on a copy so an aborted turn leaves no partial state
            let mut working = session.clone();
            let outcome = self.scheduler.process_turn(&mut working, message).await;
            *session = working;
            outcome
        };

        tokio::select! {
            outcome = turn => Some(outcome),
            _ = closed.changed() => {
                tracing::info!(session_id = id, "Session closed during a turn, discarding it");
                None
            }
        }
    }

    pub async fn remove(&self, id: &str) -> bool {
        match self.sessions.write().await.remove(id) {
            Some(handle) => {
                handle.closed.send_replace(true);
                tracing::info!(session_id = id, "Session removed");
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop sessions idle for longer than the ttl. Sessions with a turn
    /// in flight are skipped until the next sweep.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, handle)| {
                handle
                    .session
                    .try_lock()
                    .is_ok_and(|session| session.is_expired(now, self.ttl))
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(handle) = sessions.remove(id) {
                handle.closed.send_replace(true);
            }
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Expired idle sessions");
        }
        expired.len()
    }

    pub fn spawn_expiry_sweep(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                self.sweep_expired(Utc::now()).await;
            }
        })
    }
}
