use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::session::controller::{Providers, Session, SessionSettings};

pub type SharedSession = Arc<Mutex<Session>>;

struct Entry {
    session: SharedSession,
    last_active: Instant,
}

/// In-memory registry of live sessions. Nothing survives a restart.
///
/// Every lookup counts as activity; sessions idle for longer than the
/// configured TTL are dropped by the sweeper.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub async fn insert(&self, session: Session) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(
            id,
            Entry {
                session: Arc::new(Mutex::new(session)),
                last_active: Instant::now(),
            },
        );
        id
    }

    pub async fn get(&self, id: Uuid) -> Result<SharedSession, AppError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
        entry.last_active = Instant::now();
        Ok(entry.session.clone())
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions untouched for at least `idle_ttl`. A session a handler
    /// still holds is kept regardless of age. Returns how many were dropped.
    pub async fn evict_idle(&self, idle_ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            Arc::strong_count(&entry.session) > 1 || entry.last_active.elapsed() < idle_ttl
        });
        before - sessions.len()
    }

    /// Runs `evict_idle` every `every` until the runtime shuts down.
    pub fn spawn_sweeper(&self, idle_ttl: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle(idle_ttl).await;
                if evicted > 0 {
                    let live = store.len().await;
                    info!("Evicted {evicted} idle session(s), {live} live");
                }
            }
        })
    }
}

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    /// Remote capabilities handed to every new session.
    pub providers: Providers,
    pub settings: SessionSettings,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new_session(&self) -> Session {
        Session::new(self.providers.clone(), self.settings.clone())
    }
}
