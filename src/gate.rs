// ABOUTME: Registry of named client and server sessions plus their reconnect schedule
// ABOUTME: Sessions hold a weak handle back to it for activation and reconnects

use crate::session::{
    GateEvents, Role, Session, SessionConfig, SmppError, SmppResult, TracingEvents,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between a [`Gate`] and the sessions it created
pub struct GateShared {
    events: Arc<dyn GateEvents>,
    sessions: Mutex<HashMap<String, Session>>,
    /// Server sessions that currently have a bound ESME
    active: Mutex<HashSet<String>>,
    reconnects: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl std::fmt::Debug for GateShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateShared")
            .field("sessions", &lock(&self.sessions).len())
            .field("active", &lock(&self.active).len())
            .field("reconnects", &lock(&self.reconnects).len())
            .finish()
    }
}

impl GateShared {
    /// Reconnect `session` after `delay`, replacing any retry already
    /// scheduled for it
    pub(crate) fn schedule_reconnect(&self, session: Session, delay: Duration) {
        let name = session.name().to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(channel = %session.name(), "Reconnecting");
            if let Err(err) = session.connect().await {
                warn!(channel = %session.name(), "Reconnect failed: {}", err);
            }
        });

        if let Some(previous) = lock(&self.reconnects).insert(name, handle) {
            previous.abort();
        }
    }

    pub(crate) fn cancel_reconnect(&self, name: &str) {
        if let Some(handle) = lock(&self.reconnects).remove(name) {
            handle.abort();
        }
    }

    /// Claim the named server session for a new ESME.
    ///
    /// Returns `false` when an ESME already holds it. Check and claim happen
    /// under one lock, so of two binds racing for a session only one wins.
    pub(crate) fn try_activate(&self, name: &str) -> bool {
        lock(&self.active).insert(name.to_string())
    }

    /// A client session bound; it has no retry left to run
    pub(crate) fn on_bound(&self, name: &str) {
        self.forget_finished_reconnect(name);
    }

    pub(crate) fn deactivate(&self, name: &str) {
        if lock(&self.active).remove(name) {
            info!(channel = %name, "Server session released");
        }
    }

    fn forget_finished_reconnect(&self, name: &str) {
        let mut reconnects = lock(&self.reconnects);
        if reconnects.get(name).is_some_and(|handle| handle.is_finished()) {
            reconnects.remove(name);
        }
    }
}

/// Top-level coordinator: owns every session by name.
///
/// Client sessions created here reconnect after losing their channel; server
/// sessions are offered to the acceptor ([`crate::server::run`]) when an
/// ESME binds with their credentials.
///
/// # Example
///
/// ```rust,no_run
/// use smpp_gate::gate::Gate;
/// use smpp_gate::session::SessionConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gate = Gate::with_tracing();
/// gate.add_client("upstream", SessionConfig::new("esme01", "secret"))?;
/// gate.add_server("partner", SessionConfig::new("partner", "pw"))?;
///
/// gate.connect_all().await;
/// // ...
/// gate.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Gate {
    shared: Arc<GateShared>,
}

impl Gate {
    pub fn new(events: Arc<dyn GateEvents>) -> Gate {
        Gate {
            shared: Arc::new(GateShared {
                events,
                sessions: Mutex::new(HashMap::new()),
                active: Mutex::new(HashSet::new()),
                reconnects: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// A gate whose observer logs through `tracing`
    pub fn with_tracing() -> Gate {
        Gate::new(Arc::new(TracingEvents))
    }

    pub fn events(&self) -> &Arc<dyn GateEvents> {
        &self.shared.events
    }

    pub fn add_client(&self, name: &str, config: SessionConfig) -> SmppResult<Session> {
        self.add(name, Role::Client, config)
    }

    pub fn add_server(&self, name: &str, config: SessionConfig) -> SmppResult<Session> {
        self.add(name, Role::Server, config)
    }

    fn add(&self, name: &str, role: Role, config: SessionConfig) -> SmppResult<Session> {
        let mut sessions = lock(&self.shared.sessions);
        if sessions.contains_key(name) {
            return Err(SmppError::InvalidState(format!(
                "a session named {} already exists",
                name
            )));
        }

        let session = Session::new(
            name.to_string(),
            role,
            config,
            self.shared.events.clone(),
            Arc::downgrade(&self.shared),
        );
        sessions.insert(name.to_string(), session.clone());
        debug!(channel = %name, "Added {:?} session", role);
        Ok(session)
    }

    pub fn session(&self, name: &str) -> Option<Session> {
        lock(&self.shared.sessions).get(name).cloned()
    }

    /// Remove a session from the registry and quit it
    pub async fn remove(&self, name: &str) -> Option<Session> {
        let session = lock(&self.shared.sessions).remove(name)?;
        self.shared.cancel_reconnect(name);
        self.shared.deactivate(name);
        session.quit().await;
        Some(session)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.shared.sessions).keys().cloned().collect();
        names.sort();
        names
    }

    /// The server session an ESME binding as `system_id`/`password` maps to
    pub fn find_server(&self, system_id: &str, password: &str) -> Option<Session> {
        lock(&self.shared.sessions)
            .values()
            .find(|session| {
                session.role() == Role::Server && session.config().accepts(system_id, password)
            })
            .cloned()
    }

    pub(crate) fn try_activate(&self, name: &str) -> bool {
        self.shared.try_activate(name)
    }

    /// Whether the named server session has a bound ESME
    pub fn is_active(&self, name: &str) -> bool {
        lock(&self.shared.active).contains(name)
    }

    pub fn active_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.shared.active).iter().cloned().collect();
        names.sort();
        names
    }

    /// Whether a reconnect is scheduled for the named session
    pub fn reconnect_pending(&self, name: &str) -> bool {
        lock(&self.shared.reconnects)
            .get(name)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Connect every client session that is currently disconnected.
    ///
    /// A failed connect is logged; its retry is already scheduled.
    pub async fn connect_all(&self) {
        let clients: Vec<Session> = lock(&self.shared.sessions)
            .values()
            .filter(|session| session.role() == Role::Client)
            .cloned()
            .collect();

        for session in clients {
            if let Err(err) = session.connect().await {
                warn!(channel = %session.name(), "Connect failed: {}", err);
            }
        }
    }

    /// Cancel pending reconnects and quit every session
    pub async fn shutdown(&self) {
        let reconnects: Vec<JoinHandle<()>> = lock(&self.shared.reconnects)
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        for handle in reconnects {
            handle.abort();
        }

        let sessions: Vec<Session> = lock(&self.shared.sessions).values().cloned().collect();
        for session in sessions {
            session.quit().await;
        }
        lock(&self.shared.active).clear();
        info!("Gate shut down");
    }
}
