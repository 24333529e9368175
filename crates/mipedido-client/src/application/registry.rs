//! Process-wide access to the one connection supervisor.
//!
//! [`SessionRegistry`] lazily builds a [`ConnectionSupervisor`] the first time
//! it is asked for one and hands the same instance to every later caller.
//! Creation happens under a mutex, so concurrent first calls still yield a
//! single supervisor.  After [`SessionRegistry::shutdown`] the next request
//! builds a fresh one.  A replacement never opens a transport before the
//! replaced supervisor's last session has finished closing.
//!
//! Applications that want a true process global use [`init_global`] once at
//! startup and [`global`] everywhere else.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::application::supervisor::{ConnectionSupervisor, SupervisorError};
use crate::application::transport::Transport;
use crate::domain::SessionConfig;

pub struct SessionRegistry {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    slot: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    supervisor: Option<Arc<ConnectionSupervisor>>,
    /// Session task left behind by a supervisor released in `shutdown`.
    released_task: Option<JoinHandle<()>>,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            slot: Mutex::new(Slot::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the shared supervisor, creating it on first use.
    ///
    /// A supervisor that was shut down through another handle is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NoRuntime`] if a supervisor has to be built
    /// outside a tokio runtime.
    pub fn get_or_create_supervisor(&self) -> Result<Arc<ConnectionSupervisor>, SupervisorError> {
        let mut slot = self.lock();
        if let Some(existing) = slot.supervisor.as_ref().filter(|s| !s.is_shut_down()) {
            return Ok(Arc::clone(existing));
        }

        let supervisor = Arc::new(ConnectionSupervisor::new(
            self.config.clone(),
            Arc::clone(&self.transport),
        )?);
        let predecessor = slot
            .supervisor
            .take()
            .and_then(|replaced| replaced.take_last_task())
            .or_else(|| slot.released_task.take());
        if let Some(task) = predecessor {
            debug!("new supervisor waits for the previous session to close");
            supervisor.adopt_predecessor(task);
        }
        debug!("created connection supervisor");
        slot.supervisor = Some(Arc::clone(&supervisor));
        Ok(supervisor)
    }

    /// Shuts the current supervisor down and forgets it.
    pub fn shutdown(&self) {
        let mut slot = self.lock();
        if let Some(supervisor) = slot.supervisor.take() {
            supervisor.shutdown();
            slot.released_task = supervisor.take_last_task();
            info!("session registry released its supervisor");
        }
    }

    /// `true` while a live supervisor is held.
    pub fn is_initialized(&self) -> bool {
        self.lock()
            .supervisor
            .as_ref()
            .is_some_and(|s| !s.is_shut_down())
    }
}

// ── Process global ────────────────────────────────────────────────────────────

static GLOBAL: OnceLock<SessionRegistry> = OnceLock::new();

/// Installs the process-wide registry.  Later calls return the registry
/// that is already installed; their arguments are ignored.
pub fn init_global(config: SessionConfig, transport: Arc<dyn Transport>) -> &'static SessionRegistry {
    GLOBAL.get_or_init(|| SessionRegistry::new(config, transport))
}

/// The process-wide registry, if [`init_global`] has run.
pub fn global() -> Option<&'static SessionRegistry> {
    GLOBAL.get()
}
