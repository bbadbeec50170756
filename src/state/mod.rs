pub mod init_machine;
mod session;

use std::sync::Arc;

use tokio::sync::{Notify, RwLock, RwLockReadGuard, RwLockWriteGuard, futures::Notified, watch};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    dao::{
        backend::{BackendKind, ScoreBackend, error::InitError},
        models::AuthGrant,
    },
    error::ServiceError,
    services::retry::RetryPolicy,
};

pub use self::init_machine::{FallbackReason, InitEvent, InitPhase, InvalidTransition, Snapshot};
pub use self::session::Session;
use self::init_machine::InitStateMachine;

pub type SharedState = Arc<AppState>;

/// Central application state: the init machine, the installed backend and the session.
pub struct AppState {
    config: Arc<AppConfig>,
    remote: Option<Arc<dyn ScoreBackend>>,
    local: Arc<dyn ScoreBackend>,
    backend: RwLock<Option<Arc<dyn ScoreBackend>>>,
    init: RwLock<InitStateMachine>,
    phase: watch::Sender<Snapshot>,
    cancel: Notify,
    session: RwLock<Session>,
    retry_policy: RetryPolicy<InitError>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// No backend is installed until the init machine settles. `remote` is `None` when the
    /// remote store is compiled out or could not even be built.
    pub fn new(
        config: AppConfig,
        remote: Option<Arc<dyn ScoreBackend>>,
        local: Arc<dyn ScoreBackend>,
    ) -> SharedState {
        let machine = InitStateMachine::new(config.init.max_attempts);
        let (phase_tx, _rx) = watch::channel(machine.snapshot());
        let retry_policy = config.init.retry_policy();
        Arc::new(Self {
            config: Arc::new(config),
            remote,
            local,
            backend: RwLock::new(None),
            init: RwLock::new(machine),
            phase: phase_tx,
            cancel: Notify::new(),
            session: RwLock::new(Session::default()),
            retry_policy,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn remote(&self) -> Option<Arc<dyn ScoreBackend>> {
        self.remote.clone()
    }

    pub fn retry_policy(&self) -> RetryPolicy<InitError> {
        self.retry_policy
    }

    /// Currently installed backend, if any.
    pub async fn backend(&self) -> Option<Arc<dyn ScoreBackend>> {
        self.backend.read().await.as_ref().cloned()
    }

    /// Installed backend, or [`ServiceError::NotReady`] while initialization is pending.
    pub async fn require_backend(&self) -> Result<Arc<dyn ScoreBackend>, ServiceError> {
        if !self.is_initialized().await {
            return Err(ServiceError::NotReady);
        }
        self.backend().await.ok_or(ServiceError::NotReady)
    }

    /// Kind of the installed backend.
    pub async fn backend_kind(&self) -> Option<BackendKind> {
        self.backend().await.map(|backend| backend.kind())
    }

    pub async fn phase(&self) -> InitPhase {
        self.init.read().await.phase()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.init.read().await.snapshot()
    }

    /// Whether data operations may run.
    pub async fn is_initialized(&self) -> bool {
        self.phase().await.is_initialized()
    }

    /// Subscribe to init machine updates.
    pub fn phase_watcher(&self) -> watch::Receiver<Snapshot> {
        self.phase.subscribe()
    }

    pub async fn session(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().await
    }

    pub async fn session_mut(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().await
    }

    /// Resolves when a user action abandons the in-flight run.
    pub fn cancelled(&self) -> Notified<'_> {
        self.cancel.notified()
    }

    /// Wake every supervisor waiting on [`AppState::cancelled`].
    pub fn cancel_pending(&self) {
        self.cancel.notify_waiters();
    }

    /// Apply a user-driven event.
    pub async fn transition(&self, event: InitEvent) -> Result<Snapshot, InvalidTransition> {
        let mut machine = self.init.write().await;
        self.apply_locked(&mut machine, event).await
    }

    /// Apply an event on behalf of run `run`. Returns `Ok(None)` when a newer run has
    /// started (or the user switched modes) and the caller should stop.
    pub async fn transition_in_run(
        &self,
        run: u64,
        event: InitEvent,
    ) -> Result<Option<Snapshot>, InvalidTransition> {
        let mut machine = self.init.write().await;
        if machine.run() != run {
            return Ok(None);
        }
        self.apply_locked(&mut machine, event).await.map(Some)
    }

    // Backend swaps happen under the machine lock so phase and backend never disagree.
    async fn apply_locked(
        &self,
        machine: &mut InitStateMachine,
        event: InitEvent,
    ) -> Result<Snapshot, InvalidTransition> {
        let phase = machine.apply(event)?;
        match phase {
            InitPhase::Ready => match self.remote() {
                Some(remote) => self.install(remote).await,
                None => self.install(self.local.clone()).await,
            },
            InitPhase::FallbackActive { .. } => self.install(self.local.clone()).await,
            InitPhase::Initializing { .. } if event == InitEvent::Retry => {
                self.backend.write().await.take();
            }
            _ => {}
        }

        let snapshot = machine.snapshot();
        self.phase.send_replace(snapshot);
        Ok(snapshot)
    }

    async fn install(&self, backend: Arc<dyn ScoreBackend>) {
        let kind = backend.kind();
        *self.backend.write().await = Some(backend.clone());

        // Offline mode signs in with a synthetic identity.
        let identity = match kind {
            BackendKind::Local => match backend.sign_in(AuthGrant::AccessToken(String::new())).await {
                Ok(identity) => Some(identity),
                Err(err) => {
                    warn!(error = %err, "offline sign-in failed");
                    None
                }
            },
            BackendKind::Remote => backend.current_identity().await,
        };
        let current_user = backend.restore_session().await;

        let mut session = self.session.write().await;
        *session = Session {
            current_user,
            identity,
            pending_oauth_state: None,
        };
        info!(
            backend = ?kind,
            restored_user = session.current_user.is_some(),
            "score backend installed"
        );
    }
}
