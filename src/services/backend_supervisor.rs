use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::{
    dao::backend::error::{InitError, InitErrorKind},
    error::ServiceError,
    state::{InitEvent, InitPhase, SharedState, Snapshot},
};

/// Kick off backend initialization. Only the first call spawns a supervisor; later calls
/// return the current snapshot.
pub async fn start(state: &SharedState) -> Snapshot {
    match state.transition(InitEvent::Start).await {
        Ok(snapshot) => {
            info!(run = snapshot.run, "starting score backend initialization");
            tokio::spawn(run(state.clone(), snapshot.run));
            snapshot
        }
        Err(_) => state.snapshot().await,
    }
}

/// Abandon the current outcome and try the remote store again from the first attempt.
pub async fn retry(state: &SharedState) -> Result<Snapshot, ServiceError> {
    let snapshot = state.transition(InitEvent::Retry).await?;
    state.cancel_pending();
    info!(run = snapshot.run, "retrying score backend initialization");
    tokio::spawn(run(state.clone(), snapshot.run));
    Ok(snapshot)
}

/// Stop waiting for the remote store and use the local one.
pub async fn switch_to_offline(state: &SharedState) -> Result<Snapshot, ServiceError> {
    let snapshot = state.transition(InitEvent::SwitchToOffline).await?;
    state.cancel_pending();
    info!("switched to offline mode at user request");
    Ok(snapshot)
}

/// Drive run `run` of the init machine until it settles or is superseded.
async fn run(state: SharedState, run: u64) {
    let Some(remote) = state.remote() else {
        warn!("remote store is not available; falling back to local store");
        let _ = state
            .transition_in_run(
                run,
                InitEvent::AttemptFailed {
                    kind: InitErrorKind::Misconfigured,
                    retryable: false,
                },
            )
            .await;
        return;
    };
    let policy = state.retry_policy();
    let readiness_timeout = state.config().init.readiness_timeout;

    loop {
        let snapshot = state.snapshot().await;
        let attempt = match snapshot.phase {
            InitPhase::Initializing { attempt } if snapshot.run == run => attempt,
            _ => return,
        };
        debug!(run, attempt, "initializing remote store");

        let outcome = tokio::select! {
            result = timeout(readiness_timeout, remote.init()) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(InitError::new(
                    InitErrorKind::NetworkTimeout,
                    format!("no answer within {readiness_timeout:?}"),
                )),
            },
            _ = state.cancelled() => {
                debug!(run, attempt, "initialization attempt abandoned");
                return;
            }
        };

        let event = match &outcome {
            Ok(()) => InitEvent::AttemptSucceeded,
            Err(err) => {
                warn!(attempt, kind = ?err.kind, error = %err, "remote store initialization failed");
                InitEvent::AttemptFailed {
                    kind: err.kind,
                    retryable: policy.is_retryable(err),
                }
            }
        };

        let snapshot = match state.transition_in_run(run, event).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "initialization outcome rejected");
                return;
            }
        };

        match snapshot.phase {
            InitPhase::Ready => {
                info!(attempt, "remote store ready");
                return;
            }
            InitPhase::FallbackActive { reason } => {
                warn!(?reason, "falling back to local store");
                return;
            }
            InitPhase::Retrying { attempt, .. } => {
                let delay = policy.delay_after(attempt);
                info!(attempt, ?delay, "retrying remote store initialization");
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = state.cancelled() => return,
                }
                if !matches!(
                    state.transition_in_run(run, InitEvent::BackoffElapsed).await,
                    Ok(Some(_))
                ) {
                    return;
                }
            }
            _ => return,
        }
    }
}
