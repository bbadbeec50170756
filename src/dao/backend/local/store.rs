use std::{
    path::PathBuf,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::dao::{
    backend::{
        BackendKind, ScoreBackend, check_unique,
        error::{AuthError, FetchError, InitError, RegError, SaveError},
        find_login,
    },
    models::{
        AuthGrant, Identity, NewUser, SaveAck, ScoreRoundEntity, UserEntity, now_rfc3339,
    },
};

use super::kv::LocalKvStore;

/// Namespace prefixed to every local document.
pub const DEFAULT_NAMESPACE: &str = "golf_score_app";

const USERS_KEY: &str = "users";
const SCORES_KEY: &str = "scores";
const SESSION_KEY: &str = "session";

/// Round as persisted on disk, stamped with the moment it was stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRound {
    #[serde(flatten)]
    round: ScoreRoundEntity,
    recorded_at: String,
}

/// Score backend keeping everything in JSON documents on local disk.
#[derive(Clone)]
pub struct LocalBackend {
    kv: LocalKvStore,
    // Serializes read-modify-write sequences across clones.
    write_lock: Arc<Mutex<()>>,
    identity: Arc<RwLock<Option<Identity>>>,
}

impl LocalBackend {
    pub fn new(data_dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            kv: LocalKvStore::new(data_dir, namespace),
            write_lock: Arc::new(Mutex::new(())),
            identity: Arc::new(RwLock::new(None)),
        }
    }

    fn next_round_id(existing: &[StoredRound]) -> String {
        let mut millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        loop {
            let id = format!("score_{millis}");
            if !existing.iter().any(|stored| stored.round.id == id) {
                return id;
            }
            millis += 1;
        }
    }
}

impl ScoreBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn init(&self) -> BoxFuture<'static, Result<(), InitError>> {
        let root = self.kv.root().to_path_buf();
        Box::pin(async move {
            debug!(data_dir = %root.display(), "local backend ready");
            Ok(())
        })
    }

    fn sign_in(&self, grant: AuthGrant) -> BoxFuture<'static, Result<Identity, AuthError>> {
        let identity = self.identity.clone();
        Box::pin(async move {
            debug!(mode = %grant.mode(), "ignoring provider grant in offline mode");
            let offline = Identity::offline();
            *identity.write().await = Some(offline.clone());
            Ok(offline)
        })
    }

    fn sign_out(&self) -> BoxFuture<'static, Result<(), AuthError>> {
        let identity = self.identity.clone();
        Box::pin(async move {
            identity.write().await.take();
            Ok(())
        })
    }

    fn current_identity(&self) -> BoxFuture<'static, Option<Identity>> {
        let identity = self.identity.clone();
        Box::pin(async move { identity.read().await.clone() })
    }

    fn register_user(&self, user: NewUser) -> BoxFuture<'static, Result<UserEntity, RegError>> {
        let backend = self.clone();
        Box::pin(async move {
            let _guard = backend.write_lock.lock().await;
            let mut users: Vec<UserEntity> = backend.kv.read(USERS_KEY).await;
            check_unique(&users, &user)?;

            let entity = UserEntity {
                username: user.username.trim().to_owned(),
                email: user.email.trim().to_owned(),
                password: user.password,
                google_id: String::new(),
                google_name: String::new(),
                created_at: now_rfc3339(),
            };
            users.push(entity.clone());
            backend.kv.write(USERS_KEY, &users).await?;

            info!(username = %entity.username, "registered local user");
            Ok(entity)
        })
    }

    fn login_user(
        &self,
        username_or_email: String,
        password: String,
    ) -> BoxFuture<'static, Result<UserEntity, AuthError>> {
        let backend = self.clone();
        Box::pin(async move {
            let users: Vec<UserEntity> = backend.kv.read(USERS_KEY).await;
            find_login(users, &username_or_email, &password)
        })
    }

    fn save_score(
        &self,
        mut round: ScoreRoundEntity,
    ) -> BoxFuture<'static, Result<SaveAck, SaveError>> {
        let backend = self.clone();
        Box::pin(async move {
            let _guard = backend.write_lock.lock().await;
            let mut rounds: Vec<StoredRound> = backend.kv.read(SCORES_KEY).await;

            let id = Self::next_round_id(&rounds);
            round.id = id.clone();
            rounds.push(StoredRound {
                round,
                recorded_at: now_rfc3339(),
            });
            backend.kv.write(SCORES_KEY, &rounds).await?;

            debug!(%id, "stored round locally");
            Ok(SaveAck { id: Some(id) })
        })
    }

    fn get_scores(&self) -> BoxFuture<'static, Result<Vec<ScoreRoundEntity>, FetchError>> {
        let backend = self.clone();
        Box::pin(async move {
            let rounds: Vec<StoredRound> = backend.kv.read(SCORES_KEY).await;
            Ok(rounds.into_iter().map(|stored| stored.round).collect())
        })
    }

    fn restore_session(&self) -> BoxFuture<'static, Option<UserEntity>> {
        let backend = self.clone();
        Box::pin(async move { backend.kv.read::<Option<UserEntity>>(SESSION_KEY).await })
    }

    fn persist_session(&self, user: Option<UserEntity>) -> BoxFuture<'static, ()> {
        let backend = self.clone();
        Box::pin(async move {
            let result = match &user {
                Some(user) => backend.kv.write(SESSION_KEY, user).await,
                None => backend.kv.remove(SESSION_KEY).await,
            };
            if let Err(err) = result {
                warn!(error = %err, "failed to persist local session");
            }
        })
    }
}
