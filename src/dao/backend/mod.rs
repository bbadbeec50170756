pub mod classify;
pub mod error;
pub mod local;
#[cfg(feature = "sheets-store")]
pub mod sheets;

use futures::future::BoxFuture;
use serde::Serialize;

use crate::dao::models::{
    AuthGrant, Identity, NewUser, SaveAck, ScoreRoundEntity, SignInMode, Stats, UserEntity,
};

use self::error::{AuthError, FetchError, InitError, RegError, SaveError};

/// Which concrete store sits behind a [`ScoreBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Google Sheets reached over OAuth-authenticated HTTP.
    Remote,
    /// JSON documents on local disk.
    Local,
}

/// Operations every score store offers, so callers never need to know which one is installed.
pub trait ScoreBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// How the client is expected to complete provider sign-in.
    fn sign_in_mode(&self) -> SignInMode {
        SignInMode::Popup
    }

    /// Provider consent screen to send the user to, when the backend has one.
    fn consent_url(&self, _state: &str) -> Option<String> {
        None
    }

    /// Prepare the backend. Repeated calls after a success are no-ops.
    fn init(&self) -> BoxFuture<'static, Result<(), InitError>>;

    fn sign_in(&self, grant: AuthGrant) -> BoxFuture<'static, Result<Identity, AuthError>>;

    fn sign_out(&self) -> BoxFuture<'static, Result<(), AuthError>>;

    fn current_identity(&self) -> BoxFuture<'static, Option<Identity>>;

    fn register_user(&self, user: NewUser) -> BoxFuture<'static, Result<UserEntity, RegError>>;

    fn login_user(
        &self,
        username_or_email: String,
        password: String,
    ) -> BoxFuture<'static, Result<UserEntity, AuthError>>;

    fn save_score(&self, round: ScoreRoundEntity) -> BoxFuture<'static, Result<SaveAck, SaveError>>;

    fn get_scores(&self) -> BoxFuture<'static, Result<Vec<ScoreRoundEntity>, FetchError>>;

    /// Statistics are always derived from [`ScoreBackend::get_scores`].
    fn get_statistics(&self) -> BoxFuture<'static, Result<Stats, FetchError>> {
        let scores = self.get_scores();
        Box::pin(async move {
            let rounds = scores.await?;
            Ok(Stats::from_rounds(&rounds))
        })
    }

    /// User remembered from a previous run, if the backend persists sessions.
    fn restore_session(&self) -> BoxFuture<'static, Option<UserEntity>> {
        Box::pin(async { None })
    }

    /// Remember (or forget, with `None`) the logged-in user across restarts.
    fn persist_session(&self, _user: Option<UserEntity>) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}

/// Case-insensitive collision check shared by every backend's registration path.
pub(crate) fn check_unique(users: &[UserEntity], candidate: &NewUser) -> Result<(), RegError> {
    if users
        .iter()
        .any(|user| user.username.eq_ignore_ascii_case(candidate.username.trim()))
    {
        return Err(RegError::UsernameTaken);
    }
    if users
        .iter()
        .any(|user| user.email.eq_ignore_ascii_case(candidate.email.trim()))
    {
        return Err(RegError::EmailTaken);
    }
    Ok(())
}

/// Login lookup shared by every backend: case-insensitive name, exact password.
pub(crate) fn find_login(
    users: Vec<UserEntity>,
    username_or_email: &str,
    password: &str,
) -> Result<UserEntity, AuthError> {
    let user = users
        .into_iter()
        .find(|user| user.matches_login(username_or_email))
        .ok_or(AuthError::UserNotFound)?;

    if user.password.is_empty() || user.password != password {
        return Err(AuthError::BadPassword);
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: &str, email: &str, password: &str) -> UserEntity {
        UserEntity {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            google_id: String::new(),
            google_name: String::new(),
            created_at: "2024-01-15T00:00:00Z".into(),
        }
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password: "pw123".into(),
        }
    }

    #[test]
    fn uniqueness_ignores_case() {
        let users = vec![user("alice", "a@x.com", "pw123")];
        assert!(matches!(
            check_unique(&users, &new_user("ALICE", "other@x.com")),
            Err(RegError::UsernameTaken)
        ));
        assert!(matches!(
            check_unique(&users, &new_user("bob", "A@X.com")),
            Err(RegError::EmailTaken)
        ));
        assert!(check_unique(&users, &new_user("bob", "b@x.com")).is_ok());
    }

    #[test]
    fn login_password_is_case_sensitive() {
        let users = vec![user("alice", "a@x.com", "pw123")];
        assert_eq!(
            find_login(users.clone(), "A@X.COM", "pw123").unwrap().username,
            "alice"
        );
        assert!(matches!(
            find_login(users.clone(), "alice", "PW123"),
            Err(AuthError::BadPassword)
        ));
        assert!(matches!(
            find_login(users, "carol", "pw123"),
            Err(AuthError::UserNotFound)
        ));
    }

    #[test]
    fn empty_stored_password_never_matches() {
        let users = vec![user("alice", "a@x.com", "")];
        assert!(matches!(
            find_login(users, "alice", ""),
            Err(AuthError::BadPassword)
        ));
    }
}
