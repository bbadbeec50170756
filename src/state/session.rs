use crate::dao::models::{Identity, UserEntity};

/// What the controller remembers about the person using the application.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Application account logged in through register/login.
    pub current_user: Option<UserEntity>,
    /// Provider profile of the signed-in Google account (synthetic offline).
    pub identity: Option<Identity>,
    /// `state` parameter handed out with the last consent URL, checked on callback.
    pub pending_oauth_state: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }
}
