//! DTO definitions for account and Google sign-in endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::dao::{
    backend::BackendKind,
    models::{Identity, SignInMode, UserEntity},
};

/// Account creation payload.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64, message = "username must not be empty"))]
    pub username: String,
    #[validate(email(message = "email address is not valid"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub confirm_password: String,
}

/// Login with either the username or the email address.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username or email is required"))]
    pub username_or_email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Public view of an account. Never carries the password.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct UserSummary {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub google_name: String,
    pub created_at: String,
}

impl From<&UserEntity> for UserSummary {
    fn from(user: &UserEntity) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            google_name: user.google_name.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

/// Basic Google profile.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct IdentityDto {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<Identity> for IdentityDto {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.name,
            email: identity.email,
        }
    }
}

/// Who is using the application right now.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthStatusResponse {
    /// True once an application account is logged in.
    pub authenticated: bool,
    pub user: Option<UserSummary>,
    /// Signed-in Google account, or the synthetic offline identity.
    pub identity: Option<IdentityDto>,
    #[schema(value_type = Option<String>)]
    pub backend: Option<BackendKind>,
}

/// What the client needs to start Google sign-in.
#[derive(Debug, Serialize, ToSchema)]
pub struct GoogleSignInOptions {
    #[schema(value_type = String)]
    pub mode: SignInMode,
    /// Consent screen to open (popup) or navigate to (redirect). Absent offline.
    pub consent_url: Option<String>,
    /// Anti-forgery value the redirect callback must echo back.
    pub state: Option<String>,
}

/// Outcome of the popup flow posted by the client.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GoogleTokenRequest {
    #[validate(length(min = 1, message = "access token must not be empty"))]
    pub access_token: Option<String>,
    /// Error code reported by the popup instead of a token (e.g. `popup_closed_by_user`).
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Query string the provider appends to the redirect URI.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Result of a successful Google sign-in.
#[derive(Debug, Serialize, ToSchema)]
pub struct GoogleSignInResponse {
    pub identity: IdentityDto,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            username: "alice".into(),
            email: "a@x.com".into(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    #[test]
    fn register_requires_matching_passwords() {
        assert!(register("pw1234", "pw1234").validate().is_ok());

        let errors = register("pw1234", "pw9999").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("confirm_password"));
    }

    #[test]
    fn register_rejects_short_password_and_bad_email() {
        let errors = register("pw1", "pw1").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));

        let mut request = register("pw1234", "pw1234");
        request.email = "not-an-email".into();
        assert!(request.validate().is_err());
    }

    #[test]
    fn summary_hides_password() {
        let user = UserEntity {
            username: "alice".into(),
            email: "a@x.com".into(),
            password: "pw123".into(),
            google_id: String::new(),
            google_name: String::new(),
            created_at: "2024-01-15T00:00:00Z".into(),
        };
        let json = serde_json::to_value(UserSummary::from(&user)).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("google_name").is_none());
    }
}
