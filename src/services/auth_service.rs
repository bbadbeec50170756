use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        backend::{ScoreBackend, classify::classify_auth_failure},
        models::{AuthGrant, NewUser, UserEntity},
    },
    dto::auth::{
        AuthStatusResponse, GoogleCallbackQuery, GoogleSignInOptions, GoogleSignInResponse,
        GoogleTokenRequest, LoginRequest, RegisterRequest,
    },
    error::ServiceError,
    state::SharedState,
};

/// Create an account on the installed backend and log it in.
pub async fn register(
    state: &SharedState,
    request: RegisterRequest,
) -> Result<AuthStatusResponse, ServiceError> {
    let backend = state.require_backend().await?;
    let user = backend
        .register_user(NewUser {
            username: request.username.trim().to_owned(),
            email: request.email.trim().to_owned(),
            password: request.password,
        })
        .await?;

    info!(username = %user.username, backend = ?backend.kind(), "user registered");
    log_in(state, &backend, user).await;
    Ok(status(state).await)
}

/// Log in with a username or email address.
pub async fn login(
    state: &SharedState,
    request: LoginRequest,
) -> Result<AuthStatusResponse, ServiceError> {
    let backend = state.require_backend().await?;
    let user = match backend
        .login_user(request.username_or_email.clone(), request.password)
        .await
    {
        Ok(user) => user,
        Err(err) => {
            debug!(login = %request.username_or_email, error = %err, "login rejected");
            return Err(err.into());
        }
    };

    info!(username = %user.username, "user logged in");
    log_in(state, &backend, user).await;
    Ok(status(state).await)
}

/// Forget the logged-in account. Provider sign-in is left untouched.
pub async fn logout(state: &SharedState) -> AuthStatusResponse {
    let previous = state.session_mut().await.current_user.take();
    if let Some(user) = previous {
        info!(username = %user.username, "user logged out");
        if let Some(backend) = state.backend().await {
            backend.persist_session(None).await;
        }
    }
    status(state).await
}

/// Describe the current session.
pub async fn status(state: &SharedState) -> AuthStatusResponse {
    let backend = state.backend_kind().await;
    let session = state.session().await;
    AuthStatusResponse {
        authenticated: session.is_authenticated(),
        user: session.current_user.as_ref().map(Into::into),
        identity: session.identity.clone().map(Into::into),
        backend,
    }
}

/// Sign-in mode and consent URL for the installed backend.
pub async fn google_options(state: &SharedState) -> Result<GoogleSignInOptions, ServiceError> {
    let backend = state.require_backend().await?;
    let oauth_state = Uuid::new_v4().simple().to_string();
    let consent_url = backend.consent_url(&oauth_state);

    let issued_state = consent_url.as_ref().map(|_| oauth_state);
    state.session_mut().await.pending_oauth_state = issued_state.clone();

    Ok(GoogleSignInOptions {
        mode: backend.sign_in_mode(),
        consent_url,
        state: issued_state,
    })
}

/// Complete popup sign-in with the token (or error) the client received.
pub async fn google_token(
    state: &SharedState,
    request: GoogleTokenRequest,
) -> Result<GoogleSignInResponse, ServiceError> {
    if let Some(code) = request.error.as_deref() {
        let description = request.error_description.as_deref().unwrap_or(code);
        return Err(classify_auth_failure(Some(code), description).into());
    }
    let token = request
        .access_token
        .ok_or_else(|| ServiceError::InvalidInput("access_token is required".into()))?;

    sign_in(state, AuthGrant::AccessToken(token)).await
}

/// Complete redirect sign-in with the code the provider sent back.
pub async fn google_callback(
    state: &SharedState,
    query: GoogleCallbackQuery,
) -> Result<GoogleSignInResponse, ServiceError> {
    let expected = state.session_mut().await.pending_oauth_state.take();

    if let Some(code) = query.error.as_deref() {
        let description = query.error_description.as_deref().unwrap_or(code);
        return Err(classify_auth_failure(Some(code), description).into());
    }
    if expected.is_none() || expected != query.state {
        warn!("OAuth callback state does not match the issued one");
        return Err(ServiceError::Unauthorized(
            "sign-in state mismatch, start again".into(),
        ));
    }
    let code = query
        .code
        .ok_or_else(|| ServiceError::InvalidInput("authorization code is missing".into()))?;

    sign_in(state, AuthGrant::AuthorizationCode(code)).await
}

/// Sign out of the provider. The application account is logged out too.
pub async fn google_sign_out(state: &SharedState) -> Result<AuthStatusResponse, ServiceError> {
    let backend = state.require_backend().await?;
    backend.sign_out().await?;

    let previous = {
        let mut session = state.session_mut().await;
        session.identity = None;
        session.pending_oauth_state = None;
        session.current_user.take()
    };
    if previous.is_some() {
        backend.persist_session(None).await;
    }
    info!("signed out of the auth provider");
    Ok(status(state).await)
}

async fn sign_in(
    state: &SharedState,
    grant: AuthGrant,
) -> Result<GoogleSignInResponse, ServiceError> {
    let backend = state.require_backend().await?;
    let identity = backend.sign_in(grant).await?;
    info!(email = %identity.email, "signed in with the auth provider");

    state.session_mut().await.identity = Some(identity.clone());
    Ok(GoogleSignInResponse {
        identity: identity.into(),
    })
}

async fn log_in(state: &SharedState, backend: &Arc<dyn ScoreBackend>, user: UserEntity) {
    backend.persist_session(Some(user.clone())).await;
    state.session_mut().await.current_user = Some(user);
}
