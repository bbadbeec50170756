//! Google OAuth endpoints discovered at init time.

use reqwest::{Client, Response, StatusCode, Url};
use tracing::{debug, warn};

use crate::dao::{
    backend::{classify::classify_auth_failure, error::AuthError},
    models::{Identity, SignInMode},
};

use super::{
    config::OAuthConfig,
    models::{OAuthErrorBody, OpenIdConfiguration, TokenResponse, UserInfo},
};

/// OAuth endpoints needed to run the sign-in flow.
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    discovered: OpenIdConfiguration,
}

impl From<OpenIdConfiguration> for OAuthEndpoints {
    fn from(discovered: OpenIdConfiguration) -> Self {
        Self { discovered }
    }
}

impl OAuthEndpoints {
    /// Consent screen URL for the configured mode, when a redirect URI is known.
    pub fn consent_url(&self, config: &OAuthConfig, state: &str) -> Option<String> {
        let redirect_uri = config.redirect_uri.as_deref()?;
        let response_type = match config.mode {
            SignInMode::Popup => "token",
            SignInMode::Redirect => "code",
        };
        let url = Url::parse_with_params(
            &self.discovered.authorization_endpoint,
            &[
                ("client_id", config.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", response_type),
                ("scope", config.scope.as_str()),
                ("state", state),
                ("include_granted_scopes", "true"),
            ],
        );
        match url {
            Ok(url) => Some(url.into()),
            Err(err) => {
                warn!(
                    endpoint = %self.discovered.authorization_endpoint,
                    error = %err,
                    "invalid authorization endpoint"
                );
                None
            }
        }
    }

    /// Trade an authorization code for an access token.
    pub async fn exchange_code(
        &self,
        client: &Client,
        config: &OAuthConfig,
        code: &str,
    ) -> Result<String, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", config.client_id.as_str()),
            (
                "client_secret",
                config.client_secret.as_deref().unwrap_or_default(),
            ),
            (
                "redirect_uri",
                config.redirect_uri.as_deref().unwrap_or_default(),
            ),
        ];
        let response = client
            .post(&self.discovered.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(provider_unreachable)?;

        let response = ensure_success(response).await?;
        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(provider_unreachable)?;
        debug!("exchanged authorization code for an access token");
        Ok(token.access_token)
    }

    /// Validate `access_token` by loading the profile it belongs to.
    pub async fn userinfo(&self, client: &Client, access_token: &str) -> Result<Identity, AuthError> {
        let response = client
            .get(&self.discovered.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(provider_unreachable)?;

        let response = ensure_success(response).await?;
        let info = response
            .json::<UserInfo>()
            .await
            .map_err(provider_unreachable)?;
        Ok(info.into())
    }

    /// Revoke `access_token`. Providers without a revocation endpoint are a no-op.
    pub async fn revoke(&self, client: &Client, access_token: &str) -> Result<(), AuthError> {
        let Some(endpoint) = self.discovered.revocation_endpoint.as_deref() else {
            return Ok(());
        };
        let response = client
            .post(endpoint)
            .form(&[("token", access_token)])
            .send()
            .await
            .map_err(provider_unreachable)?;
        ensure_success(response).await.map(|_| ())
    }
}

fn provider_unreachable(err: reqwest::Error) -> AuthError {
    AuthError::Provider {
        message: "auth provider request failed".into(),
        source: Some(Box::new(err)),
    }
}

async fn ensure_success(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<OAuthErrorBody>(&body) {
        Ok(parsed) => Err(classify_auth_failure(
            Some(&parsed.error),
            &parsed.error_description,
        )),
        Err(_) if status == StatusCode::UNAUTHORIZED => Err(AuthError::InvalidToken),
        Err(_) => Err(classify_auth_failure(
            None,
            &format!("auth provider answered {status}: {body}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> OAuthEndpoints {
        OpenIdConfiguration {
            authorization_endpoint: "https://accounts.example.com/o/oauth2/v2/auth".into(),
            token_endpoint: "https://oauth2.example.com/token".into(),
            userinfo_endpoint: "https://openidconnect.example.com/v1/userinfo".into(),
            revocation_endpoint: None,
        }
        .into()
    }

    #[test]
    fn consent_url_needs_a_redirect_uri() {
        assert!(
            endpoints()
                .consent_url(&OAuthConfig::new("client"), "state-1")
                .is_none()
        );
    }

    #[test]
    fn consent_url_carries_mode_and_state() {
        let config = OAuthConfig::new("client-1").with_redirect("http://localhost:8080/cb", "s");
        let url = endpoints().consent_url(&config, "state-1").unwrap();
        let parsed = Url::parse(&url).unwrap();
        let params: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();

        assert!(params.contains(&("response_type".into(), "code".into())));
        assert!(params.contains(&("state".into(), "state-1".into())));
        assert!(params.contains(&("client_id".into(), "client-1".into())));
        assert!(
            params
                .iter()
                .any(|(key, value)| key == "scope" && value.contains("spreadsheets"))
        );
    }

    #[test]
    fn popup_mode_requests_tokens() {
        let mut config = OAuthConfig::new("client-1");
        config.redirect_uri = Some("http://localhost:8080/popup".into());
        let url = endpoints().consent_url(&config, "s").unwrap();
        assert!(url.contains("response_type=token"));
    }
}
