use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use crate::dao::{
    backend::{
        BackendKind, ScoreBackend, check_unique,
        classify::{FailureSignal, InitStage, classify_init_failure},
        error::{AuthError, FetchError, InitError, RegError, SaveError},
        find_login,
    },
    models::{
        AuthGrant, Identity, NewUser, SaveAck, ScoreRoundEntity, SignInMode, UserEntity,
        now_rfc3339,
    },
};

use super::{
    config::SheetsConfig,
    error::{SheetsDaoError, SheetsResult},
    models::{
        AppendResponse, GoogleErrorEnvelope, OpenIdConfiguration, ValueRange, ValueRangeBody,
        round_to_row, rounds_from_rows, scores_header, user_to_row, users_from_rows,
        users_header,
    },
    oauth::OAuthEndpoints,
};

/// Cells are stored exactly as sent, so passwords like `000123` or names starting with `=`
/// are never reinterpreted as numbers or formulas.
const VALUE_INPUT_OPTION: &str = "RAW";

/// One table inside a spreadsheet.
#[derive(Clone)]
struct SheetTable {
    spreadsheet_id: Arc<str>,
    range: Arc<str>,
    header: fn() -> Vec<String>,
    // Set once the table is known to start with a header row.
    header_ready: Arc<OnceCell<()>>,
}

impl SheetTable {
    fn new(spreadsheet_id: &str, range: &str, header: fn() -> Vec<String>) -> Self {
        Self {
            spreadsheet_id: Arc::from(spreadsheet_id),
            range: Arc::from(range),
            header,
            header_ready: Arc::new(OnceCell::new()),
        }
    }

    /// `Sheet!A1`, where the header row lives.
    fn header_range(&self) -> String {
        match self.range.split_once('!') {
            Some((sheet, _)) => format!("{sheet}!A1"),
            None => "A1".to_owned(),
        }
    }
}

struct SignedIn {
    access_token: String,
    identity: Identity,
}

/// Score backend storing users and rounds in Google Sheets.
#[derive(Clone)]
pub struct RemoteBackend {
    client: Client,
    config: Arc<SheetsConfig>,
    users: SheetTable,
    scores: SheetTable,
    endpoints: Arc<OnceCell<OAuthEndpoints>>,
    session: Arc<RwLock<Option<SignedIn>>>,
}

impl RemoteBackend {
    /// Build the HTTP client. No request is made until [`ScoreBackend::init`].
    pub fn new(config: SheetsConfig) -> SheetsResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| SheetsDaoError::ClientBuilder { source })?;

        Ok(Self {
            client,
            users: SheetTable::new(&config.users_spreadsheet_id, &config.users_range, users_header),
            scores: SheetTable::new(
                &config.scores_spreadsheet_id,
                &config.scores_range,
                scores_header,
            ),
            config: Arc::new(config),
            endpoints: Arc::new(OnceCell::new()),
            session: Arc::new(RwLock::new(None)),
        })
    }

    async fn bootstrap(&self) -> Result<OAuthEndpoints, InitError> {
        let _: Value = self
            .fetch_init_document(InitStage::ClientLibrary, &self.config.discovery_url)
            .await?;
        debug!(url = %self.config.discovery_url, "Sheets API description loaded");

        let openid: OpenIdConfiguration = self
            .fetch_init_document(InitStage::AuthSubsystem, &self.config.oauth.openid_config_url)
            .await?;
        debug!(url = %self.config.oauth.openid_config_url, "OAuth endpoints discovered");

        Ok(openid.into())
    }

    async fn fetch_init_document<T>(&self, stage: InitStage, url: &str) -> Result<T, InitError>
    where
        T: DeserializeOwned,
    {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => return Err(transport_init_error(stage, url, err)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let google = serde_json::from_str::<GoogleErrorEnvelope>(&body).ok();
            let signal = FailureSignal {
                status: Some(status.as_u16()),
                google_status: google.as_ref().and_then(|g| g.error.status.as_deref()),
                google_reason: google.as_ref().and_then(|g| g.error.reason()),
                message: google.as_ref().map_or(body.as_str(), |g| g.error.message.as_str()),
                ..Default::default()
            };
            let kind = classify_init_failure(stage, &signal);
            warn!(?stage, %url, %status, raw = %body, ?kind, "initialization request rejected");
            return Err(InitError::new(kind, format!("{url} answered {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| transport_init_error(stage, url, err))
    }

    async fn bearer(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|signed_in| signed_in.access_token.clone())
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> SheetsResult<Url> {
        let base = self.config.api_base_url.trim_end_matches('/');
        let invalid = |message: &str| SheetsDaoError::InvalidUrl {
            url: base.to_owned(),
            message: message.to_owned(),
        };
        let mut url = Url::parse(base).map_err(|err| invalid(&err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
        Ok(url)
    }

    fn authorized(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(token)
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> SheetsResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|source| SheetsDaoError::RequestSend {
                path: path.to_owned(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GoogleErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or(body);
        if status == StatusCode::UNAUTHORIZED {
            warn!(%path, "Sheets refused the access token; signing out");
            self.session.write().await.take();
        }
        Err(SheetsDaoError::RequestStatus {
            path: path.to_owned(),
            status,
            message,
        })
    }

    async fn get_values(&self, table: &SheetTable, token: &str) -> SheetsResult<Vec<Vec<Value>>> {
        let url = self.values_url(&table.spreadsheet_id, &table.range)?;
        let response = self
            .send(&table.range, self.authorized(Method::GET, url, token))
            .await?;
        let values = response
            .json::<ValueRange>()
            .await
            .map_err(|source| SheetsDaoError::DecodeResponse {
                path: table.range.to_string(),
                source,
            })?;
        Ok(values.values)
    }

    async fn append_row(
        &self,
        table: &SheetTable,
        token: &str,
        row: Vec<String>,
    ) -> SheetsResult<AppendResponse> {
        let url = self.values_url(&table.spreadsheet_id, &format!("{}:append", table.range))?;
        let request = self
            .authorized(Method::POST, url, token)
            .query(&[
                ("valueInputOption", VALUE_INPUT_OPTION),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&ValueRangeBody::rows(&table.range, vec![row]));
        let response = self.send(&table.range, request).await?;
        response
            .json::<AppendResponse>()
            .await
            .map_err(|source| SheetsDaoError::DecodeResponse {
                path: table.range.to_string(),
                source,
            })
    }

    async fn write_header(&self, table: &SheetTable, token: &str) -> SheetsResult<()> {
        let range = table.header_range();
        let url = self.values_url(&table.spreadsheet_id, &range)?;
        let request = self
            .authorized(Method::PUT, url, token)
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .json(&ValueRangeBody::rows(&range, vec![(table.header)()]));
        self.send(&range, request).await?;
        info!(range = %table.range, "wrote header row to empty table");
        Ok(())
    }

    /// Write the header row the first time a table is seen empty.
    ///
    /// `known_rows` avoids a second read when the caller already fetched the table.
    async fn ensure_header(
        &self,
        table: &SheetTable,
        token: &str,
        known_rows: Option<&[Vec<Value>]>,
    ) -> SheetsResult<()> {
        table
            .header_ready
            .get_or_try_init(|| async {
                let is_empty = match known_rows {
                    Some(rows) => rows.is_empty(),
                    None => self.get_values(table, token).await?.is_empty(),
                };
                if is_empty {
                    self.write_header(table, token).await?;
                }
                Ok::<_, SheetsDaoError>(())
            })
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
impl RemoteBackend {
    pub(super) async fn set_access_token(&self, token: &str) {
        if let Some(signed_in) = self.session.write().await.as_mut() {
            signed_in.access_token = token.to_owned();
        }
    }
}

fn transport_init_error(stage: InitStage, url: &str, err: reqwest::Error) -> InitError {
    let text = err.to_string();
    let signal = FailureSignal {
        timed_out: err.is_timeout(),
        connect_failed: err.is_connect(),
        status: err.status().map(|status| status.as_u16()),
        message: &text,
        ..Default::default()
    };
    let kind = classify_init_failure(stage, &signal);
    warn!(?stage, %url, error = %text, ?kind, "initialization request failed");
    InitError::new(kind, format!("request to {url} failed")).with_source(err)
}

impl ScoreBackend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn sign_in_mode(&self) -> SignInMode {
        self.config.oauth.mode
    }

    fn consent_url(&self, state: &str) -> Option<String> {
        self.endpoints
            .get()?
            .consent_url(&self.config.oauth, state)
    }

    fn init(&self) -> BoxFuture<'static, Result<(), InitError>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.config.validate()?;
            backend
                .endpoints
                .get_or_try_init(|| backend.bootstrap())
                .await?;
            Ok(())
        })
    }

    fn sign_in(&self, grant: AuthGrant) -> BoxFuture<'static, Result<Identity, AuthError>> {
        let backend = self.clone();
        Box::pin(async move {
            let expected = backend.config.oauth.mode;
            if grant.mode() != expected {
                return Err(AuthError::ModeMismatch { expected });
            }
            let endpoints = backend
                .endpoints
                .get()
                .ok_or_else(|| AuthError::provider("auth subsystem is not loaded"))?;

            let access_token = match grant {
                AuthGrant::AccessToken(token) => token,
                AuthGrant::AuthorizationCode(code) => {
                    endpoints
                        .exchange_code(&backend.client, &backend.config.oauth, &code)
                        .await?
                }
            };
            let identity = endpoints.userinfo(&backend.client, &access_token).await?;

            info!(email = %identity.email, "signed in with Google");
            *backend.session.write().await = Some(SignedIn {
                access_token,
                identity: identity.clone(),
            });
            Ok(identity)
        })
    }

    fn sign_out(&self) -> BoxFuture<'static, Result<(), AuthError>> {
        let backend = self.clone();
        Box::pin(async move {
            let Some(signed_in) = backend.session.write().await.take() else {
                return Ok(());
            };
            if let Some(endpoints) = backend.endpoints.get() {
                if let Err(err) = endpoints
                    .revoke(&backend.client, &signed_in.access_token)
                    .await
                {
                    warn!(error = %err, "failed to revoke Google token");
                }
            }
            info!(email = %signed_in.identity.email, "signed out of Google");
            Ok(())
        })
    }

    fn current_identity(&self) -> BoxFuture<'static, Option<Identity>> {
        let session = self.session.clone();
        Box::pin(async move {
            session
                .read()
                .await
                .as_ref()
                .map(|signed_in| signed_in.identity.clone())
        })
    }

    fn register_user(&self, user: NewUser) -> BoxFuture<'static, Result<UserEntity, RegError>> {
        let backend = self.clone();
        Box::pin(async move {
            let token = backend.bearer().await.ok_or(RegError::NotAuthenticated)?;
            let rows = backend.get_values(&backend.users, &token).await?;
            backend
                .ensure_header(&backend.users, &token, Some(rows.as_slice()))
                .await?;

            // Check-then-append is not atomic across clients sharing the sheet.
            check_unique(&users_from_rows(&rows), &user)?;

            let identity = backend.current_identity().await.unwrap_or_else(|| Identity {
                id: String::new(),
                name: String::new(),
                email: String::new(),
            });
            let entity = UserEntity {
                username: user.username.trim().to_owned(),
                email: user.email.trim().to_owned(),
                password: user.password,
                google_id: identity.id,
                google_name: identity.name,
                created_at: now_rfc3339(),
            };
            backend
                .append_row(&backend.users, &token, user_to_row(&entity))
                .await?;

            info!(username = %entity.username, "registered user in Sheets");
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
            let token = backend.bearer().await.ok_or(AuthError::NotAuthenticated)?;
            let rows = backend.get_values(&backend.users, &token).await?;
            find_login(users_from_rows(&rows), &username_or_email, &password)
        })
    }

    fn save_score(&self, round: ScoreRoundEntity) -> BoxFuture<'static, Result<SaveAck, SaveError>> {
        let backend = self.clone();
        Box::pin(async move {
            let token = backend.bearer().await.ok_or(SaveError::NotAuthenticated)?;
            backend.ensure_header(&backend.scores, &token, None).await?;

            let row = round_to_row(&round).map_err(|source| SheetsDaoError::EncodeRow {
                range: backend.scores.range.to_string(),
                source,
            })?;
            let response = backend.append_row(&backend.scores, &token, row).await?;
            let id = response.row_id();

            debug!(id = ?id, username = %round.username, "appended round to Sheets");
            Ok(SaveAck { id })
        })
    }

    fn get_scores(&self) -> BoxFuture<'static, Result<Vec<ScoreRoundEntity>, FetchError>> {
        let backend = self.clone();
        Box::pin(async move {
            let token = backend.bearer().await.ok_or(FetchError::NotAuthenticated)?;
            let rows = backend.get_values(&backend.scores, &token).await?;
            Ok(rounds_from_rows(&rows))
        })
    }
}
