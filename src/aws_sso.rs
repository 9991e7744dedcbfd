use crate::config::{Config, Profile, SsoSessionConfig};
use crate::error::{describe, Error, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sso::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_sso::operation::get_role_credentials::GetRoleCredentialsError;
use aws_sdk_sso::types::{AccountInfo, RoleCredentials, RoleInfo};
use aws_sdk_ssooidc::operation::create_token::{CreateTokenError, CreateTokenOutput};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Add;
use tracing::{debug, info, warn};

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
    pub account_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

impl Account {
    pub fn new(account_id: &str, account_name: &str) -> Self {
        Self {
            account_id: String::from(account_id),
            account_name: String::from(account_name),
            email_address: None,
        }
    }
}

impl From<&AccountInfo> for Account {
    fn from(value: &AccountInfo) -> Self {
        let mut account = Account::new(
            value.account_id().unwrap_or_default(),
            value.account_name().unwrap_or_default(),
        );
        account.email_address = value.email_address().map(String::from);
        account
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub role_name: String,
    pub account_id: String,
}

impl From<&RoleInfo> for Role {
    fn from(value: &RoleInfo) -> Self {
        Self {
            role_name: String::from(value.role_name().unwrap_or_default()),
            account_id: String::from(value.account_id().unwrap_or_default()),
        }
    }
}

/// A candidate account/role pair; the role may not exist on the account.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub account_name: String,
    pub account_id: String,
    pub role: String,
}

impl Association {
    pub fn new(account: &Account, role: &str) -> Self {
        Self {
            account_name: account.account_name.clone(),
            account_id: account.account_id.clone(),
            role: String::from(role),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Environment variables handed to the repeated command.
    pub fn env(&self) -> [(&'static str, &str); 3] {
        [
            ("AWS_ACCESS_KEY_ID", self.access_key_id.as_str()),
            ("AWS_SECRET_ACCESS_KEY", self.secret_access_key.as_str()),
            ("AWS_SESSION_TOKEN", self.session_token.as_str()),
        ]
    }
}

impl From<&RoleCredentials> for Credentials {
    fn from(value: &RoleCredentials) -> Self {
        Self {
            access_key_id: String::from(value.access_key_id().unwrap_or_default()),
            secret_access_key: String::from(value.secret_access_key().unwrap_or_default()),
            session_token: String::from(value.session_token().unwrap_or_default()),
            // milliseconds since epoch, zero when unset
            expiration: match value.expiration() {
                0 => None,
                millis => Utc.timestamp_millis_opt(millis).single(),
            },
        }
    }
}

/// Account enumeration and credential vending for one SSO session.
#[async_trait]
pub trait SsoProvider {
    async fn list_accounts(&self) -> Result<Vec<Account>>;

    async fn list_account_roles(&self, account_id: &str) -> Result<Vec<Role>>;

    /// `None` when the session is not allowed to assume `role_name` in the account.
    async fn get_credentials(&self, account_id: &str, role_name: &str)
        -> Result<Option<Credentials>>;
}

/// Token cache entry as written by `aws sso login`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSession {
    start_url: String,
    region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scopes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    registration_expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    credentials: Option<SSOToken>,
}

impl CachedSession {
    pub fn matches(&self, session: &SsoSessionConfig) -> bool {
        self.start_url == session.start_url && self.region.as_deref() == Some(&session.region)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.credentials.as_ref()?.access_token.as_deref()
    }

    pub fn is_expired(&self) -> bool {
        match &self.credentials {
            Some(token) => token.is_expired(),
            None => true,
        }
    }

    fn registration_is_expired(&self) -> bool {
        match &self.registration_expires_at {
            Some(expires) => &Utc::now() >= expires,
            None => true,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.client_id.is_some()
            && self.client_secret.is_some()
            && !self.registration_is_expired()
            && self
                .credentials
                .as_ref()
                .map_or(false, |token| token.refresh_token.is_some())
    }

    pub async fn refresh_token(
        &mut self,
        aws_config: &SdkConfig,
    ) -> std::result::Result<(), SdkError<CreateTokenError>> {
        let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
            self.credentials
                .as_ref()
                .and_then(|token| token.refresh_token.as_deref()),
        ) else {
            return Ok(());
        };
        let client = aws_sdk_ssooidc::Client::new(aws_config);
        let output = client
            .create_token()
            .client_id(client_id)
            .client_secret(client_secret)
            .grant_type("refresh_token")
            .refresh_token(refresh_token)
            .send()
            .await?;
        let mut token = SSOToken::from(output);
        // the service does not always rotate the refresh token
        if token.refresh_token.is_none() {
            token.refresh_token = Some(String::from(refresh_token));
        }
        self.credentials = Some(token);
        Ok(())
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SSOToken {
    access_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl From<CreateTokenOutput> for SSOToken {
    fn from(value: CreateTokenOutput) -> Self {
        Self {
            access_token: value.access_token().map(String::from),
            expires_at: Some(Utc::now().add(Duration::seconds(value.expires_in() as i64))),
            refresh_token: value.refresh_token().map(String::from),
        }
    }
}

impl SSOToken {
    fn is_expired(&self) -> bool {
        match (&self.access_token, &self.expires_at) {
            (Some(_), Some(expires)) => &Utc::now() >= expires,
            _ => true,
        }
    }
}

/// The SSO portal API, authorized by the cached token of a profile's sso-session.
pub struct SsoSession {
    client: aws_sdk_sso::Client,
    access_token: String,
    default_role_name: String,
}

impl SsoSession {
    pub async fn open(config: &Config, profile_name: Option<&str>) -> Result<Self> {
        let profile = config.profile(profile_name)?;
        debug!(
            "Using profile `{}` with sso-session `{}`",
            profile.name, profile.sso_session.name
        );
        let aws_config = config.load_sdk_config(&profile.sso_session.region).await;
        let access_token = retrieve_token(config, &profile, &aws_config).await?;
        Ok(Self {
            client: aws_sdk_sso::Client::new(&aws_config),
            access_token,
            default_role_name: profile.sso_role_name,
        })
    }

    pub fn default_role_name(&self) -> &str {
        &self.default_role_name
    }
}

async fn retrieve_token(
    config: &Config,
    profile: &Profile,
    aws_config: &SdkConfig,
) -> Result<String> {
    let session = &profile.sso_session;
    let mut cached: CachedSession = config
        .load_sso_cache(&session.name)
        .filter(|cache: &CachedSession| cache.matches(session))
        .ok_or_else(|| {
            Error::TokenRetrieval(format!(
                "no cached token found for sso-session '{}'",
                session.name
            ))
        })?;

    if cached.is_expired() {
        if !cached.can_refresh() {
            return Err(Error::TokenRetrieval(format!(
                "the token of sso-session '{}' has expired",
                session.name
            )));
        }
        cached
            .refresh_token(aws_config)
            .await
            .map_err(|err| Error::TokenRetrieval(describe(&err)))?;
        info!("Refreshed token of sso-session `{}`", session.name);
        if let Err(err) = config.write_sso_cache(&session.name, &cached) {
            warn!("Failed to update the token cache: {}", err);
        }
    }

    cached
        .access_token()
        .map(String::from)
        .ok_or_else(|| Error::TokenRetrieval(String::from("the cached token is empty")))
}

/// The pair does not exist or the user may not assume it.
fn is_forbidden(err: &GetRoleCredentialsError) -> bool {
    err.is_resource_not_found_exception()
        || matches!(
            err.code(),
            Some("ForbiddenException") | Some("ResourceNotFoundException")
        )
}

#[async_trait]
impl SsoProvider for SsoSession {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .client
                .list_accounts()
                .access_token(self.access_token.as_str())
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|err| Error::Sso(describe(&err)))?;
            accounts.extend(
                output
                    .account_list()
                    .unwrap_or_default()
                    .iter()
                    .map(Account::from),
            );
            next_token = output.next_token().map(String::from);
            if next_token.is_none() {
                break;
            }
        }
        debug!("Fetched {} accounts", accounts.len());
        Ok(accounts)
    }

    async fn list_account_roles(&self, account_id: &str) -> Result<Vec<Role>> {
        let mut roles = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .client
                .list_account_roles()
                .access_token(self.access_token.as_str())
                .account_id(account_id)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|err| Error::Sso(describe(&err)))?;
            roles.extend(output.role_list().unwrap_or_default().iter().map(Role::from));
            next_token = output.next_token().map(String::from);
            if next_token.is_none() {
                break;
            }
        }
        debug!("Fetched {} roles for account `{}`", roles.len(), account_id);
        Ok(roles)
    }

    async fn get_credentials(
        &self,
        account_id: &str,
        role_name: &str,
    ) -> Result<Option<Credentials>> {
        debug!(
            "Fetching credentials for account_id: `{}`, role: `{}`",
            account_id, role_name
        );
        let result = self
            .client
            .get_role_credentials()
            .access_token(self.access_token.as_str())
            .account_id(account_id)
            .role_name(role_name)
            .send()
            .await;
        match result {
            Ok(output) => output
                .role_credentials()
                .map(|cred| Some(Credentials::from(cred)))
                .ok_or_else(|| {
                    Error::Sso(format!(
                        "no credentials returned for account `{}`, role `{}`",
                        account_id, role_name
                    ))
                }),
            Err(SdkError::ServiceError(err)) if is_forbidden(err.err()) => Ok(None),
            Err(err) => Err(Error::Sso(describe(&err))),
        }
    }
}
