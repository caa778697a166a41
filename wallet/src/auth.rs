//! Sign-up and sign-in against an AWS Cognito user pool.
//!
//! Talks to the user pool's public JSON API directly: every operation is a POST
//! to the regional endpoint with an `X-Amz-Target` header naming the action. The
//! app client must allow `USER_PASSWORD_AUTH` and have no client secret.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::types::AuthStatusResponse;
use crate::config_store::AuthConfig;
use crate::errors::{WalletError, WalletResult};
use crate::validation::InputValidator;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Tokens from a successful sign-in
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub username: String,
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("username", &self.username)
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("tokens", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpResult {
    pub user_confirmed: bool,
    pub user_sub: Option<String>,
    pub code_destination: Option<String>,
}

/// Outcome of `sign_in`. Challenges are reported back, not answered.
#[derive(Debug, Clone)]
pub enum SignInOutcome {
    Authenticated(AuthSession),
    Challenge { name: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpReply {
    #[serde(default)]
    user_confirmed: bool,
    user_sub: Option<String>,
    code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CodeDeliveryDetails {
    destination: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthReply {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    expires_in: i64,
    id_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Error body returned by the service on any 4xx/5xx
#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

pub struct CognitoClient {
    client: Client,
    endpoint: String,
    client_id: String,
    validator: InputValidator,
}

impl CognitoClient {
    pub fn new(config: &AuthConfig, timeout: Duration) -> WalletResult<Self> {
        let client_id = config
            .client_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                WalletError::ValidationError(
                    "Identity provider client id is not configured".to_string(),
                )
            })?
            .to_string();

        let endpoint = match config.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => endpoint.to_string(),
            _ => {
                let region = config.region.trim();
                if region.is_empty()
                    || !region
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                {
                    return Err(WalletError::ValidationError(format!(
                        "Invalid region '{}'",
                        config.region
                    )));
                }
                format!("https://cognito-idp.{}.amazonaws.com/", region)
            }
        };

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint,
            client_id,
            validator: InputValidator::new()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Register a user with username, password and email.
    pub async fn sign_up(
        &self,
        username: &str,
        password: &SecretString,
        email: &str,
    ) -> WalletResult<SignUpResult> {
        let username = username.trim();
        let email = email.trim();
        self.validator.validate_username(username)?;
        self.validator
            .validate_account_password(password.expose_secret())?;
        self.validator.validate_email(email)?;

        let body = json!({
            "ClientId": self.client_id,
            "Username": username,
            "Password": password.expose_secret(),
            "UserAttributes": [{ "Name": "email", "Value": email }],
        });
        let reply: SignUpReply = self.call("SignUp", body).await?;
        log::info!(
            "Signed up user {} (confirmed: {})",
            username,
            reply.user_confirmed
        );

        Ok(SignUpResult {
            user_confirmed: reply.user_confirmed,
            user_sub: reply.user_sub,
            code_destination: reply.code_delivery_details.and_then(|d| d.destination),
        })
    }

    pub async fn confirm_sign_up(&self, username: &str, code: &str) -> WalletResult<()> {
        let username = username.trim();
        let code = code.trim();
        self.validator.validate_username(username)?;
        self.validator.validate_confirmation_code(code)?;

        let body = json!({
            "ClientId": self.client_id,
            "Username": username,
            "ConfirmationCode": code,
        });
        let _: Value = self.call("ConfirmSignUp", body).await?;
        log::info!("Confirmed user {}", username);
        Ok(())
    }

    pub async fn sign_in(
        &self,
        username: &str,
        password: &SecretString,
    ) -> WalletResult<SignInOutcome> {
        let username = username.trim();
        self.validator.validate_username(username)?;
        if password.expose_secret().is_empty() {
            return Err(WalletError::ValidationError(
                "Password cannot be empty".to_string(),
            ));
        }

        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {
                "USERNAME": username,
                "PASSWORD": password.expose_secret(),
            },
        });
        let reply: InitiateAuthReply = self.call("InitiateAuth", body).await?;

        if let Some(result) = reply.authentication_result {
            log::info!("Signed in as {}", username);
            return Ok(SignInOutcome::Authenticated(AuthSession {
                username: username.to_string(),
                access_token: result.access_token,
                id_token: result.id_token,
                refresh_token: result.refresh_token,
                token_type: result.token_type,
                expires_at: Utc::now() + chrono::Duration::seconds(result.expires_in.max(0)),
            }));
        }

        match reply.challenge_name {
            Some(name) => {
                log::warn!("Sign-in for {} requires challenge {}", username, name);
                Ok(SignInOutcome::Challenge { name })
            }
            None => Err(WalletError::InvalidResponse(
                "Sign-in reply had neither tokens nor a challenge".to_string(),
            )),
        }
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, body: Value) -> WalletResult<T> {
        log::debug!("Identity provider {} -> {}", action, self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, action))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(serde_json::to_vec(&body)?)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(service_error(status.as_u16(), &text));
        }

        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text)
            .map_err(|e| WalletError::InvalidResponse(format!("{} reply: {}", action, e)))
    }
}

fn service_error(status: u16, body: &str) -> WalletError {
    let parsed: Option<ServiceError> = serde_json::from_str(body).ok();
    let kind = parsed
        .as_ref()
        .and_then(|e| e.kind.as_deref())
        // Some responses carry a namespace: "com.amazonaws...#NotAuthorizedException"
        .map(|k| k.rsplit('#').next().unwrap_or(k).to_string())
        .unwrap_or_else(|| format!("HTTP {}", status));
    let message = parsed
        .and_then(|e| e.message)
        .unwrap_or_else(|| "Request rejected by identity provider".to_string());
    WalletError::AuthError { kind, message }
}

/// Persists the signed-in session under the cache directory.
#[derive(Debug, Clone)]
pub struct AuthStore {
    path: PathBuf,
}

impl AuthStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn save(&self, session: &AuthSession) -> WalletResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("new");
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        {
            let mut file = options.open(&tmp_path)?;
            file.write_all(&serde_json::to_vec(session)?)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn load(&self) -> WalletResult<Option<AuthSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        match serde_json::from_slice(&bytes) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                log::warn!("Discarding unreadable auth session: {}", err);
                Ok(None)
            }
        }
    }

    /// Remove the stored session. Returns whether one existed.
    pub fn clear(&self) -> WalletResult<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }

    pub fn status(&self, now: DateTime<Utc>) -> WalletResult<AuthStatusResponse> {
        Ok(match self.load()? {
            Some(session) => AuthStatusResponse {
                signed_in: true,
                expired: session.is_expired_at(now),
                username: Some(session.username),
                expires_at: Some(session.expires_at),
            },
            None => AuthStatusResponse {
                signed_in: false,
                username: None,
                expires_at: None,
                expired: false,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(client_id: Option<&str>) -> AuthConfig {
        AuthConfig {
            region: "us-east-1".to_string(),
            client_id: client_id.map(str::to_string),
            endpoint: None,
        }
    }

    fn session(expires_at: DateTime<Utc>) -> AuthSession {
        AuthSession {
            username: "alice".to_string(),
            access_token: "access".to_string(),
            id_token: Some("id".to_string()),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_at,
        }
    }

    #[test]
    fn endpoint_derives_from_region() {
        let client = CognitoClient::new(&config(Some("abc")), Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "https://cognito-idp.us-east-1.amazonaws.com/");

        let mut custom = config(Some("abc"));
        custom.endpoint = Some("http://127.0.0.1:9229/".to_string());
        let client = CognitoClient::new(&custom, Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9229/");
    }

    #[test]
    fn missing_client_id_or_bad_region_rejected() {
        assert!(CognitoClient::new(&config(None), Duration::from_secs(5)).is_err());
        assert!(CognitoClient::new(&config(Some("  ")), Duration::from_secs(5)).is_err());

        let mut bad_region = config(Some("abc"));
        bad_region.region = "evil.com/".to_string();
        assert!(CognitoClient::new(&bad_region, Duration::from_secs(5)).is_err());
    }

    #[test]
    fn service_errors_are_mapped() {
        let err = service_error(
            400,
            r#"{"__type":"UsernameExistsException","message":"User already exists"}"#,
        );
        assert_eq!(
            err,
            WalletError::AuthError {
                kind: "UsernameExistsException".to_string(),
                message: "User already exists".to_string()
            }
        );

        let err = service_error(
            400,
            r#"{"__type":"com.amazonaws.cognito#NotAuthorizedException","Message":"Incorrect username or password."}"#,
        );
        assert!(matches!(
            err,
            WalletError::AuthError { ref kind, ref message }
                if kind == "NotAuthorizedException" && message == "Incorrect username or password."
        ));

        let err = service_error(503, "<html>");
        assert!(matches!(err, WalletError::AuthError { ref kind, .. } if kind == "HTTP 503"));
    }

    #[tokio::test]
    async fn invalid_fields_fail_before_any_request() {
        // Port 9 is never listened on; validation must fail first.
        let mut cfg = config(Some("abc"));
        cfg.endpoint = Some("http://127.0.0.1:9/".to_string());
        let client = CognitoClient::new(&cfg, Duration::from_secs(1)).unwrap();

        let weak = SecretString::from("weak".to_string());
        let result = client.sign_up("alice", &weak, "alice@example.com").await;
        assert!(matches!(result, Err(WalletError::ValidationError(_))));

        let strong = SecretString::from("Sufficient1!".to_string());
        let result = client.sign_up("alice", &strong, "not-an-email").await;
        assert!(matches!(result, Err(WalletError::ValidationError(_))));

        let result = client.confirm_sign_up("alice", "12").await;
        assert!(matches!(result, Err(WalletError::ValidationError(_))));
    }

    #[test]
    fn store_round_trip_and_status() {
        let dir = TempDir::new().unwrap();
        let store = AuthStore::new(dir.path().join("cache").join("auth_session.json"));
        let now = Utc::now();

        assert!(!store.status(now).unwrap().signed_in);
        assert!(!store.clear().unwrap());

        store.save(&session(now + chrono::Duration::hours(1))).unwrap();
        let status = store.status(now).unwrap();
        assert!(status.signed_in);
        assert!(!status.expired);
        assert_eq!(status.username.as_deref(), Some("alice"));

        let later = now + chrono::Duration::hours(2);
        assert!(store.status(later).unwrap().expired);

        assert!(store.clear().unwrap());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn session_debug_hides_tokens() {
        let rendered = format!("{:?}", session(Utc::now()));
        assert!(!rendered.contains("access"));
        assert!(rendered.contains("alice"));
    }
}
