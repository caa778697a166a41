//! Process-level settings read from environment variables.
//!
//! These sit on top of the persisted `WalletConfig`: an override here never
//! gets written back to disk.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config_store::AuthConfig;
use crate::errors::WalletResult;
use crate::storage::{default_root_dir, KdfCost};

pub const ENV_WALLET_ENV: &str = "AURA_WALLET_ENV";
pub const ENV_HOME: &str = "AURA_HOME";
pub const ENV_RPC_URL: &str = "AURA_RPC_URL";
pub const ENV_LOG: &str = "AURA_LOG";
pub const ENV_COGNITO_CLIENT_ID: &str = "AURA_COGNITO_CLIENT_ID";
pub const ENV_COGNITO_REGION: &str = "AURA_COGNITO_REGION";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    /// Unknown names fall back to development.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" | "testing" => Environment::Test,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Environment::Production => "warn",
            Environment::Development => "info",
            Environment::Test => "debug",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub environment: Environment,
    pub home: Option<PathBuf>,
    pub rpc_url: Option<String>,
    pub log_filter: Option<String>,
    pub cognito_client_id: Option<String>,
    pub cognito_region: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            environment: get(ENV_WALLET_ENV)
                .map(|v| Environment::parse_lossy(&v))
                .unwrap_or(Environment::Development),
            home: get(ENV_HOME).map(PathBuf::from),
            rpc_url: get(ENV_RPC_URL),
            log_filter: get(ENV_LOG),
            cognito_client_id: get(ENV_COGNITO_CLIENT_ID),
            cognito_region: get(ENV_COGNITO_REGION),
        }
    }

    /// `AURA_HOME`, or `~/.aura-wallet`.
    pub fn root_dir(&self) -> WalletResult<PathBuf> {
        match &self.home {
            Some(home) => Ok(home.clone()),
            None => default_root_dir(),
        }
    }

    /// Vault key derivation cost for this environment.
    pub fn kdf_cost(&self) -> KdfCost {
        match self.environment {
            Environment::Test => KdfCost::light(),
            _ => KdfCost::default(),
        }
    }

    pub fn log_filter(&self) -> String {
        self.log_filter
            .clone()
            .unwrap_or_else(|| self.environment.default_log_filter().to_string())
    }

    /// Identity provider config with environment overrides applied.
    pub fn apply_auth_overrides(&self, auth: &AuthConfig) -> AuthConfig {
        let mut effective = auth.clone();
        if let Some(client_id) = &self.cognito_client_id {
            effective.client_id = Some(client_id.clone());
        }
        if let Some(region) = &self.cognito_region {
            effective.region = region.clone();
        }
        effective
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
