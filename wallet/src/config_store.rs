use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blockchain_client::{Commitment, ConfirmOptions, SendOptions};
use crate::errors::{WalletError, WalletResult};
use crate::storage::WalletPaths;

const CONFIG_VERSION: u16 = 1;

/// Solana cluster the wallet talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    MainnetBeta,
    Devnet,
    Testnet,
    Localnet,
    /// Any other endpoint; `primary_endpoint` is used as-is
    Custom,
}

impl Cluster {
    /// Public RPC endpoint for the cluster, if it has one.
    pub fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            Cluster::MainnetBeta => Some("https://api.mainnet-beta.solana.com"),
            Cluster::Devnet => Some("https://api.devnet.solana.com"),
            Cluster::Testnet => Some("https://api.testnet.solana.com"),
            Cluster::Localnet => Some("http://127.0.0.1:8899"),
            Cluster::Custom => None,
        }
    }

    /// Airdrops are only served on test clusters.
    pub fn allows_airdrop(&self) -> bool {
        !matches!(self, Cluster::MainnetBeta)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "mainnet-beta",
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::Localnet => "localnet",
            Cluster::Custom => "custom",
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cluster {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet-beta" | "mainnet" | "m" => Ok(Cluster::MainnetBeta),
            "devnet" | "d" => Ok(Cluster::Devnet),
            "testnet" | "t" => Ok(Cluster::Testnet),
            "localnet" | "localhost" | "l" => Ok(Cluster::Localnet),
            "custom" => Ok(Cluster::Custom),
            other => Err(WalletError::ValidationError(format!(
                "Unknown cluster '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub cluster: Cluster,
    pub primary_endpoint: String,
    pub failover_endpoints: Vec<String>,
    pub commitment: Commitment,
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::for_cluster(Cluster::MainnetBeta)
    }
}

impl NetworkConfig {
    pub fn for_cluster(cluster: Cluster) -> Self {
        Self {
            cluster,
            primary_endpoint: cluster.default_endpoint().unwrap_or_default().to_string(),
            failover_endpoints: Vec::new(),
            commitment: Commitment::Confirmed,
            request_timeout_secs: 30,
        }
    }

    /// Switch cluster, resetting endpoints to the cluster's public one.
    pub fn set_cluster(&mut self, cluster: Cluster) -> WalletResult<()> {
        let endpoint = cluster.default_endpoint().ok_or_else(|| {
            WalletError::ValidationError(
                "Use a custom endpoint URL instead of the 'custom' cluster".to_string(),
            )
        })?;
        self.cluster = cluster;
        self.primary_endpoint = endpoint.to_string();
        self.failover_endpoints.clear();
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Primary endpoint followed by failovers, blanks removed.
    pub fn endpoints(&self) -> Vec<String> {
        std::iter::once(&self.primary_endpoint)
            .chain(self.failover_endpoints.iter())
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect()
    }

    /// Point at a specific RPC URL. The cluster becomes `custom` unless the URL
    /// is a known cluster's public endpoint.
    pub fn set_endpoint(&mut self, url: &str) -> WalletResult<()> {
        let url = parse_endpoint(url)?;
        self.cluster = [
            Cluster::MainnetBeta,
            Cluster::Devnet,
            Cluster::Testnet,
            Cluster::Localnet,
        ]
        .into_iter()
        .find(|c| c.default_endpoint() == Some(url.as_str()))
        .unwrap_or(Cluster::Custom);
        self.primary_endpoint = url;
        Ok(())
    }

    pub fn add_failover(&mut self, url: &str) -> WalletResult<()> {
        let url = parse_endpoint(url)?;
        if url == self.primary_endpoint || self.failover_endpoints.contains(&url) {
            return Err(WalletError::AlreadyExists(url));
        }
        self.failover_endpoints.push(url);
        Ok(())
    }
}

fn parse_endpoint(url: &str) -> WalletResult<String> {
    let parsed = reqwest::Url::parse(url.trim())
        .map_err(|e| WalletError::ValidationError(format!("Invalid endpoint URL: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(url.trim().to_string()),
        other => Err(WalletError::ValidationError(format!(
            "Endpoint must use http or https, not {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferConfig {
    pub confirm_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub skip_preflight: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_secs: 60,
            poll_interval_ms: 500,
            skip_preflight: false,
        }
    }
}

impl TransferConfig {
    pub fn send_options(&self, commitment: Commitment) -> SendOptions {
        SendOptions {
            skip_preflight: self.skip_preflight,
            preflight_commitment: commitment,
        }
    }

    pub fn confirm_options(&self, commitment: Commitment) -> ConfirmOptions {
        ConfirmOptions {
            commitment,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(50)),
            timeout: Duration::from_secs(self.confirm_timeout_secs.max(1)),
        }
    }
}

/// External keypair used when no wallet has been created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConnectedWalletConfig {
    pub keypair_path: Option<PathBuf>,
}

/// Cognito user pool app client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthConfig {
    pub region: String,
    pub client_id: Option<String>,
    /// Overrides `https://cognito-idp.<region>.amazonaws.com/`
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            client_id: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    pub network: NetworkConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub connected_wallet: ConnectedWalletConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub environment: String,
    pub last_updated: DateTime<Utc>,
    pub version: u16,
}

impl WalletConfig {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            network: NetworkConfig::default(),
            transfer: TransferConfig::default(),
            connected_wallet: ConnectedWalletConfig::default(),
            auth: AuthConfig::default(),
            environment: environment.into(),
            last_updated: Utc::now(),
            version: CONFIG_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u16,
    checksum: [u8; 32],
    payload: WalletConfig,
    modified_at_unix: i64,
}

/// Persists `WalletConfig` with an integrity checksum.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(paths: &WalletPaths) -> Self {
        Self {
            path: paths.config_file().to_path_buf(),
        }
    }

    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load_or_default(&self, environment: impl Into<String>) -> WalletResult<WalletConfig> {
        if !self.path.exists() {
            let config = WalletConfig::new(environment);
            self.save(&config)?;
            return Ok(config);
        }

        let bytes = fs::read(&self.path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != CONFIG_VERSION {
            return Err(WalletError::ValidationError(format!(
                "Unsupported config version {}",
                envelope.version
            )));
        }

        if checksum(&envelope.payload)? != envelope.checksum {
            return Err(WalletError::ValidationError(
                "Config integrity verification failed".to_string(),
            ));
        }

        Ok(envelope.payload)
    }

    pub fn save(&self, config: &WalletConfig) -> WalletResult<()> {
        let mut payload = config.clone();
        payload.touch();

        let envelope = ConfigEnvelope {
            version: CONFIG_VERSION,
            checksum: checksum(&payload)?,
            modified_at_unix: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_err(|e| WalletError::StorageError(e.to_string()))?
                .as_secs() as i64,
            payload,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)?;
        let tmp_path = self.path.with_extension("new");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.path)?;
        log::debug!("Saved wallet config to {}", self.path.display());
        Ok(())
    }

    pub fn update<F>(
        &self,
        environment: impl Into<String>,
        updater: F,
    ) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        let mut config = self.load_or_default(environment)?;
        updater(&mut config)?;
        config.touch();
        self.save(&config)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn checksum(config: &WalletConfig) -> WalletResult<[u8; 32]> {
    let encoded = serde_json::to_vec(config)?;
    let mut hasher = Blake3::new();
    hasher.update(&encoded);
    Ok(*hasher.finalize().as_bytes())
}
