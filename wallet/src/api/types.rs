use crate::config_store::WalletConfig;
use crate::storage::VaultMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub wallet_name: String,
    pub public_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u16,
    #[serde(default)]
    pub derivation_path: Option<String>,
    #[serde(default)]
    pub has_mnemonic: bool,
}

impl From<VaultMetadata> for WalletSummary {
    fn from(metadata: VaultMetadata) -> Self {
        Self {
            wallet_name: metadata.wallet_name,
            public_key: metadata.public_key,
            created_at: metadata.created_at,
            updated_at: metadata.updated_at,
            schema_version: metadata.schema_version,
            derivation_path: metadata.derivation_path,
            has_mnemonic: metadata.has_mnemonic,
        }
    }
}

impl From<&VaultMetadata> for WalletSummary {
    fn from(metadata: &VaultMetadata) -> Self {
        WalletSummary::from(metadata.clone())
    }
}

/// Where the active wallet comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WalletSource {
    Created,
    Connected,
}

// Basic wallet types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletResponse {
    pub summary: WalletSummary,
    pub public_key: String,
    /// 64-byte secret key (seed followed by public key) in hex
    pub secret_key_hex: String,
    /// Absent when created without a recovery phrase
    pub mnemonic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportWalletResponse {
    pub summary: WalletSummary,
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectWalletResponse {
    pub public_key: String,
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfoResponse {
    pub active_address: Option<String>,
    pub source: Option<WalletSource>,
    pub vault_exists: bool,
    pub metadata: Option<WalletSummary>,
    pub connected_keypair: Option<String>,
    pub config: WalletConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordResponse {
    pub success: bool,
    pub summary: WalletSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportWalletResponse {
    pub summary: WalletSummary,
    pub mnemonic: Option<String>,
    pub secret_key_hex: String,
    pub secret_key_base58: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAddressResponse {
    pub address: String,
    pub is_valid: bool,
    pub is_on_curve: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub address: String,
    pub lamports: u64,
    pub sol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub signature: String,
    pub from_address: String,
    pub to_address: String,
    pub lamports: u64,
    pub fee_lamports: u64,
    pub endpoint: String,
    /// Balance after the transfer confirmed
    pub balance: Option<BalanceResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirdropResponse {
    pub signature: String,
    pub address: String,
    pub lamports: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub status: String,
    pub error: Option<String>,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHistoryResponse {
    pub address: String,
    pub transactions: Vec<TransactionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub file_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    pub signed_in: bool,
    pub username: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub username: String,
    pub user_confirmed: bool,
    pub user_sub: Option<String>,
    /// Where the confirmation code was sent, when the pool requires one
    pub code_destination: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum SignInResponse {
    SignedIn {
        username: String,
        expires_at: DateTime<Utc>,
    },
    ChallengeRequired {
        username: String,
        challenge_name: String,
    },
}
