// lib.rs - Core library structure for the wallet

pub mod api;
pub mod app_state;
pub mod auth;
pub mod blockchain;
pub mod blockchain_client;
pub mod config_store;
pub mod crypto;
pub mod errors;
pub mod settings;
pub mod storage;
pub mod transaction;
pub mod validation;

// Re-export common types
pub use api::types::*;
pub use app_state::{ActiveWallet, WalletContext, WalletSession};
pub use auth::{AuthSession, AuthStore, CognitoClient, SignInOutcome};
pub use blockchain::{Hash, Keypair, Lamports, Pubkey, Signature, TransactionSigner, LAMPORTS_PER_SOL};
pub use blockchain_client::{BlockchainClient, Commitment, RpcEndpoints};
pub use config_store::{Cluster, ConfigStore, NetworkConfig, WalletConfig};
pub use errors::{WalletError, WalletResult};
pub use settings::{Environment, Settings};
pub use storage::{VaultCreateParams, VaultManager, VaultMetadata, VaultSecrets, VaultUnlocked};
pub use transaction::{Message, Transaction};
pub use validation::InputValidator;
