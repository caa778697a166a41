pub mod paths;
pub mod vault;

pub use paths::{default_root_dir, BackupEntry, WalletPaths};
pub use vault::{KdfCost, VaultCreateParams, VaultManager, VaultMetadata, VaultSecrets, VaultUnlocked};
