use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use argon2::{Algorithm, Argon2, Params, Version};
use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use super::paths::BackupEntry;
use super::WalletPaths;
use crate::blockchain::Keypair;
use crate::errors::{WalletError, WalletResult};

const VAULT_MAGIC: &[u8; 8] = b"AURAVLT1";
const VAULT_VERSION: u16 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
/// Backups kept after each password change or restore.
const BACKUPS_TO_KEEP: usize = 10;

/// Public information about the created wallet, readable without the password.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaultMetadata {
    pub wallet_name: String,
    /// Base58 address of the wallet keypair
    pub public_key: String,
    #[serde(default)]
    pub derivation_path: Option<String>,
    #[serde(default)]
    pub has_mnemonic: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u16,
}

impl VaultMetadata {
    pub fn new(wallet_name: impl Into<String>, public_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            wallet_name: wallet_name.into(),
            public_key: public_key.into(),
            derivation_path: None,
            has_mnemonic: false,
            created_at: now,
            updated_at: now,
            schema_version: VAULT_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Secrets encrypted within the vault.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct VaultSecrets {
    /// 32-byte ed25519 secret seed
    pub secret_seed: Vec<u8>,
    pub mnemonic_phrase: Option<String>,
    pub derivation_path: Option<String>,
}

impl VaultSecrets {
    pub fn from_keypair(keypair: &Keypair) -> Self {
        Self {
            secret_seed: keypair.secret_seed().to_vec(),
            mnemonic_phrase: None,
            derivation_path: None,
        }
    }

    pub fn with_mnemonic(mut self, phrase: impl Into<String>, path: impl Into<String>) -> Self {
        self.mnemonic_phrase = Some(phrase.into());
        self.derivation_path = Some(path.into());
        self
    }

    /// Rebuild the signing keypair from the stored seed.
    pub fn keypair(&self) -> WalletResult<Keypair> {
        let seed: [u8; 32] = self.secret_seed.as_slice().try_into().map_err(|_| {
            WalletError::InvalidKey(format!(
                "Stored seed has {} bytes, expected 32",
                self.secret_seed.len()
            ))
        })?;
        let seed = Zeroizing::new(seed);
        Ok(Keypair::from_seed(&seed))
    }
}

/// Argon2id cost settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfCost {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfCost {
    fn default() -> Self {
        Self {
            m_cost_kib: 64 * 1024, // 64 MiB
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl KdfCost {
    /// Minimal cost for test environments
    pub const fn light() -> Self {
        Self {
            m_cost_kib: 8 * 1024, // 8 MiB
            t_cost: 1,
            p_cost: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VaultFile {
    magic: [u8; 8],
    version: u16,
    nonce: [u8; NONCE_LEN],
    kdf: KdfParameters,
    checksum: [u8; 32],
    ciphertext: Vec<u8>,
    metadata: VaultMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KdfParameters {
    #[serde(flatten)]
    cost: KdfCost,
    salt: [u8; SALT_LEN],
}

/// Parameters required to write a vault on disk.
pub struct VaultCreateParams<'a> {
    pub password: &'a SecretString,
    pub metadata: VaultMetadata,
    pub secrets: VaultSecrets,
}

/// Result returned after successfully unlocking a vault.
#[derive(Debug, Clone)]
pub struct VaultUnlocked {
    pub metadata: VaultMetadata,
    pub secrets: VaultSecrets,
}

/// Handles persistence and encryption of the wallet vault file.
#[derive(Debug, Clone)]
pub struct VaultManager {
    vault_path: PathBuf,
    wallet_paths: Option<WalletPaths>,
    kdf_cost: KdfCost,
}

impl VaultManager {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            vault_path: path.as_ref().to_path_buf(),
            wallet_paths: None,
            kdf_cost: KdfCost::default(),
        }
    }

    pub fn from_paths(paths: &WalletPaths) -> Self {
        Self {
            vault_path: paths.vault_file().to_path_buf(),
            wallet_paths: Some(paths.clone()),
            kdf_cost: KdfCost::default(),
        }
    }

    /// Cost used when (re)encrypting. Existing vaults keep the cost stored in them.
    pub fn with_kdf_cost(mut self, cost: KdfCost) -> Self {
        self.kdf_cost = cost;
        self
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    /// Create a new encrypted vault on disk. Fails if a vault already exists.
    pub fn create(&self, params: VaultCreateParams<'_>) -> WalletResult<()> {
        if self.vault_path.exists() {
            return Err(WalletError::AlreadyExists(
                self.vault_path.display().to_string(),
            ));
        }

        self.write_vault(params)?;
        log::info!("Created wallet vault at {}", self.vault_path.display());
        Ok(())
    }

    /// Overwrite an existing vault file, keeping a backup of the previous one.
    pub fn update(&self, params: VaultCreateParams<'_>) -> WalletResult<()> {
        self.snapshot_existing_vault()?;
        self.write_vault(params)
    }

    pub fn unlock(&self, password: &SecretString) -> WalletResult<VaultUnlocked> {
        let vault_file = self.read_vault_file()?;
        let plaintext = decrypt_payload(password, &vault_file)?;
        if blake3_checksum(&plaintext) != vault_file.checksum {
            return Err(WalletError::ValidationError(
                "Vault integrity verification failed".to_string(),
            ));
        }

        let secrets: VaultSecrets = serde_json::from_slice(&plaintext)?;
        Ok(VaultUnlocked {
            metadata: vault_file.metadata,
            secrets,
        })
    }

    /// Read vault metadata without decrypting secrets.
    pub fn read_metadata(&self) -> WalletResult<Option<VaultMetadata>> {
        if !self.exists() {
            return Ok(None);
        }
        Ok(Some(self.read_vault_file()?.metadata))
    }

    /// Re-encrypt the vault under a new password.
    pub fn change_password(
        &self,
        current_password: &SecretString,
        new_password: &SecretString,
    ) -> WalletResult<VaultMetadata> {
        let unlocked = self.unlock(current_password)?;
        let mut metadata = unlocked.metadata.clone();
        metadata.touch();
        self.update(VaultCreateParams {
            password: new_password,
            metadata: metadata.clone(),
            secrets: unlocked.secrets.clone(),
        })?;
        log::info!("Vault password changed");
        Ok(metadata)
    }

    pub fn exists(&self) -> bool {
        self.vault_path.exists()
    }

    /// List available vault backups ordered by newest first.
    pub fn available_backups(&self) -> WalletResult<Vec<BackupEntry>> {
        match &self.wallet_paths {
            Some(paths) => paths.list_backups(),
            None => Ok(Vec::new()),
        }
    }

    /// Restore the vault from a backup, after checking the backup is a readable vault.
    pub fn restore_from_backup(&self, backup_path: &Path) -> WalletResult<VaultMetadata> {
        let paths = self.wallet_paths.as_ref().ok_or_else(|| {
            WalletError::StorageError("Vault manager configured without wallet paths".to_string())
        })?;

        let candidate = parse_vault_file(&fs::read(backup_path)?)?;
        if self.exists() {
            paths.create_vault_backup()?;
        }
        paths.restore_vault_from_backup(backup_path)?;
        paths.prune_old_backups(BACKUPS_TO_KEEP)?;
        Ok(candidate.metadata)
    }

    fn write_vault(&self, params: VaultCreateParams<'_>) -> WalletResult<()> {
        let encrypted = encrypt_payload(params, self.kdf_cost)?;
        let serialized = serde_json::to_vec(&encrypted)?;
        write_atomic(&self.vault_path, &serialized)
    }

    fn read_vault_file(&self) -> WalletResult<VaultFile> {
        parse_vault_file(&fs::read(&self.vault_path)?)
    }

    fn snapshot_existing_vault(&self) -> WalletResult<()> {
        if let Some(paths) = &self.wallet_paths {
            if self.exists() {
                paths.create_vault_backup()?;
                paths.prune_old_backups(BACKUPS_TO_KEEP)?;
            }
        }
        Ok(())
    }
}

fn parse_vault_file(bytes: &[u8]) -> WalletResult<VaultFile> {
    let vault_file: VaultFile = serde_json::from_slice(bytes)
        .map_err(|e| WalletError::ValidationError(format!("Malformed vault file: {}", e)))?;

    if &vault_file.magic != VAULT_MAGIC {
        return Err(WalletError::ValidationError(
            "Invalid vault magic marker".to_string(),
        ));
    }
    if vault_file.version != VAULT_VERSION {
        return Err(WalletError::ValidationError(format!(
            "Unsupported vault version: {}",
            vault_file.version
        )));
    }
    Ok(vault_file)
}

fn encrypt_payload(params: VaultCreateParams<'_>, cost: KdfCost) -> WalletResult<VaultFile> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let kdf = KdfParameters { cost, salt };
    let key = derive_key(params.password, &kdf)?;

    let plaintext = Zeroizing::new(serde_json::to_vec(&params.secrets)?);
    let checksum = blake3_checksum(&plaintext);
    let ciphertext = seal(&key, Nonce::assume_unique_for_key(nonce_bytes), &plaintext)?;

    Ok(VaultFile {
        magic: *VAULT_MAGIC,
        version: VAULT_VERSION,
        nonce: nonce_bytes,
        kdf,
        checksum,
        ciphertext,
        metadata: params.metadata,
    })
}

fn decrypt_payload(
    password: &SecretString,
    vault_file: &VaultFile,
) -> WalletResult<Zeroizing<Vec<u8>>> {
    let key = derive_key(password, &vault_file.kdf)?;
    open(
        &key,
        Nonce::assume_unique_for_key(vault_file.nonce),
        &vault_file.ciphertext,
    )
}

fn derive_key(
    password: &SecretString,
    params: &KdfParameters,
) -> WalletResult<Zeroizing<[u8; KEY_LEN]>> {
    let argon_params = Params::new(
        params.cost.m_cost_kib,
        params.cost.t_cost,
        params.cost.p_cost,
        Some(KEY_LEN),
    )
    .map_err(|e| WalletError::CryptoError(format!("Invalid Argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(
            password.expose_secret().as_bytes(),
            &params.salt,
            &mut key[..],
        )
        .map_err(|e| WalletError::CryptoError(format!("KDF failed: {e}")))?;
    Ok(key)
}

fn aead_key(key: &Zeroizing<[u8; KEY_LEN]>) -> WalletResult<LessSafeKey> {
    let unbound = UnboundKey::new(&aead::AES_256_GCM, &key[..])
        .map_err(|e| WalletError::CryptoError(format!("Invalid encryption key: {e}")))?;
    Ok(LessSafeKey::new(unbound))
}

fn seal(key: &Zeroizing<[u8; KEY_LEN]>, nonce: Nonce, plaintext: &[u8]) -> WalletResult<Vec<u8>> {
    let key = aead_key(key)?;
    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::from(VAULT_MAGIC), &mut in_out)
        .map_err(|_| WalletError::CryptoError("Encryption failure".to_string()))?;
    Ok(in_out)
}

fn open(
    key: &Zeroizing<[u8; KEY_LEN]>,
    nonce: Nonce,
    ciphertext: &[u8],
) -> WalletResult<Zeroizing<Vec<u8>>> {
    let key = aead_key(key)?;
    if ciphertext.len() < aead::AES_256_GCM.tag_len() {
        return Err(WalletError::CryptoError(
            "Ciphertext shorter than authentication tag".to_string(),
        ));
    }

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let plaintext_len = key
        .open_in_place(nonce, Aad::from(VAULT_MAGIC), &mut in_out)
        .map_err(|_| {
            WalletError::CryptoError("Incorrect password or corrupted vault".to_string())
        })?
        .len();
    in_out.truncate(plaintext_len);
    Ok(in_out)
}

fn blake3_checksum(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake3::new();
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Write to `<path>.new`, fsync, then rename over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> WalletResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| WalletError::StorageError("Invalid vault path".to_string()))?;
    fs::create_dir_all(dir)?;

    let tmp_path = path.with_extension("new");
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file: File = options.open(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp_path, path)?;
    Ok(())
}
