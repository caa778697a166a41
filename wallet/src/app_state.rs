use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use secrecy::SecretString;

use crate::api::types::{
    AirdropResponse, AuthStatusResponse, BackupInfo, BalanceResponse, ChangePasswordResponse,
    ConnectWalletResponse, CreateWalletResponse, ExportWalletResponse, ImportWalletResponse,
    SendResponse, SignInResponse, SignUpResponse, TransactionHistoryResponse, TransactionInfo,
    ValidateAddressResponse, WalletInfoResponse, WalletSource, WalletSummary,
};
use crate::auth::{AuthStore, CognitoClient, SignInOutcome};
use crate::blockchain::{Keypair, Lamports, Pubkey};
use crate::blockchain_client::{BlockchainClient, LatestBlockhash, RpcEndpoints};
use crate::config_store::{ConfigStore, WalletConfig};
use crate::crypto::{read_keypair_file, WalletKeyPair, DEFAULT_DERIVATION_PATH};
use crate::errors::{WalletError, WalletResult};
use crate::settings::Settings;
use crate::storage::{VaultCreateParams, VaultManager, VaultMetadata, VaultSecrets, WalletPaths};
use crate::transaction::{system_instruction, Message, Transaction};
use crate::validation::InputValidator;

/// Fee assumed when the node cannot price a message.
const DEFAULT_LAMPORTS_PER_SIGNATURE: u64 = 5_000;

/// Transient state of one wallet session
#[derive(Debug, Default)]
pub struct WalletSession {
    /// Keypair created during this session, if any
    pub generated: Option<Keypair>,
    /// Last balance fetched for the active wallet
    pub balance: Option<Lamports>,
    pub recipient: String,
    pub amount: String,
}

impl WalletSession {
    pub fn set_transfer(&mut self, recipient: impl Into<String>, amount: impl Into<String>) {
        self.recipient = recipient.into();
        self.amount = amount.into();
    }
}

/// The wallet the session acts for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWallet {
    pub pubkey: Pubkey,
    pub source: WalletSource,
    pub keypair_path: Option<PathBuf>,
}

pub struct WalletContext {
    paths: WalletPaths,
    vault: VaultManager,
    config_store: ConfigStore,
    auth_store: AuthStore,
    settings: Settings,
    validator: InputValidator,
    rpc_override: Option<String>,
    session: WalletSession,
}

impl WalletContext {
    /// Open (creating if needed) the wallet home at `root_dir`, reading overrides
    /// from the process environment.
    pub fn initialize(root_dir: PathBuf) -> WalletResult<Self> {
        Self::initialize_with(root_dir, Settings::from_env())
    }

    pub fn initialize_with(root_dir: PathBuf, settings: Settings) -> WalletResult<Self> {
        let paths = WalletPaths::new(&root_dir)?;
        paths.ensure_directories()?;

        let vault = VaultManager::from_paths(&paths).with_kdf_cost(settings.kdf_cost());
        let config_store = ConfigStore::from_paths(&paths);
        config_store.load_or_default(settings.environment.as_str())?;
        let auth_store = AuthStore::new(paths.auth_session_file());

        log::debug!(
            "Wallet context at {} ({})",
            paths.root_dir().display(),
            settings.environment
        );

        Ok(Self {
            rpc_override: settings.rpc_url.clone(),
            paths,
            vault,
            config_store,
            auth_store,
            settings,
            validator: InputValidator::new()?,
            session: WalletSession::default(),
        })
    }

    pub fn vault(&self) -> &VaultManager {
        &self.vault
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    pub fn paths(&self) -> &WalletPaths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn environment(&self) -> &str {
        self.settings.environment.as_str()
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut WalletSession {
        &mut self.session
    }

    /// Use a single RPC URL for this session instead of the configured endpoints.
    pub fn set_rpc_override(&mut self, url: Option<String>) -> WalletResult<()> {
        self.rpc_override = match url {
            Some(url) if url.trim().is_empty() => {
                return Err(WalletError::ValidationError(
                    "Override RPC endpoint cannot be empty".to_string(),
                ))
            }
            Some(url) => Some(url.trim().to_string()),
            None => None,
        };
        Ok(())
    }

    pub fn load_config(&self) -> WalletResult<WalletConfig> {
        self.config_store.load_or_default(self.environment())
    }

    pub fn update_config<F>(&self, updater: F) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        self.config_store.update(self.environment(), updater)
    }

    /// Endpoints to try in order: the override alone, or primary then failovers.
    pub fn rpc_endpoints(&self) -> WalletResult<RpcEndpoints> {
        let config = self.load_config()?;
        let endpoints = match &self.rpc_override {
            Some(url) => vec![url.clone()],
            None => config.network.endpoints(),
        };
        RpcEndpoints::new(endpoints, config.network.request_timeout())
    }

    // ----- wallet lifecycle -----

    /// `word_count` of `None` creates a bare keypair with no recovery phrase.
    pub fn create_wallet(
        &mut self,
        name: &str,
        password: &SecretString,
        word_count: Option<u32>,
    ) -> WalletResult<CreateWalletResponse> {
        use secrecy::ExposeSecret;

        self.validator.validate_wallet_name(name)?;
        self.validator.validate_password(password.expose_secret())?;
        self.ensure_no_vault()?;

        let (wallet, mnemonic) = match word_count {
            Some(words) => {
                let (wallet, phrase) = WalletKeyPair::generate_with_mnemonic(
                    words,
                    None,
                    Some(DEFAULT_DERIVATION_PATH),
                )?;
                (wallet, Some(phrase))
            }
            None => (WalletKeyPair::generate_direct()?, None),
        };
        let summary = self.store_wallet(
            name.trim(),
            password,
            &wallet,
            mnemonic.as_ref().map(|m| m.as_str()),
        )?;

        let pubkey = wallet.pubkey();
        let secret_key_hex = wallet.keypair.secret_hex();
        self.session.generated = Some(wallet.keypair);
        self.session.balance = None;
        log::info!("Created wallet {}", pubkey);

        Ok(CreateWalletResponse {
            summary,
            public_key: pubkey.to_string(),
            secret_key_hex,
            mnemonic: mnemonic.map(|m| m.to_string()),
        })
    }

    pub fn import_wallet(
        &mut self,
        name: &str,
        password: &SecretString,
        mnemonic: &str,
        passphrase: Option<&str>,
        derivation_path: Option<&str>,
    ) -> WalletResult<ImportWalletResponse> {
        use secrecy::ExposeSecret;

        self.validator.validate_wallet_name(name)?;
        self.validator.validate_password(password.expose_secret())?;
        self.ensure_no_vault()?;

        let normalized = mnemonic.split_whitespace().collect::<Vec<_>>().join(" ");
        let wallet = WalletKeyPair::from_mnemonic(&normalized, passphrase, derivation_path)?;
        let summary = self.store_wallet(name.trim(), password, &wallet, Some(&normalized))?;

        let pubkey = wallet.pubkey();
        self.session.generated = Some(wallet.keypair);
        self.session.balance = None;
        log::info!("Imported wallet {}", pubkey);

        Ok(ImportWalletResponse {
            summary,
            public_key: pubkey.to_string(),
        })
    }

    /// Use an existing Solana CLI keypair file as the wallet.
    pub fn connect_wallet(&mut self, keypair_path: &Path) -> WalletResult<ConnectWalletResponse> {
        let keypair = read_keypair_file(keypair_path)?;
        let absolute = fs::canonicalize(keypair_path)?;

        self.update_config(|config| {
            config.connected_wallet.keypair_path = Some(absolute.clone());
            Ok(())
        })?;
        self.session.balance = None;

        if self.vault.exists() {
            log::warn!(
                "A created wallet exists and stays active; {} is used only without it",
                keypair.pubkey()
            );
        }
        log::info!("Connected wallet {}", keypair.pubkey());

        Ok(ConnectWalletResponse {
            public_key: keypair.pubkey().to_string(),
            keypair_path: absolute.display().to_string(),
        })
    }

    /// Forget the connected keypair file. Returns whether one was connected.
    pub fn disconnect_wallet(&mut self) -> WalletResult<bool> {
        let mut was_connected = false;
        self.update_config(|config| {
            was_connected = config.connected_wallet.keypair_path.take().is_some();
            Ok(())
        })?;
        self.session.balance = None;
        Ok(was_connected)
    }

    /// Created wallet first, then the connected keypair file.
    pub fn active_wallet(&self) -> WalletResult<ActiveWallet> {
        if let Some(metadata) = self.vault.read_metadata()? {
            return Ok(ActiveWallet {
                pubkey: Pubkey::from_string(&metadata.public_key)?,
                source: WalletSource::Created,
                keypair_path: None,
            });
        }

        let config = self.load_config()?;
        match config.connected_wallet.keypair_path {
            Some(path) => Ok(ActiveWallet {
                pubkey: read_keypair_file(&path)?.pubkey(),
                source: WalletSource::Connected,
                keypair_path: Some(path),
            }),
            None => Err(WalletError::NoWallet),
        }
    }

    pub fn wallet_info(&self) -> WalletResult<WalletInfoResponse> {
        let config = self.load_config()?;
        let metadata = self.vault.read_metadata()?;
        let active = match self.active_wallet() {
            Ok(active) => Some(active),
            Err(WalletError::NoWallet) => None,
            Err(err) => return Err(err),
        };

        Ok(WalletInfoResponse {
            active_address: active.as_ref().map(|a| a.pubkey.to_string()),
            source: active.as_ref().map(|a| a.source),
            vault_exists: metadata.is_some(),
            metadata: metadata.map(WalletSummary::from),
            connected_keypair: config
                .connected_wallet
                .keypair_path
                .as_ref()
                .map(|p| p.display().to_string()),
            config,
        })
    }

    /// Keypair that signs for the active wallet. A created wallet needs its password.
    pub fn signer(&self, password: Option<&SecretString>) -> WalletResult<Keypair> {
        let active = self.active_wallet()?;
        match active.source {
            WalletSource::Created => {
                let password = password.ok_or_else(|| {
                    WalletError::ValidationError("Wallet password required".to_string())
                })?;
                let unlocked = self.vault.unlock(password)?;
                let keypair = unlocked.secrets.keypair()?;
                if keypair.pubkey() != active.pubkey {
                    return Err(WalletError::InvalidKey(
                        "Vault secret does not match its public key".to_string(),
                    ));
                }
                Ok(keypair)
            }
            WalletSource::Connected => {
                let path = active.keypair_path.ok_or(WalletError::NoWallet)?;
                read_keypair_file(path)
            }
        }
    }

    pub fn export_wallet(&self, password: &SecretString) -> WalletResult<ExportWalletResponse> {
        if !self.vault.exists() {
            return Err(WalletError::NotFound("No created wallet to export".to_string()));
        }
        let unlocked = self.vault.unlock(password)?;
        let keypair = unlocked.secrets.keypair()?;
        log::warn!("Exported secret material for {}", keypair.pubkey());

        Ok(ExportWalletResponse {
            summary: WalletSummary::from(&unlocked.metadata),
            mnemonic: unlocked.secrets.mnemonic_phrase.clone(),
            secret_key_hex: keypair.secret_hex(),
            secret_key_base58: keypair.to_base58_string(),
        })
    }

    pub fn change_password(
        &self,
        current: &SecretString,
        new_password: &SecretString,
    ) -> WalletResult<ChangePasswordResponse> {
        use secrecy::ExposeSecret;

        self.validator.validate_password(new_password.expose_secret())?;
        if !self.vault.exists() {
            return Err(WalletError::NotFound("No created wallet".to_string()));
        }
        let metadata = self.vault.change_password(current, new_password)?;
        Ok(ChangePasswordResponse {
            success: true,
            summary: WalletSummary::from(metadata),
        })
    }

    pub fn list_backups(&self) -> WalletResult<Vec<BackupInfo>> {
        Ok(self
            .vault
            .available_backups()?
            .into_iter()
            .map(|entry| BackupInfo {
                file_name: entry.file_name(),
                created_at: entry.created_at,
                size_bytes: entry.size_bytes,
            })
            .collect())
    }

    pub fn restore_backup(&mut self, file_name: &str) -> WalletResult<WalletSummary> {
        let path = self.paths.resolve_backup(file_name)?;
        let metadata = self.vault.restore_from_backup(&path)?;
        self.session = WalletSession::default();
        Ok(WalletSummary::from(metadata))
    }

    pub fn validate_address(&self, address: &str) -> ValidateAddressResponse {
        match self.validator.validate_address(address) {
            Ok(pubkey) => ValidateAddressResponse {
                address: pubkey.to_string(),
                is_valid: true,
                is_on_curve: pubkey.is_on_curve(),
            },
            Err(_) => ValidateAddressResponse {
                address: address.trim().to_string(),
                is_valid: false,
                is_on_curve: false,
            },
        }
    }

    // ----- network -----

    /// Balance of `address`, or of the active wallet when `None`.
    pub async fn check_balance(&mut self, address: Option<&str>) -> WalletResult<BalanceResponse> {
        let (pubkey, active) = match address {
            Some(address) => {
                let pubkey = self.validator.validate_address(address)?;
                let active = match self.active_wallet() {
                    Ok(active) => Some(active.pubkey),
                    Err(WalletError::NoWallet) => None,
                    Err(err) => return Err(err),
                };
                (pubkey, active)
            }
            None => {
                let pubkey = self.active_wallet()?.pubkey;
                (pubkey, Some(pubkey))
            }
        };

        let commitment = self.load_config()?.network.commitment;
        let (lamports, endpoint) = self
            .rpc_endpoints()?
            .run(move |client| {
                Box::pin(async move { client.get_balance(&pubkey, commitment).await })
            })
            .await?;
        log::debug!("Balance of {} from {}: {}", pubkey, endpoint, lamports);

        let balance = Lamports::new(lamports);
        if active == Some(pubkey) {
            self.session.balance = Some(balance);
        }
        Ok(balance_response(&pubkey, balance))
    }

    /// Send the session's amount to the session's recipient, wait for confirmation
    /// and refresh the balance.
    pub async fn send_sol(&mut self, password: Option<&SecretString>) -> WalletResult<SendResponse> {
        let recipient = self.validator.validate_address(&self.session.recipient)?;
        let amount = self.validator.validate_amount(&self.session.amount)?;
        let signer = self.signer(password)?;
        let sender = signer.pubkey();

        let config = self.load_config()?;
        let commitment = config.network.commitment;
        let send_options = config.transfer.send_options(commitment);
        let confirm_options = config.transfer.confirm_options(commitment);
        let endpoints = self.rpc_endpoints()?;

        let ((available, latest, fee), _) = endpoints
            .run(move |client| {
                Box::pin(async move {
                    let available = client.get_balance(&sender, commitment).await?;
                    let latest = client.get_latest_blockhash(commitment).await?;
                    let ix = system_instruction::transfer(&sender, &recipient, amount.lamports());
                    let message = Message::new(&[ix], &sender, latest.blockhash)?;
                    let fee = client.get_fee_for_message(&message, commitment).await?;
                    Ok::<(u64, LatestBlockhash, Option<u64>), WalletError>((available, latest, fee))
                })
            })
            .await?;

        let fee = fee.unwrap_or_else(|| {
            log::warn!("Node could not price the transfer; assuming the base fee");
            DEFAULT_LAMPORTS_PER_SIGNATURE
        });
        let required = amount.checked_add(Lamports::new(fee))?;
        if available < required.lamports() {
            return Err(WalletError::InsufficientFunds {
                required: required.lamports(),
                available,
            });
        }

        let transaction =
            Transaction::new_transfer(&signer, &recipient, amount.lamports(), latest.blockhash)?;

        // Resubmitting the same signed transaction elsewhere is safe; a fresh one is not.
        let (signature, endpoint) = endpoints
            .run(|client| {
                let transaction = transaction.clone();
                let send_options = send_options;
                Box::pin(async move { client.send_transaction(&transaction, &send_options).await })
            })
            .await?;
        log::info!(
            "Sent {} from {} to {} ({})",
            amount,
            sender,
            recipient,
            signature
        );

        let client = BlockchainClient::new(endpoint.clone(), config.network.request_timeout())?;
        client
            .confirm_signature(&signature, latest.last_valid_block_height, &confirm_options)
            .await?;

        let balance = match self.check_balance(None).await {
            Ok(balance) => Some(balance),
            Err(err) => {
                log::warn!("Transfer confirmed but balance refresh failed: {}", err);
                None
            }
        };

        Ok(SendResponse {
            signature: signature.to_string(),
            from_address: sender.to_string(),
            to_address: recipient.to_string(),
            lamports: amount.lamports(),
            fee_lamports: fee,
            endpoint,
            balance,
        })
    }

    /// Request test SOL for the active wallet. Refused on mainnet.
    pub async fn airdrop(&mut self, amount: &str) -> WalletResult<AirdropResponse> {
        let lamports = self.validator.validate_amount(amount)?;
        let config = self.load_config()?;
        if self.rpc_override.is_none() && !config.network.cluster.allows_airdrop() {
            return Err(WalletError::ValidationError(format!(
                "Airdrops are not available on {}",
                config.network.cluster
            )));
        }

        let pubkey = self.active_wallet()?.pubkey;
        let commitment = config.network.commitment;
        let confirm_options = config.transfer.confirm_options(commitment);

        let ((signature, latest), endpoint) = self
            .rpc_endpoints()?
            .run(move |client| {
                Box::pin(async move {
                    let latest = client.get_latest_blockhash(commitment).await?;
                    let signature = client
                        .request_airdrop(&pubkey, lamports.lamports(), commitment)
                        .await?;
                    Ok::<_, WalletError>((signature, latest))
                })
            })
            .await?;

        BlockchainClient::new(endpoint, config.network.request_timeout())?
            .confirm_signature(&signature, latest.last_valid_block_height, &confirm_options)
            .await?;
        log::info!("Airdropped {} to {}", lamports, pubkey);

        Ok(AirdropResponse {
            signature: signature.to_string(),
            address: pubkey.to_string(),
            lamports: lamports.lamports(),
        })
    }

    pub async fn transaction_history(
        &self,
        address: Option<&str>,
        limit: usize,
    ) -> WalletResult<TransactionHistoryResponse> {
        let pubkey = match address {
            Some(address) => self.validator.validate_address(address)?,
            None => self.active_wallet()?.pubkey,
        };
        let limit = limit.clamp(1, 1000);

        let (entries, _) = self
            .rpc_endpoints()?
            .run(move |client| {
                Box::pin(async move {
                    client
                        .get_signatures_for_address(&pubkey, Some(limit), None)
                        .await
                })
            })
            .await?;

        let transactions = entries
            .into_iter()
            .map(|entry| TransactionInfo {
                status: match (&entry.err, entry.confirmation_status) {
                    (Some(_), _) => "failed".to_string(),
                    (None, Some(status)) => status.to_string(),
                    (None, None) => "unknown".to_string(),
                },
                error: entry.err.map(|e| e.to_string()),
                signature: entry.signature,
                slot: entry.slot,
                block_time: entry.block_time,
                memo: entry.memo,
            })
            .collect();

        Ok(TransactionHistoryResponse {
            address: pubkey.to_string(),
            transactions,
        })
    }

    // ----- identity provider -----

    pub fn cognito_client(&self) -> WalletResult<CognitoClient> {
        let config = self.load_config()?;
        let auth = self.settings.apply_auth_overrides(&config.auth);
        CognitoClient::new(&auth, config.network.request_timeout())
    }

    pub async fn sign_up(
        &self,
        username: &str,
        password: &SecretString,
        email: &str,
    ) -> WalletResult<SignUpResponse> {
        let result = self.cognito_client()?.sign_up(username, password, email).await?;
        Ok(SignUpResponse {
            username: username.trim().to_string(),
            user_confirmed: result.user_confirmed,
            user_sub: result.user_sub,
            code_destination: result.code_destination,
        })
    }

    pub async fn confirm_sign_up(&self, username: &str, code: &str) -> WalletResult<()> {
        self.cognito_client()?.confirm_sign_up(username, code).await
    }

    pub async fn sign_in(
        &self,
        username: &str,
        password: &SecretString,
    ) -> WalletResult<SignInResponse> {
        match self.cognito_client()?.sign_in(username, password).await? {
            SignInOutcome::Authenticated(session) => {
                self.auth_store.save(&session)?;
                Ok(SignInResponse::SignedIn {
                    username: session.username,
                    expires_at: session.expires_at,
                })
            }
            SignInOutcome::Challenge { name } => Ok(SignInResponse::ChallengeRequired {
                username: username.trim().to_string(),
                challenge_name: name,
            }),
        }
    }

    pub fn sign_out(&self) -> WalletResult<bool> {
        self.auth_store.clear()
    }

    pub fn auth_status(&self) -> WalletResult<AuthStatusResponse> {
        self.auth_store.status(Utc::now())
    }

    fn ensure_no_vault(&self) -> WalletResult<()> {
        if self.vault.exists() {
            return Err(WalletError::AlreadyExists(
                self.vault.vault_path().display().to_string(),
            ));
        }
        Ok(())
    }

    fn store_wallet(
        &self,
        name: &str,
        password: &SecretString,
        wallet: &WalletKeyPair,
        mnemonic: Option<&str>,
    ) -> WalletResult<WalletSummary> {
        let mut metadata = VaultMetadata::new(name, wallet.pubkey().to_string());
        metadata.derivation_path = wallet.derivation_path().map(str::to_string);
        metadata.has_mnemonic = mnemonic.is_some();

        let mut secrets = VaultSecrets::from_keypair(&wallet.keypair);
        if let (Some(phrase), Some(path)) = (mnemonic, wallet.derivation_path()) {
            secrets = secrets.with_mnemonic(phrase, path);
        }

        self.vault.create(VaultCreateParams {
            password,
            metadata: metadata.clone(),
            secrets,
        })?;
        Ok(WalletSummary::from(metadata))
    }
}

fn balance_response(pubkey: &Pubkey, balance: Lamports) -> BalanceResponse {
    BalanceResponse {
        address: pubkey.to_string(),
        lamports: balance.lamports(),
        sol: balance.to_sol_string(),
    }
}
