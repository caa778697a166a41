use aura_wallet_lib::crypto::{write_keypair_file, WalletKeyPair};
use aura_wallet_lib::{
    Environment, Keypair, Settings, WalletContext, WalletError, WalletResult, WalletSource,
};
use secrecy::SecretString;
use tempfile::TempDir;

fn test_context(dir: &TempDir) -> WalletResult<WalletContext> {
    let settings = Settings {
        environment: Environment::Test,
        ..Settings::default()
    };
    WalletContext::initialize_with(dir.path().join("aura"), settings)
}

#[test]
fn wallet_create_unlock_export_flow() -> WalletResult<()> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let mut context = test_context(&temp_dir)?;

    let password = SecretString::from("Integration pass 1".to_string());
    let created = context.create_wallet("Integration Wallet", &password, Some(12))?;
    assert!(context.vault().exists());
    assert_eq!(created.summary.wallet_name, "Integration Wallet");

    // The session keeps the freshly generated keypair
    let generated = context.session().generated.clone().expect("generated keypair");
    assert_eq!(generated.pubkey().to_string(), created.public_key);

    // Metadata is readable without the password
    let metadata = context.vault().read_metadata()?.expect("metadata");
    assert_eq!(metadata.public_key, created.public_key);
    assert!(metadata.has_mnemonic);

    let wrong_password = SecretString::from("Wrong pass 123".to_string());
    let err = context
        .export_wallet(&wrong_password)
        .expect_err("expected unlock failure");
    assert!(matches!(err, WalletError::CryptoError(_)));

    let exported = context.export_wallet(&password)?;
    let phrase = created.mnemonic.as_deref().expect("recovery phrase");
    assert_eq!(exported.mnemonic.as_deref(), Some(phrase));
    assert_eq!(exported.secret_key_hex, created.secret_key_hex);

    // The mnemonic re-derives the same address
    let restored = WalletKeyPair::from_mnemonic(phrase, None, None)?;
    assert_eq!(restored.pubkey().to_string(), created.public_key);
    Ok(())
}

#[test]
fn wallet_without_recovery_phrase_exports_key_only() -> WalletResult<()> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let mut context = test_context(&temp_dir)?;

    let password = SecretString::from("Integration pass 1".to_string());
    let created = context.create_wallet("Bare", &password, None)?;
    assert!(created.mnemonic.is_none());

    let metadata = context.vault().read_metadata()?.expect("metadata");
    assert!(!metadata.has_mnemonic);
    assert_eq!(metadata.derivation_path, None);

    let exported = context.export_wallet(&password)?;
    assert_eq!(exported.mnemonic, None);
    assert_eq!(exported.secret_key_hex, created.secret_key_hex);

    let signer = context.signer(Some(&password))?;
    assert_eq!(signer.pubkey().to_string(), created.public_key);
    Ok(())
}

#[test]
fn change_password_then_restore_backup() -> WalletResult<()> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let mut context = test_context(&temp_dir)?;

    let old_password = SecretString::from("First password 1".to_string());
    let new_password = SecretString::from("Second password 2".to_string());
    let created = context.create_wallet("Main", &old_password, Some(12))?;

    let changed = context.change_password(&old_password, &new_password)?;
    assert!(changed.success);
    assert!(context.export_wallet(&old_password).is_err());
    context.export_wallet(&new_password)?;

    // Changing the password backed up the previous vault
    let backups = context.list_backups()?;
    assert!(!backups.is_empty());
    let oldest = backups.last().expect("backup").file_name.clone();

    let summary = context.restore_backup(&oldest)?;
    assert_eq!(summary.public_key, created.public_key);
    context.export_wallet(&old_password)?;

    assert!(context.restore_backup("../aura.vault").is_err());
    Ok(())
}

#[test]
fn connected_keypair_signs_without_password() -> WalletResult<()> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let mut context = test_context(&temp_dir)?;

    let external = Keypair::generate()?;
    let keypair_path = temp_dir.path().join("id.json");
    write_keypair_file(&external, &keypair_path)?;

    context.connect_wallet(&keypair_path)?;
    let info = context.wallet_info()?;
    assert_eq!(info.source, Some(WalletSource::Connected));
    assert!(!info.vault_exists);
    assert_eq!(info.active_address, Some(external.pubkey().to_string()));

    let signer = context.signer(None)?;
    assert_eq!(signer.pubkey(), external.pubkey());

    // Config persists across contexts
    drop(context);
    let reopened = test_context(&temp_dir)?;
    assert_eq!(reopened.active_wallet()?.pubkey, external.pubkey());
    Ok(())
}
