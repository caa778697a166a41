//! Wallet lifecycle commands

use std::path::Path;

use anyhow::Result;
use aura_wallet_lib::{WalletContext, WalletSource};
use colored::Colorize;
use dialoguer::Password;

use super::{confirm, prompt_new_password, prompt_password, ENV_NEW_PASSWORD, ENV_PASSWORD};
use crate::output;

pub fn create(ctx: &mut WalletContext, name: &str, words: Option<u32>, json: bool) -> Result<()> {
    let password = prompt_new_password("Wallet password", ENV_PASSWORD)?;
    let response = ctx.create_wallet(name, &password, words)?;

    if json {
        return output::json(&response);
    }

    output::success("Wallet created");
    output::field("Name", &response.summary.wallet_name);
    output::field("Address", &response.public_key);
    output::field("Private key", &response.secret_key_hex);
    match &response.mnemonic {
        Some(mnemonic) => output::field("Recovery phrase", mnemonic),
        None => output::info("No recovery phrase: the private key is the only backup"),
    }
    println!();
    output::warning("Save the private key securely!");
    Ok(())
}

pub fn import(
    ctx: &mut WalletContext,
    name: &str,
    ask_passphrase: bool,
    derivation_path: Option<&str>,
    json: bool,
) -> Result<()> {
    let phrase = Password::new()
        .with_prompt("Recovery phrase")
        .interact()?;
    let passphrase = if ask_passphrase {
        Some(Password::new().with_prompt("BIP39 passphrase").interact()?)
    } else {
        None
    };
    let password = prompt_new_password("Wallet password", ENV_PASSWORD)?;

    let response = ctx.import_wallet(
        name,
        &password,
        &phrase,
        passphrase.as_deref(),
        derivation_path,
    )?;

    if json {
        return output::json(&response);
    }
    output::success("Wallet imported");
    output::field("Name", &response.summary.wallet_name);
    output::field("Address", &response.public_key);
    Ok(())
}

pub fn connect(ctx: &mut WalletContext, keypair: &Path, json: bool) -> Result<()> {
    let response = ctx.connect_wallet(keypair)?;
    if json {
        return output::json(&response);
    }
    output::success("Wallet connected");
    output::field("Address", &response.public_key);
    output::field("Keypair", &response.keypair_path);
    if ctx.vault().exists() {
        output::warning("A created wallet exists and remains the active wallet");
    }
    Ok(())
}

pub fn disconnect(ctx: &mut WalletContext, json: bool) -> Result<()> {
    let disconnected = ctx.disconnect_wallet()?;
    if json {
        return output::json(&serde_json::json!({ "disconnected": disconnected }));
    }
    if disconnected {
        output::success("Wallet disconnected");
    } else {
        output::info("No wallet was connected");
    }
    Ok(())
}

pub fn info(ctx: &WalletContext, json: bool) -> Result<()> {
    let info = ctx.wallet_info()?;
    if json {
        return output::json(&info);
    }

    match (&info.active_address, info.source) {
        (Some(address), Some(source)) => {
            let source = match source {
                WalletSource::Created => "created",
                WalletSource::Connected => "connected",
            };
            output::field("Address", address.bold());
            output::field("Source", source);
        }
        _ => output::warning("No wallet connected or created"),
    }
    if let Some(metadata) = &info.metadata {
        output::field("Name", &metadata.wallet_name);
        output::field("Created", metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        if let Some(path) = &metadata.derivation_path {
            output::field("Derivation path", path);
        }
    }
    if let Some(path) = &info.connected_keypair {
        output::field("Connected keypair", path);
    }
    output::field("Cluster", info.config.network.cluster);
    output::field("Endpoint", &info.config.network.primary_endpoint);
    output::field("Commitment", info.config.network.commitment);
    output::field("Home", ctx.paths().root_dir().display());
    Ok(())
}

pub fn address(ctx: &WalletContext, json: bool) -> Result<()> {
    let active = ctx.active_wallet()?;
    if json {
        return output::json(&serde_json::json!({ "address": active.pubkey.to_string() }));
    }
    println!("{}", active.pubkey);
    Ok(())
}

pub fn export(ctx: &WalletContext, yes: bool, json: bool) -> Result<()> {
    if !confirm("Reveal the secret key on screen?", yes, json)? {
        println!("Cancelled.");
        return Ok(());
    }
    let password = prompt_password("Wallet password", ENV_PASSWORD)?;
    let response = ctx.export_wallet(&password)?;

    if json {
        return output::json(&response);
    }
    output::field("Address", &response.summary.public_key);
    output::field("Private key (hex)", &response.secret_key_hex);
    output::field("Keypair (base58)", &response.secret_key_base58);
    if let Some(mnemonic) = &response.mnemonic {
        output::field("Recovery phrase", mnemonic);
    }
    println!();
    output::warning("Save the private key securely!");
    Ok(())
}

pub fn change_password(ctx: &WalletContext, json: bool) -> Result<()> {
    let current = prompt_password("Current password", ENV_PASSWORD)?;
    let new_password = prompt_new_password("New password", ENV_NEW_PASSWORD)?;
    let response = ctx.change_password(&current, &new_password)?;

    if json {
        return output::json(&response);
    }
    output::success("Password changed");
    Ok(())
}

pub fn validate_address(ctx: &WalletContext, address: &str, json: bool) -> Result<()> {
    let response = ctx.validate_address(address);
    if json {
        return output::json(&response);
    }
    if !response.is_valid {
        output::error(&format!("{} is not a valid Solana address", response.address));
    } else if response.is_on_curve {
        output::success(&format!("{} is a valid wallet address", response.address));
    } else {
        output::success(&format!(
            "{} is valid (off-curve, e.g. a program derived address)",
            response.address
        ));
    }
    Ok(())
}
