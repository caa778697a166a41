//! CLI command implementations

pub mod auth;
pub mod backups;
pub mod config;
pub mod network;
pub mod wallet;

use anyhow::Result;
use dialoguer::{Confirm, Password};
use secrecy::SecretString;

/// Read instead of prompting, for scripted use
pub const ENV_PASSWORD: &str = "AURA_PASSWORD";
pub const ENV_NEW_PASSWORD: &str = "AURA_NEW_PASSWORD";
/// Identity account password, kept apart from the vault password
pub const ENV_ACCOUNT_PASSWORD: &str = "AURA_ACCOUNT_PASSWORD";

fn from_env(key: &str) -> Option<SecretString> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

pub fn prompt_password(prompt: &str, env_key: &str) -> Result<SecretString> {
    if let Some(password) = from_env(env_key) {
        return Ok(password);
    }
    let password = Password::new().with_prompt(prompt).interact()?;
    Ok(SecretString::from(password))
}

/// Prompt twice for a password that is about to be set
pub fn prompt_new_password(prompt: &str, env_key: &str) -> Result<SecretString> {
    if let Some(password) = from_env(env_key) {
        return Ok(password);
    }
    let password = Password::new()
        .with_prompt(prompt)
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;
    Ok(SecretString::from(password))
}

/// True when the user agrees or `assume_yes` is set. JSON mode never prompts.
pub fn confirm(prompt: &str, assume_yes: bool, json: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if json {
        anyhow::bail!("Confirmation required; pass --yes");
    }
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
