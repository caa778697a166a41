//! Commands that talk to the cluster

use anyhow::Result;
use aura_wallet_lib::{WalletContext, WalletSource};
use chrono::{TimeZone, Utc};
use colored::Colorize;

use super::{confirm, prompt_password, ENV_PASSWORD};
use crate::output;

pub async fn balance(ctx: &mut WalletContext, address: Option<&str>, json: bool) -> Result<()> {
    let response = ctx.check_balance(address).await?;
    if json {
        return output::json(&response);
    }
    output::field("Address", &response.address);
    output::field("Balance", format!("{} SOL", response.sol).bold());
    Ok(())
}

pub async fn send(
    ctx: &mut WalletContext,
    to: &str,
    amount: &str,
    yes: bool,
    json: bool,
) -> Result<()> {
    ctx.session_mut().set_transfer(to, amount);

    let active = ctx.active_wallet()?;
    if !confirm(&format!("Send {} SOL to {}?", amount.trim(), to.trim()), yes, json)? {
        println!("Cancelled.");
        return Ok(());
    }
    let password = match active.source {
        WalletSource::Created => Some(prompt_password("Wallet password", ENV_PASSWORD)?),
        WalletSource::Connected => None,
    };

    let response = ctx.send_sol(password.as_ref()).await?;
    if json {
        return output::json(&response);
    }

    output::success("Transfer confirmed");
    output::field("Signature", &response.signature);
    output::field("Fee", format!("{} lamports", response.fee_lamports));
    if let Some(balance) = &response.balance {
        output::field("New balance", format!("{} SOL", balance.sol));
    }
    Ok(())
}

pub async fn airdrop(ctx: &mut WalletContext, amount: &str, json: bool) -> Result<()> {
    let response = ctx.airdrop(amount).await?;
    if json {
        return output::json(&response);
    }
    output::success("Airdrop confirmed");
    output::field("Signature", &response.signature);
    Ok(())
}

pub async fn history(
    ctx: &WalletContext,
    address: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let response = ctx.transaction_history(address, limit).await?;
    if json {
        return output::json(&response);
    }

    if response.transactions.is_empty() {
        output::info("No transactions found");
        return Ok(());
    }

    for tx in &response.transactions {
        let when = tx
            .block_time
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = if tx.error.is_some() {
            tx.status.red()
        } else {
            tx.status.green()
        };
        println!("{}  {:>10}  {}  {}", when, tx.slot, status, tx.signature);
    }
    Ok(())
}
