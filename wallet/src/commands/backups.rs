use anyhow::Result;
use aura_wallet_lib::WalletContext;
use clap::Subcommand;

use super::confirm;
use crate::output;

#[derive(Subcommand)]
pub enum BackupCommands {
    /// List vault backups, newest first
    List,
    /// Replace the vault with a backup (the current vault is backed up first)
    Restore {
        name: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

pub fn run(ctx: &mut WalletContext, command: BackupCommands, json: bool) -> Result<()> {
    match command {
        BackupCommands::List => {
            let backups = ctx.list_backups()?;
            if json {
                return output::json(&backups);
            }
            if backups.is_empty() {
                output::info("No backups found");
                return Ok(());
            }
            for backup in backups {
                let created = backup
                    .created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}  {}  {} bytes", backup.file_name, created, backup.size_bytes);
            }
        }
        BackupCommands::Restore { name, yes } => {
            if !confirm(&format!("Restore vault from backup '{}'?", name), yes, json)? {
                println!("Cancelled.");
                return Ok(());
            }
            let summary = ctx.restore_backup(&name)?;
            if json {
                return output::json(&summary);
            }
            output::success(&format!("Vault restored from backup: {}", name));
            output::field("Address", &summary.public_key);
        }
    }
    Ok(())
}
