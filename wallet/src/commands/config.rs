use anyhow::Result;
use aura_wallet_lib::{Cluster, Commitment, WalletConfig, WalletContext};
use clap::Subcommand;

use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current configuration
    Show,
    /// Switch to mainnet-beta, devnet, testnet or localnet
    SetCluster { cluster: String },
    /// Use a custom RPC endpoint as primary
    SetEndpoint { url: String },
    /// Add an endpoint tried when the primary is unreachable
    AddFailover { url: String },
    ClearFailovers,
    /// processed, confirmed or finalized
    SetCommitment { commitment: String },
    /// Configure the account service app client
    SetAuth {
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        endpoint: Option<String>,
    },
}

pub fn run(ctx: &WalletContext, command: ConfigCommands, json: bool) -> Result<()> {
    let config = match command {
        ConfigCommands::Show => ctx.load_config()?,
        ConfigCommands::SetCluster { cluster } => {
            let cluster: Cluster = cluster.parse()?;
            ctx.update_config(|config| config.network.set_cluster(cluster))?
        }
        ConfigCommands::SetEndpoint { url } => {
            ctx.update_config(|config| config.network.set_endpoint(&url))?
        }
        ConfigCommands::AddFailover { url } => {
            ctx.update_config(|config| config.network.add_failover(&url))?
        }
        ConfigCommands::ClearFailovers => ctx.update_config(|config| {
            config.network.failover_endpoints.clear();
            Ok(())
        })?,
        ConfigCommands::SetCommitment { commitment } => {
            let commitment: Commitment = commitment.parse()?;
            ctx.update_config(|config| {
                config.network.commitment = commitment;
                Ok(())
            })?
        }
        ConfigCommands::SetAuth {
            client_id,
            region,
            endpoint,
        } => ctx.update_config(|config| {
            if let Some(client_id) = client_id {
                config.auth.client_id = Some(client_id.trim().to_string()).filter(|c| !c.is_empty());
            }
            if let Some(region) = region {
                config.auth.region = region.trim().to_string();
            }
            if let Some(endpoint) = endpoint {
                config.auth.endpoint = Some(endpoint.trim().to_string()).filter(|e| !e.is_empty());
            }
            Ok(())
        })?,
    };

    if json {
        return output::json(&config);
    }
    print_config(&config);
    Ok(())
}

fn print_config(config: &WalletConfig) {
    output::field("Cluster", config.network.cluster);
    output::field("Endpoint", &config.network.primary_endpoint);
    for failover in &config.network.failover_endpoints {
        output::field("Failover", failover);
    }
    output::field("Commitment", config.network.commitment);
    output::field("Request timeout", format!("{}s", config.network.request_timeout_secs));
    output::field("Confirm timeout", format!("{}s", config.transfer.confirm_timeout_secs));
    output::field(
        "Account client id",
        config.auth.client_id.as_deref().unwrap_or("(not set)"),
    );
    output::field("Account region", &config.auth.region);
    output::field("Environment", &config.environment);
}
