//! aura - Solana wallet in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use aura_wallet_lib::{Settings, WalletContext};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{auth, backups, config, network, wallet};

/// Aura - create Solana keypairs, check balances and send SOL
#[derive(Parser)]
#[command(name = "aura", version, about, long_about = None)]
struct Cli {
    /// Wallet home directory (default: ~/.aura-wallet)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// RPC endpoint to use instead of the configured ones
    #[arg(long, short = 'u', global = true)]
    url: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet with a recovery phrase
    Create {
        #[arg(long, default_value = "Main")]
        name: String,
        /// Recovery phrase length (12, 15, 18, 21 or 24)
        #[arg(long, default_value_t = 12)]
        words: u32,
        /// Generate a bare keypair without a recovery phrase
        #[arg(long, conflicts_with = "words")]
        no_mnemonic: bool,
    },

    /// Restore a wallet from a recovery phrase
    Import {
        #[arg(long, default_value = "Main")]
        name: String,
        /// Prompt for a BIP39 passphrase
        #[arg(long)]
        passphrase: bool,
        #[arg(long)]
        derivation_path: Option<String>,
    },

    /// Use a Solana CLI keypair file
    Connect { keypair: PathBuf },

    /// Forget the connected keypair file
    Disconnect,

    /// Show wallet and network details
    Info,

    /// Print the active wallet address
    Address,

    /// Show a SOL balance
    Balance {
        /// Address to query instead of the active wallet
        #[arg(long)]
        address: Option<String>,
    },

    /// Send SOL to another address
    Send {
        #[arg(long)]
        to: String,
        /// Amount in SOL
        #[arg(long)]
        amount: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Request test SOL (devnet, testnet, localnet)
    Airdrop {
        /// Amount in SOL
        amount: String,
    },

    /// Recent transactions
    History {
        #[arg(long)]
        address: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Reveal the secret key and recovery phrase
    Export {
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Change the wallet password
    ChangePassword,

    /// Check whether a string is a valid Solana address
    ValidateAddress { address: String },

    /// Manage vault backups
    Backups {
        #[command(subcommand)]
        command: backups::BackupCommands,
    },

    /// Manage network and account settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// Sign up and sign in to an Aura account
    Auth {
        #[command(subcommand)]
        command: auth::AuthCommands,
    },
}

fn init_logging(settings: &Settings, verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_new(settings.log_filter()).unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // `init` also bridges records from the `log` facade
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn open_context(home: Option<PathBuf>, url: Option<String>, settings: Settings) -> Result<WalletContext> {
    let root = match home {
        Some(home) => home,
        None => settings.root_dir()?,
    };
    tracing::debug!(
        "aura {} ({}) using {}",
        env!("CARGO_PKG_VERSION"),
        settings.environment,
        root.display()
    );
    let mut ctx = WalletContext::initialize_with(root, settings)?;
    if url.is_some() {
        ctx.set_rpc_override(url)?;
    }
    Ok(ctx)
}

async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let json = cli.json;
    let mut ctx = open_context(cli.home, cli.url, settings)?;

    match cli.command {
        Commands::Create {
            name,
            words,
            no_mnemonic,
        } => {
            let words = (!no_mnemonic).then_some(words);
            wallet::create(&mut ctx, &name, words, json)
        }
        Commands::Import {
            name,
            passphrase,
            derivation_path,
        } => wallet::import(&mut ctx, &name, passphrase, derivation_path.as_deref(), json),
        Commands::Connect { keypair } => wallet::connect(&mut ctx, &keypair, json),
        Commands::Disconnect => wallet::disconnect(&mut ctx, json),
        Commands::Info => wallet::info(&ctx, json),
        Commands::Address => wallet::address(&ctx, json),
        Commands::Balance { address } => network::balance(&mut ctx, address.as_deref(), json).await,
        Commands::Send { to, amount, yes } => network::send(&mut ctx, &to, &amount, yes, json).await,
        Commands::Airdrop { amount } => network::airdrop(&mut ctx, &amount, json).await,
        Commands::History { address, limit } => {
            network::history(&ctx, address.as_deref(), limit, json).await
        }
        Commands::Export { yes } => wallet::export(&ctx, yes, json),
        Commands::ChangePassword => wallet::change_password(&ctx, json),
        Commands::ValidateAddress { address } => wallet::validate_address(&ctx, &address, json),
        Commands::Backups { command } => backups::run(&mut ctx, command, json),
        Commands::Config { command } => config::run(&ctx, command, json),
        Commands::Auth { command } => auth::run(&ctx, command, json).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = Settings::from_env();
    init_logging(&settings, cli.verbose);

    let json = cli.json;
    match run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json {
                println!("{}", serde_json::json!({ "error": err.to_string() }));
            } else {
                output::error(&format!("Error: {}", err));
            }
            ExitCode::FAILURE
        }
    }
}
