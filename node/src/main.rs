//! Somnia registry devnet node
//!
//! Drives the name registry and voucher escrow against a local JSON state
//! file. Every state-changing command is signed with the caller's Ed25519 key
//! and submitted through the runtime, so nonces and signatures are enforced
//! exactly as they would be for remote clients.

mod settings;
mod state;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand_core::OsRng;
use serde_json::json;
use settings::AppConfig;
use somnia_runtime::{address_of, Call, Receipt, Runtime, Transaction};
use somnia_types::{Address, Amount, VoucherId};
use state::StateStore;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "somnia-node")]
#[command(about = "Local devnet for the Somnia name registry and voucher escrow", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the state file location
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Override the log level (RUST_LOG still takes precedence)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write genesis state
    Init {
        /// Replace existing state
        #[arg(long)]
        force: bool,
    },
    /// Generate a new Ed25519 signing key
    Keygen,
    /// Print the address controlled by a key
    Address(KeyArg),
    /// Native balance of an address
    Balance { address: Address },
    /// Chain id, height and registry totals
    Status,
    /// Name registry operations
    Name {
        #[command(subcommand)]
        action: NameCommands,
    },
    /// Voucher escrow operations
    Voucher {
        #[command(subcommand)]
        action: VoucherCommands,
    },
}

impl Commands {
    fn mutates_state(&self) -> bool {
        match self {
            Commands::Name { action } => matches!(
                action,
                NameCommands::Register { .. } | NameCommands::Transfer { .. }
            ),
            Commands::Voucher { action } => matches!(
                action,
                VoucherCommands::Create { .. } | VoucherCommands::Redeem { .. }
            ),
            _ => false,
        }
    }
}

#[derive(Subcommand)]
enum NameCommands {
    /// Register a name to the signer
    Register {
        name: String,
        #[command(flatten)]
        key: KeyArg,
    },
    /// Owner of a registered name
    Resolve { name: String },
    /// Owner, registration time and existence flag
    Info { name: String },
    /// Transfer a name owned by the signer
    Transfer {
        name: String,
        new_owner: Address,
        #[command(flatten)]
        key: KeyArg,
    },
    /// Names owned by an address, oldest first
    List { owner: Address },
}

#[derive(Subcommand)]
enum VoucherCommands {
    /// Lock value under a voucher id
    Create {
        /// Amount in STT, e.g. 1.5
        #[arg(long)]
        amount: Amount,
        /// Explicit voucher id (32-byte hex); random when omitted
        #[arg(long, conflicts_with = "seed")]
        id: Option<VoucherId>,
        /// Derive the voucher id from a passphrase
        #[arg(long)]
        seed: Option<String>,
        #[command(flatten)]
        key: KeyArg,
    },
    /// Redeem a voucher to the signer
    Redeem {
        id: VoucherId,
        #[command(flatten)]
        key: KeyArg,
    },
    /// Locked amount of a voucher
    Amount { id: VoucherId },
    /// Existence, redemption state, creator and amount
    Status { id: VoucherId },
}

#[derive(Args)]
struct KeyArg {
    /// Hex-encoded 32-byte Ed25519 secret key
    #[arg(long = "key", value_name = "HEX")]
    secret: String,
}

impl KeyArg {
    fn signing_key(&self) -> Result<SigningKey> {
        let trimmed = self.secret.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_part, &mut bytes)
            .context("secret key must be 32 bytes of hex")?;
        Ok(SigningKey::from_bytes(&bytes))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(state) = cli.state {
        config.state_path = state;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    init_logging(&config)?;

    match cli.command {
        Commands::Keygen => keygen(),
        Commands::Address(key) => {
            let key = key.signing_key()?;
            print_json(&json!({ "address": address_of(&key) }))
        }
        Commands::Init { force } => init(&config, force),
        command => {
            let store = StateStore::open(&config.state_path)?;
            let runtime = store.load(config.runtime_config())?;
            let mutates = command.mutates_state();
            let outcome = run(&runtime, command);
            // A reverted call has still consumed its nonce.
            if mutates {
                store.save(&runtime)?;
            }
            outcome
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // stdout carries command output
    if config.log_format == "compact" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}

fn keygen() -> Result<()> {
    let key = SigningKey::generate(&mut OsRng);
    print_json(&json!({
        "secret_key": hex::encode(key.to_bytes()),
        "public_key": hex::encode(key.verifying_key().to_bytes()),
        "address": address_of(&key),
    }))
}

fn init(config: &AppConfig, force: bool) -> Result<()> {
    let store = StateStore::open(&config.state_path)?;
    if store.exists() {
        if !force {
            anyhow::bail!(
                "state already exists at {} (use --force to replace it)",
                store.path().display()
            );
        }
        store.remove()?;
    }

    let runtime = store.load(config.runtime_config())?;
    store.save(&runtime)?;
    info!(path = %store.path().display(), "devnet initialised");
    print_json(&json!({
        "state": store.path(),
        "chain_id": runtime.chain_id(),
        "escrow": runtime.config().escrow_address,
        "total_supply": runtime.total_supply(),
    }))
}

fn run(runtime: &Runtime, command: Commands) -> Result<()> {
    match command {
        Commands::Balance { address } => {
            let balance = runtime.balance_of(&address);
            print_json(&json!({
                "address": address,
                "balance": balance,
                "formatted": balance.to_string(),
                "nonce": runtime.nonce_of(&address),
            }))
        }
        Commands::Status => {
            let snapshot = runtime.snapshot();
            print_json(&json!({
                "chain_id": snapshot.chain_id,
                "height": snapshot.height,
                "names": snapshot.names.len(),
                "vouchers": snapshot.escrow.vouchers.len(),
                "escrow": snapshot.escrow.custody,
                "escrow_balance": runtime.escrow_balance(),
                "total_supply": runtime.total_supply(),
            }))
        }
        Commands::Name { action } => run_name(runtime, action),
        Commands::Voucher { action } => run_voucher(runtime, action),
        Commands::Init { .. } | Commands::Keygen | Commands::Address(_) => {
            Err(anyhow!("command does not operate on state"))
        }
    }
}

fn run_name(runtime: &Runtime, action: NameCommands) -> Result<()> {
    match action {
        NameCommands::Register { name, key } => {
            let receipt = submit(runtime, &key, Amount::ZERO, Call::RegisterName { name })?;
            print_json(&receipt)
        }
        NameCommands::Transfer {
            name,
            new_owner,
            key,
        } => {
            let call = Call::TransferName { name, new_owner };
            let receipt = submit(runtime, &key, Amount::ZERO, call)?;
            print_json(&receipt)
        }
        NameCommands::Resolve { name } => {
            let owner = runtime.resolve_name(&name)?;
            print_json(&json!({ "name": name, "owner": owner }))
        }
        NameCommands::Info { name } => print_json(&runtime.get_name_info(&name)),
        NameCommands::List { owner } => {
            print_json(&json!({
                "owner": owner,
                "names": runtime.get_owner_names(&owner),
            }))
        }
    }
}

fn run_voucher(runtime: &Runtime, action: VoucherCommands) -> Result<()> {
    match action {
        VoucherCommands::Create {
            amount,
            id,
            seed,
            key,
        } => {
            let voucher_id = match (id, seed) {
                (Some(id), _) => id,
                (None, Some(seed)) => VoucherId::derive(seed.as_bytes()),
                (None, None) => VoucherId::random(),
            };
            let receipt = submit(runtime, &key, amount, Call::CreateVoucher { voucher_id })?;
            print_json(&json!({ "voucher_id": voucher_id, "receipt": receipt }))
        }
        VoucherCommands::Redeem { id, key } => {
            let call = Call::RedeemVoucher { voucher_id: id };
            let receipt = submit(runtime, &key, Amount::ZERO, call)?;
            print_json(&receipt)
        }
        VoucherCommands::Amount { id } => {
            let amount = runtime.get_voucher_amount(&id);
            print_json(&json!({
                "voucher_id": id,
                "amount": amount,
                "formatted": amount.to_string(),
            }))
        }
        VoucherCommands::Status { id } => print_json(&runtime.get_voucher_status(&id)),
    }
}

/// Sign `call` with the sender's next nonce and submit it.
fn submit(runtime: &Runtime, key: &KeyArg, value: Amount, call: Call) -> Result<Receipt> {
    let key = key.signing_key()?;
    let sender = address_of(&key);
    let signed = Transaction::new(sender, call)
        .with_nonce(runtime.nonce_of(&sender))
        .with_value(value)
        .sign(&key, runtime.chain_id());
    Ok(runtime.submit(&signed)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
