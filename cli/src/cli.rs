//! # CLI Interface
//!
//! Defines the command-line argument structure for `rivet` using `clap`
//! derive. Everything runs offline: no subcommand opens a connection.

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::logging::LogFormat;

/// Offline wallet, codec and signing tool for ledger clients.
///
/// Derives accounts from seeds and secrets, converts transactions between
/// JSON and the canonical binary format, and signs them for submission
/// through whatever client you already use.
#[derive(Parser, Debug)]
#[command(
    name = "rivet",
    about = "Offline wallet, codec and signing tool",
    version,
    propagate_version = true
)]
pub struct RivetCli {
    /// Log output format. Logs go to stderr.
    #[arg(long, global = true, env = "RIVET_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, global = true, env = "RIVET_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `rivet` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate or inspect keys.
    #[command(subcommand)]
    Wallet(WalletCommand),
    /// Serialize a JSON transaction to hex.
    Encode(InputArgs),
    /// Deserialize a hex blob to JSON.
    Decode(DecodeArgs),
    /// Transaction and signing hashes of a JSON transaction or hex blob.
    Hash(InputArgs),
    /// Sign a JSON transaction and print the blob ready to submit.
    Sign(SignArgs),
    /// Escrow crypto-condition for a preimage or an encoded fulfillment.
    Condition(ConditionArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum WalletCommand {
    /// Generate a fresh random seed and its first account.
    New,
    /// Show every encoding of the key a secret selects.
    Show(ShowArgs),
}

/// Arguments for `wallet show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Family seed, hex seed, mnemonic, passphrase, or a raw account secret.
    #[arg(env = "RIVET_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Account index under the seed's generator.
    #[arg(long, conflicts_with = "address")]
    pub account: Option<u32>,

    /// Find the account with this address instead of using an index.
    #[arg(long)]
    pub address: Option<String>,

    /// Accounts to try when searching by address.
    #[arg(long, default_value_t = 1, requires = "address")]
    pub max_loops: u32,

    /// Derive a hardened child of the selected key.
    #[arg(long)]
    pub hardened_child: Option<u32>,
}

/// A JSON transaction given inline or as `@path`.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Inline JSON, hex, or `@path` to read it from a file.
    pub input: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex-encoded serialized object.
    pub hex: String,
}

/// Arguments for `sign`.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Seed or account secret to sign with.
    #[arg(env = "RIVET_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Inline JSON or `@path`. Must carry `Sequence` and `Fee`.
    pub input: String,
}

/// Arguments for `condition`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["preimage", "fulfillment"])))]
pub struct ConditionArgs {
    /// Hex preimage to build a preimage-sha-256 fulfillment from.
    #[arg(long)]
    pub preimage: Option<String>,

    /// Hex DER fulfillment of any type to decode and fingerprint.
    #[arg(long)]
    pub fulfillment: Option<String>,
}
