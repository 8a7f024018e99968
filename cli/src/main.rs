// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # rivet
//!
//! Entry point for the `rivet` binary. Parses CLI arguments, initializes
//! logging, runs one offline command and prints its result as JSON on
//! stdout.
//!
//! - `wallet new`  generate a random seed and its first account
//! - `wallet show` every encoding of a seed's or secret's key
//! - `encode`      JSON transaction to canonical hex
//! - `decode`      canonical hex to JSON
//! - `hash`        transaction and signing hashes
//! - `sign`        sign a JSON transaction
//! - `condition`   escrow crypto-condition from a preimage or fulfillment
//! - `version`     print build version information

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;

use rivet_protocol::codec::json::{from_json, to_json};
use rivet_protocol::codec::{deserialize, serialize, signing_hash, transaction_hash, StObject};
use rivet_protocol::crypto::{ConditionType, Fulfillment, KeyPair, KeySelector, Seed};
use rivet_protocol::transaction::sign_fields;

use cli::{Commands, ConditionArgs, RivetCli, ShowArgs, SignArgs, WalletCommand};

fn main() -> Result<()> {
    let cli = RivetCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    let output = match cli.command {
        Commands::Wallet(WalletCommand::New) => wallet_new()?,
        Commands::Wallet(WalletCommand::Show(args)) => wallet_show(&args)?,
        Commands::Encode(args) => encode(&read_input(&args.input)?)?,
        Commands::Decode(args) => decode(&args.hex)?,
        Commands::Hash(args) => hash(&read_input(&args.input)?)?,
        Commands::Sign(args) => sign(&args)?,
        Commands::Condition(args) => condition(&args)?,
        Commands::Version => {
            print_version();
            return Ok(());
        }
    };

    let rendered = serde_json::to_string_pretty(&output).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Inline text, or the contents of the file named after a leading `@`.
fn read_input(input: &str) -> Result<String> {
    match input.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {path}")),
        None => Ok(input.to_string()),
    }
}

fn parse_transaction(text: &str) -> Result<StObject> {
    let json: Value = serde_json::from_str(text.trim()).context("input is not valid JSON")?;
    from_json(&json).context("input is not a valid transaction")
}

/// A JSON object, or else a hex blob.
fn parse_object(text: &str) -> Result<StObject> {
    let text = text.trim();
    if text.starts_with('{') {
        return parse_transaction(text);
    }
    let bytes = hex::decode(text).context("input is neither JSON nor hex")?;
    deserialize(&bytes).context("failed to deserialize blob")
}

/// Either a seed or a bare key pair.
enum Secret {
    Seed(Seed),
    Key(KeyPair),
}

impl Secret {
    fn parse(input: &str) -> Result<Self> {
        if let Ok(key) = KeyPair::parse(input) {
            return Ok(Secret::Key(key));
        }
        Seed::parse(input)
            .map(Secret::Seed)
            .context("secret is neither a key nor a seed")
    }

    fn key(&self, selector: &KeySelector, max_loops: u32) -> Result<KeyPair> {
        match self {
            Secret::Key(key) => Ok(key.clone()),
            Secret::Seed(seed) => seed
                .get_key(selector, max_loops)
                .context("failed to derive account key"),
        }
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SeedReport {
    base58: String,
    hex: String,
    words: String,
    generator_public: String,
}

impl SeedReport {
    fn new(seed: &Seed) -> Result<Self> {
        Ok(Self {
            base58: seed.to_base58(),
            hex: seed.to_hex(),
            words: seed.to_words(),
            generator_public: seed
                .generator()
                .context("failed to derive generator")?
                .to_node_public(),
        })
    }
}

#[derive(Debug, Serialize)]
struct KeyReport {
    address: String,
    account_id: String,
    public_key: String,
    account_public: String,
    account_private: String,
    node_public: String,
    node_private: String,
    secret_hex: String,
    secret_words: String,
    bitcoin_wif: String,
}

impl From<&KeyPair> for KeyReport {
    fn from(key: &KeyPair) -> Self {
        Self {
            address: key.address(),
            account_id: hex::encode_upper(key.account_id().as_bytes()),
            public_key: key.public_key_hex(),
            account_public: key.to_account_public(),
            account_private: key.to_account_private(),
            node_public: key.to_node_public(),
            node_private: key.to_node_private(),
            secret_hex: key.secret_hex(),
            secret_words: key.to_words(),
            bitcoin_wif: key.to_bitcoin_wif(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WalletReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<SeedReport>,
    key: KeyReport,
}

fn wallet_new() -> Result<Value> {
    let seed = Seed::random();
    let key = seed.key().context("failed to derive account key")?;
    tracing::info!(address = %key.address(), "generated wallet");
    let report = WalletReport {
        seed: Some(SeedReport::new(&seed)?),
        key: KeyReport::from(&key),
    };
    serde_json::to_value(report).context("failed to render wallet")
}

fn wallet_show(args: &ShowArgs) -> Result<Value> {
    let secret = Secret::parse(&args.secret)?;
    let selector = match &args.address {
        Some(address) => KeySelector::Address(
            address
                .parse()
                .with_context(|| format!("invalid address {address}"))?,
        ),
        None => KeySelector::Account(args.account.unwrap_or(0)),
    };
    let mut key = secret.key(&selector, args.max_loops)?;
    if let Some(index) = args.hardened_child {
        key = key
            .child(index, true)
            .with_context(|| format!("failed to derive hardened child {index}"))?;
    }

    let seed = match &secret {
        Secret::Seed(seed) => Some(SeedReport::new(seed)?),
        Secret::Key(_) => None,
    };
    let report = WalletReport {
        seed,
        key: KeyReport::from(&key),
    };
    serde_json::to_value(report).context("failed to render wallet")
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

fn encode(text: &str) -> Result<Value> {
    let object = parse_transaction(text)?;
    let blob = serialize(&object).context("failed to serialize")?;
    Ok(serde_json::json!({ "tx_blob": hex::encode_upper(blob) }))
}

fn decode(hex_blob: &str) -> Result<Value> {
    let bytes = hex::decode(hex_blob.trim()).context("input is not hex")?;
    let object = deserialize(&bytes).context("failed to deserialize blob")?;
    Ok(to_json(&object))
}

fn hash(text: &str) -> Result<Value> {
    let object = parse_object(text)?;
    let id = transaction_hash(&object).context("failed to hash transaction")?;
    let signing = signing_hash(&object).context("failed to hash signing fields")?;
    Ok(serde_json::json!({
        "hash": id.to_hex(),
        "signing_hash": signing.to_hex(),
    }))
}

fn sign(args: &SignArgs) -> Result<Value> {
    let mut object = parse_transaction(&read_input(&args.input)?)?;
    for required in ["Sequence", "Fee"] {
        if object.get(required).is_none() {
            bail!("transaction has no {required}; set it before signing offline");
        }
    }

    let key = Secret::parse(&args.secret)?.key(&KeySelector::default(), 1)?;
    match object.get_account("Account") {
        Some(account) if account != key.account_id() => {
            bail!("transaction account {account} is not the signer {}", key.address())
        }
        Some(_) => {}
        None => {
            object.insert("Account", key.account_id());
        }
    }

    let (blob, id) = sign_fields(&key, &mut object).context("failed to sign")?;
    tracing::info!(hash = %id, "transaction signed");
    Ok(serde_json::json!({
        "tx_blob": hex::encode_upper(blob),
        "hash": id.to_hex(),
        "tx_json": to_json(&object),
    }))
}

// ---------------------------------------------------------------------------
// Crypto-conditions
// ---------------------------------------------------------------------------

fn condition(args: &ConditionArgs) -> Result<Value> {
    let fulfillment = match (&args.preimage, &args.fulfillment) {
        (Some(preimage), _) => {
            Fulfillment::preimage(hex::decode(preimage.trim()).context("preimage is not hex")?)
        }
        (None, Some(encoded)) => {
            let bytes = hex::decode(encoded.trim()).context("fulfillment is not hex")?;
            Fulfillment::decode(&bytes).context("failed to decode fulfillment")?
        }
        (None, None) => bail!("give --preimage or --fulfillment"),
    };
    let condition = fulfillment.condition();
    tracing::debug!(kind = %condition.kind(), cost = condition.cost(), "condition computed");
    Ok(serde_json::json!({
        "type": condition.kind().name(),
        "condition": hex::encode_upper(condition.encode()),
        "fulfillment": hex::encode_upper(fulfillment.encode()),
        "cost": condition.cost(),
        "subtypes": condition
            .subtypes()
            .iter()
            .map(ConditionType::name)
            .collect::<Vec<_>>(),
    }))
}

/// Prints version information to stdout.
fn print_version() {
    println!("rivet          {}", env!("CARGO_PKG_VERSION"));
    println!("rivet-protocol {}", rivet_protocol::VERSION);
}
