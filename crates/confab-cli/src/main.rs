//! Confab command-line tool.
//!
//! Generates identity keys and seals or opens group envelopes as JSON, so
//! envelopes can be moved between peers by any transport (files, pipes,
//! chat).
//!
//! # Usage
//!
//! ```bash
//! # Create an identity
//! confab keygen --out alice.json
//!
//! # Seal to two peers
//! confab seal --key alice.json --to bob=<BOB_PUB> --to carol=<CAROL_PUB> \
//!     --message "hello" > envelope.json
//!
//! # Open as bob, expecting carol to be addressed too
//! confab open --key bob.json --me bob --from alice=<ALICE_PUB> \
//!     --member carol --envelope envelope.json
//! ```
//!
//! IV registries live for one invocation only; replay detection across runs
//! is the caller's concern.

mod error;
mod keyfile;

use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use confab_core::{
    IvRegistry, Recipient, Session, SessionConfig, SessionError, WireMessage, encrypt,
};
use confab_crypto::{KeyPair, OsEntropy, PublicKey};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::CliError;

/// Confab group envelope tool
#[derive(Parser, Debug)]
#[command(name = "confab")]
#[command(about = "Seal and open multi-recipient encrypted envelopes")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new identity key
    Keygen {
        /// Write the key file here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the fingerprint of a base64 public key
    Fingerprint {
        /// Base64 public key
        public_key: String,
    },

    /// Encrypt a message to a set of peers
    Seal {
        /// Sender key file
        #[arg(short, long)]
        key: PathBuf,

        /// Recipient as NAME=PUBLIC_KEY
        #[arg(long = "to", value_parser = parse_peer, required = true)]
        to: Vec<Peer>,

        /// Message text; read from stdin when absent
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Verify and decrypt an envelope
    Open {
        /// Recipient key file
        #[arg(short, long)]
        key: PathBuf,

        /// Our identity in the envelope
        #[arg(long)]
        me: String,

        /// Sender as NAME=PUBLIC_KEY
        #[arg(long, value_parser = parse_peer)]
        from: Peer,

        /// Another member who should have been addressed
        #[arg(long = "member")]
        members: Vec<String>,

        /// Envelope file; read from stdin when absent
        #[arg(short, long)]
        envelope: Option<PathBuf>,
    },
}

/// Named public key given on the command line.
#[derive(Debug, Clone)]
struct Peer {
    name: String,
    public_key: PublicKey,
}

/// Parse `NAME=BASE64`. Splits on the first `=` since base64 padding uses it.
fn parse_peer(arg: &str) -> Result<Peer, String> {
    let Some((name, key)) = arg.split_once('=') else {
        return Err(format!("expected NAME=PUBLIC_KEY, got {arg:?}"));
    };
    if name.is_empty() {
        return Err("peer name is empty".to_string());
    }

    let public_key = PublicKey::from_base64(key).map_err(|err| err.to_string())?;
    Ok(Peer { name: name.to_string(), public_key })
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::from(err.exit_code())
        },
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Keygen { out } => keygen(out.as_deref()),
        Command::Fingerprint { public_key } => {
            let public_key = PublicKey::from_base64(&public_key)?;
            emit(&public_key.fingerprint().to_hex())
        },
        Command::Seal { key, to, message } => {
            let message = match message {
                Some(message) => message,
                None => read_stdin_text()?,
            };
            seal(&keyfile::load(&key)?, &to, &message)
        },
        Command::Open { key, me, from, members, envelope } => {
            let raw = match envelope {
                Some(path) => fs::read_to_string(&path)
                    .map_err(CliError::io(format!("reading envelope {}", path.display())))?,
                None => read_stdin()?,
            };
            open(keyfile::load(&key)?, &me, &from, &members, &raw)
        },
    }
}

fn keygen(out: Option<&Path>) -> Result<(), CliError> {
    let keys = KeyPair::generate(&OsEntropy)?;
    let encoded = keyfile::encode(&keys);

    match out {
        Some(path) => {
            fs::write(path, format!("{encoded}\n"))
                .map_err(CliError::io(format!("writing key file {}", path.display())))?;
            tracing::info!(path = %path.display(), fingerprint = %keys.fingerprint(), "wrote key");
            emit(&keys.public_key().to_base64())
        },
        None => emit(&encoded),
    }
}

fn seal(keys: &KeyPair, to: &[Peer], message: &str) -> Result<(), CliError> {
    let recipients: Vec<_> = to
        .iter()
        .map(|peer| Recipient::new(peer.name.clone(), keys.shared_secret(&peer.public_key)))
        .collect();

    let envelope = encrypt(message, &recipients, &IvRegistry::new(), &OsEntropy)?;
    tracing::info!(recipients = envelope.text.len(), "sealed");

    emit(&WireMessage::Message(envelope).encode()?)
}

fn open(keys: KeyPair, me: &str, from: &Peer, members: &[String], raw: &str) -> Result<(), CliError> {
    let mut session = Session::from_key_pair(me, keys, SessionConfig::default(), OsEntropy);
    session.set_peer_public_key(&from.name, from.public_key)?;
    for member in members {
        session.add_member(member);
    }

    let envelope = match WireMessage::decode(raw)? {
        WireMessage::Message(envelope) => envelope,
        other => return Err(CliError::NotAMessage { kind: other.kind().to_string() }),
    };

    let decrypted = session.decrypt(&from.name, &envelope).map_err(SessionError::from)?;
    emit(&decrypted.plaintext)
}

fn read_stdin() -> Result<String, CliError> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input).map_err(CliError::io("reading stdin"))?;
    Ok(input)
}

/// Stdin without the trailing newline a shell pipe usually adds.
fn read_stdin_text() -> Result<String, CliError> {
    let mut input = read_stdin()?;
    if input.ends_with('\n') {
        input.pop();
        if input.ends_with('\r') {
            input.pop();
        }
    }
    Ok(input)
}

fn emit(line: &str) -> Result<(), CliError> {
    writeln!(io::stdout().lock(), "{line}").map_err(CliError::io("writing stdout"))
}
