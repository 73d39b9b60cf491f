//! Direct charge operator tool.
//!
//! # Usage
//!
//! ```bash
//! # Encrypt a card with the key from dcharge.toml or DCHARGE_ENCRYPTION_KEY
//! dcharge encrypt-card --number "5531 8866 5214 2950" --expiry-month 09 --expiry-year 32 --cvv 564
//!
//! # Classify a saved processor response
//! dcharge inspect response.json
//!
//! # Configure logging level
//! RUST_LOG=debug dcharge brand 4242424242424242
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `dcharge.toml`)
//! - `DCHARGE_ENCRYPTION_KEY` - Base64 merchant key
//! - `RUST_LOG` - Log level filter (default: `info`)

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use dcharge_cli::CliConfig;
use dcharge_cli::commands::{self, CardInput};
use dcharge_cli::config::DEFAULT_CONFIG_PATH;
use dcharge_cli::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "dcharge", version, about = "Direct card charge operator tool")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Encrypt card fields into the wire payload.
    EncryptCard {
        /// Card number; spaces are ignored.
        #[arg(long)]
        number: String,
        /// Two-digit expiry month.
        #[arg(long)]
        expiry_month: String,
        /// Two-digit expiry year.
        #[arg(long)]
        expiry_year: String,
        /// Card verification value.
        #[arg(long)]
        cvv: Option<String>,
        /// Fixed 12-character nonce instead of a generated one.
        #[arg(long)]
        nonce: Option<String>,
    },
    /// Encrypt a card PIN into the wire payload.
    EncryptPin {
        /// PIN digits.
        #[arg(long)]
        pin: String,
        /// Fixed 12-character nonce instead of a generated one.
        #[arg(long)]
        nonce: Option<String>,
    },
    /// Decrypt one encrypted field.
    Decrypt {
        /// Nonce the field was sealed with.
        #[arg(long)]
        nonce: String,
        /// Base64 ciphertext including the tag.
        #[arg(long)]
        ciphertext: String,
    },
    /// Report brand and number validity of a card number.
    Brand {
        /// Card number; spaces are ignored.
        number: String,
    },
    /// Classify a saved processor response (`-` reads stdin).
    Inspect {
        /// Path to a JSON response body.
        path: PathBuf,
    },
}

fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = CliConfig::load_from(&cli.config)?;
    tracing::debug!(path = %cli.config.display(), ?config, "Loaded configuration");

    let output = match cli.command {
        Command::EncryptCard {
            number,
            expiry_month,
            expiry_year,
            cvv,
            nonce,
        } => {
            let input = CardInput {
                number,
                expiry_month,
                expiry_year,
                cvv,
            };
            commands::encrypt_card(&config.encryptor()?, input, nonce.as_deref())?
        }
        Command::EncryptPin { pin, nonce } => {
            commands::encrypt_pin(&config.encryptor()?, pin, nonce.as_deref())?
        }
        Command::Decrypt { nonce, ciphertext } => {
            commands::decrypt(&config.encryptor()?, &nonce, &ciphertext)?
        }
        Command::Brand { number } => commands::brand(&number),
        Command::Inspect { path } => {
            let response = read_json(&path)?;
            commands::inspect(&response, &config.supervisor())?
        }
    };

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &output)?;
    writeln!(stdout)?;
    Ok(())
}

fn read_json(path: &Path) -> Result<Value, CliError> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&text)?)
}
