//! notecrypt CLI - password-based text file encryption
//!
//! Command-line interface for encrypting and decrypting Crypto Notepad
//! `.cnp` files: AES-CBC with a password-derived key, stored as base64.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;

use notecrypt::file_ops::{self, Outcome};
use notecrypt::params::{
    CodecParams, DEFAULT_FALLBACK_SALT, DEFAULT_ITERATIONS, HashAlgorithm, KeySize,
};
use notecrypt::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};
use notecrypt::prompt::{AlwaysAccept, AlwaysDecline, LegacyPrompt, TerminalPrompt};
use notecrypt::{NotecryptError, Result};

/// Exit status when the user declined to open a headerless file.
const EXIT_CANCELLED: i32 = 2;

#[derive(Parser)]
#[command(name = "notecrypt")]
#[command(version)]
#[command(
    about = "Password-based text file encryption (Crypto Notepad compatible).",
    long_about = None
)]
struct Cli {
    /// Read password from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Salt text for encryption; a random 64-byte salt is used when unset
    #[arg(long, global = true, env = "NOTECRYPT_SALT")]
    salt: Option<String>,

    /// Salt used to decrypt legacy files that carry no metadata
    #[arg(
        long,
        global = true,
        env = "NOTECRYPT_FALLBACK_SALT",
        default_value = DEFAULT_FALLBACK_SALT
    )]
    fallback_salt: String,

    /// Hash for key derivation: SHA1, MD5, SHA256, SHA384 or SHA512
    #[arg(long = "hash", global = true, env = "NOTECRYPT_HASH", default_value = "SHA1")]
    hash_algorithm: HashAlgorithm,

    /// Key derivation iterations
    #[arg(long, global = true, env = "NOTECRYPT_ITERATIONS", default_value_t = DEFAULT_ITERATIONS)]
    iterations: u32,

    /// AES key size in bits: 128, 192 or 256
    #[arg(long, global = true, env = "NOTECRYPT_KEY_SIZE", default_value_t = 256)]
    key_size: u32,

    /// What to do with files that have no metadata header
    #[arg(long, global = true, value_enum, default_value_t = LegacyMode::Ask)]
    legacy: LegacyMode,

    /// Log each step to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LegacyMode {
    /// Decrypt with the legacy IV and fallback salt without asking
    Yes,
    /// Refuse to decrypt
    No,
    /// Ask on the terminal
    Ask,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file
    #[command(alias = "e")]
    Encrypt {
        /// Path to the text file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the encrypted text to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Decrypt a file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the file whose contents is to be decrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the unencrypted text to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Update an encrypted file with new content, while validating
    /// that the password is not accidentally changed.
    #[command(alias = "u")]
    Update {
        /// Path to the text file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the existing encrypted file to replace
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Re-encrypt a file under a new password
    #[command(alias = "r")]
    Rekey {
        /// Path to the encrypted file
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Read the new password from this file instead of the terminal
        #[arg(long, value_name = "FILE")]
        new_passphrase_file: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(Outcome::Done) => {}
        Ok(Outcome::Cancelled) => {
            eprintln!(
                "Not decrypted: file has no metadata header and legacy decryption was declined."
            );
            process::exit(EXIT_CANCELLED);
        }
        Err(e) => {
            eprintln!("Error: {}", e.chain_message());
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "notecrypt=debug" } else { "notecrypt=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<Outcome> {
    let params = CodecParams {
        salt: cli.salt,
        fallback_salt: cli.fallback_salt,
        hash_algorithm: cli.hash_algorithm,
        iterations: cli.iterations,
        key_size: KeySize::from_bits(cli.key_size)?,
    };
    let mut prompt = get_legacy_prompt(cli.legacy);

    match cli.command {
        Commands::Encrypt { input, output } => {
            let mut reader = get_passphrase_reader(cli.passphrase_stdin);
            file_ops::encrypt_file(&input, &output, &mut *reader, &params)
        }
        Commands::Decrypt { input, output } => {
            let mut reader = get_passphrase_reader(cli.passphrase_stdin);
            file_ops::decrypt_file(&input, &output, &mut *reader, &params, &mut *prompt)
        }
        Commands::Update { input, output } => {
            let mut reader = get_passphrase_reader(cli.passphrase_stdin);
            file_ops::update_file(&input, &output, &mut *reader, &params, &mut *prompt)
        }
        Commands::Rekey {
            input,
            new_passphrase_file,
        } => {
            let mut old_reader = get_passphrase_reader(cli.passphrase_stdin);
            let mut new_reader = get_new_passphrase_reader(new_passphrase_file.as_deref())?;
            file_ops::rekey_file(
                &input,
                &mut *old_reader,
                &mut *new_reader,
                &params,
                &mut *prompt,
            )
        }
    }
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader::new())
    }
}

fn get_new_passphrase_reader(path: Option<&Path>) -> Result<Box<dyn PassphraseReader>> {
    match path {
        Some(path) => {
            let file = std::fs::File::open(path).map_err(|e| {
                NotecryptError::with_kind_and_source(
                    notecrypt::ErrorCategory::User,
                    notecrypt::ErrorKind::Io,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;
            Ok(Box::new(ReaderPassphraseReader::new(Box::new(file))))
        }
        None => Ok(Box::new(TerminalPassphraseReader::with_prompt(
            "New password (notecrypt): ",
        ))),
    }
}

fn get_legacy_prompt(mode: LegacyMode) -> Box<dyn LegacyPrompt> {
    match mode {
        LegacyMode::Yes => Box::new(AlwaysAccept),
        LegacyMode::No => Box::new(AlwaysDecline),
        LegacyMode::Ask => Box::new(TerminalPrompt::new()),
    }
}
