//! File encryption/decryption operations
//!
//! High-level operations over `.cnp` files: the file holds the base64 text
//! produced by [`codec::encrypt`], nothing else.

use crate::codec::{self, Decrypted, Format};
use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use crate::params::CodecParams;
use crate::passphrase::PassphraseReader;
use crate::prompt::LegacyPrompt;
use crate::session::Session;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, warn};

/// How a file operation ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The input had no metadata header and the legacy path was declined.
    /// Nothing was written.
    Cancelled,
}

/// Encrypt a text file with a password
///
/// Reads UTF-8 plaintext from `input_path`, encrypts it using a password from
/// `passphrase_reader`, and writes the base64 ciphertext to `output_path`.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
    params: &CodecParams,
) -> Result<Outcome> {
    let plaintext = read_text(input_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let ciphertext = codec::encrypt(&plaintext, &passphrase, params)
        .map_err(|e| e.with_context("encryption failed"))?;
    write_file_secure(output_path, ciphertext.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    debug!(
        input = %input_path.display(),
        output = %output_path.display(),
        hash = %params.hash_algorithm,
        iterations = params.iterations,
        key_bits = params.key_size.bits(),
        "encrypted file"
    );
    Ok(Outcome::Done)
}

/// Decrypt a file with a password
///
/// Reads base64 ciphertext from `input_path`, decrypts it using a password
/// from `passphrase_reader`, and writes the plaintext to `output_path`. An
/// empty input file decrypts to an empty output file. Headerless input is
/// decrypted the legacy way only if `prompt` agrees.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn decrypt_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
    params: &CodecParams,
    prompt: &mut dyn LegacyPrompt,
) -> Result<Outcome> {
    let ciphertext = read_text(input_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let decrypted = codec::decrypt(&ciphertext, &passphrase, params, prompt)
        .map_err(|e| e.with_context("failed to decrypt"))?;

    let plaintext = match decrypted {
        Decrypted::Text { plaintext, format } => {
            log_format(input_path, format);
            plaintext
        }
        Decrypted::Empty => String::new(),
        Decrypted::Cancelled => {
            debug!(input = %input_path.display(), "legacy decryption declined");
            return Ok(Outcome::Cancelled);
        }
    };

    write_file_secure(output_path, plaintext.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    debug!(
        input = %input_path.display(),
        output = %output_path.display(),
        "decrypted file"
    );
    Ok(Outcome::Done)
}

/// Update an encrypted file with new plaintext using the same password
///
/// This function:
/// 1. Decrypts the existing file at `crypt_path` to validate the password
/// 2. Reads new plaintext from `plain_path`
/// 3. Encrypts the new plaintext with the validated password
/// 4. Atomically writes to `crypt_path` (tempfile + fsync + rename)
///
/// The password validation prevents accidental password changes. A legacy
/// file that is accepted and validated is rewritten in the current format.
pub fn update_file(
    plain_path: &Path,
    crypt_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
    params: &CodecParams,
    prompt: &mut dyn LegacyPrompt,
) -> Result<Outcome> {
    let passphrase = passphrase_reader.read_passphrase()?;
    let (session, existing) = Session::open(crypt_path, passphrase, params.clone(), prompt)?;
    match existing {
        Decrypted::Text { format, .. } => log_format(crypt_path, format),
        Decrypted::Empty => debug!(
            crypt = %crypt_path.display(),
            "existing file is empty; nothing to validate the password against"
        ),
        Decrypted::Cancelled => return Ok(Outcome::Cancelled),
    }

    let new_plaintext = read_text(plain_path)?;
    session.save(&new_plaintext)?;
    debug!(crypt = %crypt_path.display(), "updated file");
    Ok(Outcome::Done)
}

/// Re-encrypt an encrypted file under a new password
///
/// The file is decrypted with the password from `old_reader`, then atomically
/// replaced by the same plaintext encrypted with the password from
/// `new_reader`.
pub fn rekey_file(
    crypt_path: &Path,
    old_reader: &mut dyn PassphraseReader,
    new_reader: &mut dyn PassphraseReader,
    params: &CodecParams,
    prompt: &mut dyn LegacyPrompt,
) -> Result<Outcome> {
    let old_passphrase = old_reader.read_passphrase()?;
    let (mut session, existing) =
        Session::open(crypt_path, old_passphrase, params.clone(), prompt)?;
    let plaintext = match existing {
        Decrypted::Text { plaintext, format } => {
            log_format(crypt_path, format);
            plaintext
        }
        Decrypted::Empty => String::new(),
        Decrypted::Cancelled => return Ok(Outcome::Cancelled),
    };

    session.change_password(new_reader.read_passphrase()?);
    session.save(&plaintext)?;
    debug!(crypt = %crypt_path.display(), "changed password");
    Ok(Outcome::Done)
}

fn log_format(path: &Path, format: Format) {
    if format == Format::Legacy {
        warn!(
            file = %path.display(),
            "file has no metadata header; decrypted with the legacy fixed IV"
        );
    }
}

/// Read a whole file as UTF-8 text.
pub(crate) fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    String::from_utf8(bytes).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} is not valid UTF-8", path.display()),
            e,
        )
    })
}

/// Atomically replace `path` with `contents` (tempfile + fsync + rename).
///
/// Either the old file or the new file exists afterwards, never a partial
/// one. The new file has mode 0o600 on Unix systems.
pub(crate) fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| {
                NotecryptError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to get tempfile metadata",
                    e,
                )
            })?
            .permissions();
        perms.set_mode(0o600);
        temp_file.as_file().set_permissions(perms).map_err(|e| {
            NotecryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to set tempfile permissions",
                e,
            )
        })?;
    }
    temp_file.persist(path).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                NotecryptError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents).map_err(|e| {
            NotecryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            NotecryptError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn read_error(path: &Path, err: io::Error) -> NotecryptError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    NotecryptError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
