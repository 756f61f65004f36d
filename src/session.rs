//! Editing session: the open document and the password protecting it
//!
//! A front end holds one `Session` per open document and passes it to every
//! save, instead of keeping the password and file name in globals.

use crate::codec::{self, Decrypted};
use crate::error::Result;
use crate::file_ops::{read_text, write_file_atomic};
use crate::params::CodecParams;
use crate::prompt::LegacyPrompt;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

pub struct Session {
    path: PathBuf,
    password: Zeroizing<String>,
    params: CodecParams,
}

impl Session {
    /// A session for a document that has not been saved yet.
    pub fn new(path: impl Into<PathBuf>, password: Zeroizing<String>, params: CodecParams) -> Self {
        Self {
            path: path.into(),
            password,
            params,
        }
    }

    /// Read and decrypt an existing document.
    ///
    /// A wrong password is returned as an error and no session is created;
    /// the caller may ask again and retry. On `Decrypted::Cancelled` the
    /// session is still returned, but the caller should normally discard it.
    pub fn open(
        path: impl Into<PathBuf>,
        password: Zeroizing<String>,
        params: CodecParams,
        prompt: &mut dyn LegacyPrompt,
    ) -> Result<(Self, Decrypted)> {
        let session = Self::new(path, password, params);
        let text = read_text(&session.path)?;
        let decrypted = codec::decrypt(&text, &session.password, &session.params, prompt)
            .map_err(|e| e.with_context(format!("failed to open {}", session.path.display())))?;
        debug!(path = %session.path.display(), "opened document");
        Ok((session, decrypted))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn params(&self) -> &CodecParams {
        &self.params
    }

    /// Encrypt `plaintext` under the session password and atomically
    /// replace the document.
    pub fn save(&self, plaintext: &str) -> Result<()> {
        let ciphertext = codec::encrypt(plaintext, &self.password, &self.params)
            .map_err(|e| e.with_context("encryption failed"))?;
        write_file_atomic(&self.path, ciphertext.as_bytes())
            .map_err(|e| e.with_context(format!("failed to write to {}", self.path.display())))?;
        debug!(path = %self.path.display(), "saved document");
        Ok(())
    }

    /// Save to a new location, which becomes the session's document.
    pub fn save_as(&mut self, path: impl Into<PathBuf>, plaintext: &str) -> Result<()> {
        self.path = path.into();
        self.save(plaintext)
    }

    /// Use `password` for every later save. The document on disk is not
    /// touched until the next save.
    pub fn change_password(&mut self, password: Zeroizing<String>) {
        self.password = password;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.path)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
