//! Confirmation strategies for the legacy decryption path
//!
//! Files written before the metadata header existed have no IV or salt
//! embedded. They can only be opened with a fixed, publicly known IV and a
//! salt from configuration, so the decrypt path asks first.

use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use std::io::{self, BufRead, BufReader, IsTerminal, Write};

const LEGACY_QUESTION: &str = "Unable to parse file metadata.\n\
Attempt to open it as a legacy file anyway? \
(May result in an incorrect key error if the salt is wrong.) [y/N]: ";

/// Decides whether a file without a header should be decrypted the legacy way.
pub trait LegacyPrompt {
    /// Returns `true` to proceed with the legacy IV and fallback salt,
    /// `false` to abandon the decryption.
    fn confirm_legacy(&mut self) -> Result<bool>;
}

/// Always proceeds with the legacy path.
pub struct AlwaysAccept;

impl LegacyPrompt for AlwaysAccept {
    fn confirm_legacy(&mut self) -> Result<bool> {
        Ok(true)
    }
}

/// Never proceeds; headerless input is treated as a cancelled decryption.
pub struct AlwaysDecline;

impl LegacyPrompt for AlwaysDecline {
    fn confirm_legacy(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// Asks on `output` and reads one line of answer from `input`.
///
/// Anything other than `y` or `yes` (case-insensitive) declines, including
/// end of input.
pub struct LinePrompt {
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
}

impl LinePrompt {
    pub fn new(input: Box<dyn BufRead>, output: Box<dyn Write>) -> Self {
        Self { input, output }
    }
}

impl LegacyPrompt for LinePrompt {
    fn confirm_legacy(&mut self) -> Result<bool> {
        self.output
            .write_all(LEGACY_QUESTION.as_bytes())
            .and_then(|_| self.output.flush())
            .map_err(|e| {
                NotecryptError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;

        let mut answer = String::new();
        self.input.read_line(&mut answer).map_err(|e| {
            NotecryptError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PromptUnavailable,
                format!("failure reading answer: {}", e),
                e,
            )
        })?;

        let answer = answer.trim();
        Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
    }
}

/// Asks on the terminal (stderr) and reads the answer from stdin.
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyPrompt for TerminalPrompt {
    fn confirm_legacy(&mut self) -> Result<bool> {
        if !io::stdin().is_terminal() {
            return Err(NotecryptError::with_kind(
                ErrorCategory::User,
                ErrorKind::PromptUnavailable,
                "file has no metadata header and stdin is not a terminal; \
                 pass --legacy yes or --legacy no",
            ));
        }

        LinePrompt::new(
            Box::new(BufReader::new(io::stdin())),
            Box::new(io::stderr()),
        )
        .confirm_legacy()
    }
}
