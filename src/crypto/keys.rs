/// Signing-key acquisition.
///
/// The anchoring key is either supplied inline (config or job input) or
/// read from a single designated file. It is acquired only for the
/// duration of one signing call and zeroized when the guard drops, on
/// success and failure paths alike. This module never writes a key.
use std::path::{Path, PathBuf};

use alloy::signers::local::PrivateKeySigner;

use super::sensitive::SensitiveString;
use crate::error::{AnchorError, Result};

/// Default location of the anchoring key file.
pub const DEFAULT_KEY_PATH: &str = "/app/temp/keyring/eth_private_key";

/// Where the private key comes from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Hex-encoded key held in memory.
    Inline(SensitiveString),
    /// Path to a file whose (trimmed) contents are the hex-encoded key.
    File(PathBuf),
}

impl KeySource {
    /// Prefer the inline key when one is supplied, else fall back to `path`.
    pub fn inline_or_file(inline: Option<SensitiveString>, path: impl Into<PathBuf>) -> Self {
        match inline {
            Some(key) if !key.is_empty() => KeySource::Inline(key),
            _ => KeySource::File(path.into()),
        }
    }

    /// Acquire the key material. Release happens when the guard drops.
    pub fn acquire(&self) -> Result<KeyGuard> {
        let secret = match self {
            KeySource::Inline(key) => key.clone(),
            KeySource::File(path) => read_key_file(path)?,
        };
        if secret.is_empty() {
            return Err(AnchorError::Signing("private key is empty".into()));
        }
        Ok(KeyGuard { secret })
    }
}

/// Scoped hold on private key text.
pub struct KeyGuard {
    secret: SensitiveString,
}

impl KeyGuard {
    /// Parse the held key into a local signer.
    pub fn signer(&self) -> Result<PrivateKeySigner> {
        self.secret
            .expose()
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|e| AnchorError::Signing(format!("invalid private key: {e}")))
    }
}

fn read_key_file(path: &Path) -> Result<SensitiveString> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AnchorError::Signing(format!(
            "could not read private key from {}: {e}",
            path.display()
        ))
    })?;
    let key = SensitiveString::new(contents.trim().to_string());
    drop(SensitiveString::new(contents));
    Ok(key)
}
