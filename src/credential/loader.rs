//! Private key loading with format probing

use super::envelope::{KeyEnvelope, KeyFormat};
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// A client key ready to authenticate with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    /// Key file on disk
    pub path: PathBuf,
    /// Format the key parsed as
    pub format: KeyFormat,
}

/// Outcome of probing one format
enum Probe {
    Parsed,
    PassphraseRequired,
    Mismatch(String),
}

/// Loads client keys, trying each supported format in priority order
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialLoader;

impl CredentialLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self
    }

    /// Load the key at `path`.
    ///
    /// Never fails past this boundary: every problem is logged and reported
    /// as `None`.
    pub fn load(&self, path: &Path) -> Option<Credential> {
        info!(path = %path.display(), "Loading private key");

        if !path.exists() {
            error!(path = %path.display(), "Key file not found");
            return None;
        }

        match self.try_load(path) {
            Ok(credential) => {
                info!("{} key loaded", credential.format);
                Some(credential)
            }
            Err(e) => {
                debug!("{e}");
                if is_putty_file(path) {
                    error!(".ppk file detected; PuTTY keys are not supported");
                    error!("Convert the key with PuTTYgen:");
                    error!("  1. Open PuTTYgen");
                    error!("  2. Load the .ppk file");
                    error!("  3. Conversions > Export OpenSSH key");
                    error!("  4. Save it without the .ppk extension (e.g. id_ce)");
                } else {
                    error!(
                        "Unrecognised key format or invalid key: {}",
                        path.display()
                    );
                    error!("Make sure the key is in OpenSSH format");
                }
                None
            }
        }
    }

    /// Load the key at `path`, returning the reason on failure
    pub fn try_load(&self, path: &Path) -> Result<Credential> {
        if !path.exists() {
            return Err(Error::credential(path, "file not found"));
        }

        let bytes = std::fs::read(path).map_err(|e| Error::credential(path, e.to_string()))?;
        let contents = String::from_utf8_lossy(&bytes);
        let envelope = KeyEnvelope::inspect(&contents);

        for format in KeyFormat::PRIORITY {
            match probe(format, &envelope) {
                Probe::Parsed => {
                    return Ok(Credential {
                        path: path.to_path_buf(),
                        format,
                    })
                }
                Probe::PassphraseRequired => {
                    error!("{format} key requires a passphrase (not supported)");
                }
                Probe::Mismatch(reason) => {
                    debug!("{format} attempt failed: {reason}");
                }
            }
        }

        Err(Error::credential(path, "no supported key format could be parsed"))
    }
}

fn probe(format: KeyFormat, envelope: &std::result::Result<KeyEnvelope, String>) -> Probe {
    match envelope {
        Err(reason) => Probe::Mismatch(reason.clone()),
        Ok(env) if env.format == Some(format) && env.encrypted => Probe::PassphraseRequired,
        Ok(env) if env.format == Some(format) => Probe::Parsed,
        Ok(env) => Probe::Mismatch(format!("key algorithm is '{}'", env.algorithm)),
    }
}

fn is_putty_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("ppk"))
}
