//! Transfer module
//!
//! Authenticated remote file sessions.
//!
//! # Overview
//!
//! - `RemoteFs` - the operations the pipeline needs from an open session
//! - `Connector` - opens sessions, collapsing every failure to `None`
//! - `SftpConnector` / `SftpSession` - SSH file transfer over `ssh2`

#[cfg(test)]
mod memory;
mod sftp;

#[cfg(test)]
pub(crate) use memory::MemoryFs;
pub use sftp::{SftpConnector, SftpSession};

use crate::credential::Credential;
use crate::error::Result;
use crate::types::{HostTarget, DEFAULT_SFTP_PORT};
use std::path::Path;
use tracing::{error, info};

/// Where to connect and as whom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Login user
    pub user: String,
}

impl Endpoint {
    /// Endpoint on the standard port
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SFTP_PORT,
            user: user.into(),
        }
    }

    /// Override the port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl From<&HostTarget> for Endpoint {
    fn from(host: &HostTarget) -> Self {
        Self {
            host: host.address.clone(),
            port: host.port,
            user: host.user.clone(),
        }
    }
}

/// How the client proves its identity
#[derive(Debug, Clone)]
pub enum ClientAuth {
    /// Private key loaded by the credential loader
    Key(Credential),
    /// Plaintext password
    Password(String),
}

/// File operations on an open remote session
pub trait RemoteFs {
    /// Names (not paths) of the entries in `dir`
    fn list_dir(&mut self, dir: &str) -> Result<Vec<String>>;

    /// Copy the remote file to `local`. On error no partial file is left.
    fn fetch(&mut self, remote: &str, local: &Path) -> Result<()>;

    /// Release the session. Must be safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

/// Opens remote sessions
pub trait Connector {
    /// Open a session, or `None` when the host cannot be reached or rejects
    /// the client. The reason is logged by the implementation.
    fn open(&self, endpoint: &Endpoint, auth: &ClientAuth) -> Option<Box<dyn RemoteFs>>;
}

/// Close a session if there is one. Errors are logged and swallowed.
pub fn close_session(session: Option<Box<dyn RemoteFs>>) {
    let Some(mut session) = session else {
        return;
    };

    match session.close() {
        Ok(()) => info!("SFTP session closed"),
        Err(e) => error!("Error closing SFTP session: {e}"),
    }
}
