//! SFTP sessions over `ssh2`

use super::{ClientAuth, Connector, Endpoint, RemoteFs};
use crate::error::{Error, Result, TransferFailureKind};
use ssh2::{ErrorCode, Session, Sftp};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

/// libssh2 code for a rejected login
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
/// libssh2 code for a key the server did not accept
const LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED: i32 = -19;
/// SFTP status: no such file
const LIBSSH2_FX_NO_SUCH_FILE: i32 = 2;
/// SFTP status: permission denied
const LIBSSH2_FX_PERMISSION_DENIED: i32 = 3;

/// Classify an SFTP-level error for a single file
fn transfer_kind(err: &ssh2::Error) -> TransferFailureKind {
    match err.code() {
        ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_FILE) => TransferFailureKind::NotFound,
        ErrorCode::SFTP(LIBSSH2_FX_PERMISSION_DENIED) => TransferFailureKind::PermissionDenied,
        _ => TransferFailureKind::Other,
    }
}

fn is_auth_rejection(err: &ssh2::Error) -> bool {
    matches!(
        err.code(),
        ErrorCode::Session(LIBSSH2_ERROR_AUTHENTICATION_FAILED)
            | ErrorCode::Session(LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED)
    )
}

/// Stream `reader` into a freshly created `local` file, synced to disk
fn write_local(reader: &mut impl Read, local: &Path) -> std::io::Result<u64> {
    let mut out = BufWriter::new(File::create(local)?);
    let n = std::io::copy(reader, &mut out)?;
    out.flush()?;
    out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(n)
}

/// Opens SFTP sessions on port 22 (or the endpoint's port)
#[derive(Debug, Clone)]
pub struct SftpConnector {
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl Default for SftpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(120),
        }
    }
}

impl SftpConnector {
    /// Create a connector with default timeouts
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TCP connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Open a session, keeping the failure reason
    pub fn try_open(&self, endpoint: &Endpoint, auth: &ClientAuth) -> Result<SftpSession> {
        let host = endpoint.host.clone();
        let connection_error = |message: String| Error::Connection {
            host: host.clone(),
            message,
        };
        let protocol_error = |e: ssh2::Error| Error::Protocol {
            host: host.clone(),
            message: e.to_string(),
        };

        let addr = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| connection_error(e.to_string()))?
            .next()
            .ok_or_else(|| connection_error("address did not resolve".to_string()))?;

        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| connection_error(e.to_string()))?;

        let mut session = Session::new().map_err(protocol_error)?;
        session.set_timeout(self.io_timeout.as_millis() as u32);
        session.set_tcp_stream(tcp);
        session.handshake().map_err(protocol_error)?;

        let auth_result = match auth {
            ClientAuth::Key(credential) => {
                session.userauth_pubkey_file(&endpoint.user, None, &credential.path, None)
            }
            ClientAuth::Password(password) => session.userauth_password(&endpoint.user, password),
        };

        match auth_result {
            Err(e) if is_auth_rejection(&e) => {
                return Err(Error::AuthenticationRejected { host: host.clone() })
            }
            Err(e) => return Err(protocol_error(e)),
            Ok(()) if !session.authenticated() => {
                return Err(Error::AuthenticationRejected { host: host.clone() })
            }
            Ok(()) => {}
        }

        let sftp = session.sftp().map_err(protocol_error)?;

        Ok(SftpSession {
            host: endpoint.host.clone(),
            session,
            sftp: Some(sftp),
            closed: false,
        })
    }
}

impl Connector for SftpConnector {
    fn open(&self, endpoint: &Endpoint, auth: &ClientAuth) -> Option<Box<dyn RemoteFs>> {
        info!(
            "Connecting via SFTP to {} as {}",
            endpoint.host, endpoint.user
        );

        match self.try_open(endpoint, auth) {
            Ok(session) => {
                info!("SFTP session established with {}", endpoint.host);
                Some(Box::new(session))
            }
            Err(e @ Error::AuthenticationRejected { .. }) => {
                error!("Authentication failed: {e}");
                None
            }
            Err(e @ Error::Protocol { .. }) => {
                error!("SSH error: {e}");
                None
            }
            Err(e) => {
                error!("Error connecting via SFTP: {e}");
                None
            }
        }
    }
}

/// An open SFTP session to one host
pub struct SftpSession {
    host: String,
    session: Session,
    sftp: Option<Sftp>,
    closed: bool,
}

impl SftpSession {
    fn sftp(&self) -> Result<&Sftp> {
        self.sftp.as_ref().ok_or_else(|| Error::Protocol {
            host: self.host.clone(),
            message: "session already closed".to_string(),
        })
    }
}

impl RemoteFs for SftpSession {
    fn list_dir(&mut self, dir: &str) -> Result<Vec<String>> {
        let entries = self
            .sftp()?
            .readdir(Path::new(dir))
            .map_err(|e| Error::listing(dir, e.to_string()))?;

        Ok(entries
            .into_iter()
            .filter_map(|(path, _)| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .collect())
    }

    fn fetch(&mut self, remote: &str, local: &Path) -> Result<()> {
        let mut remote_file = self
            .sftp()?
            .open(Path::new(remote))
            .map_err(|e| Error::transfer(remote, transfer_kind(&e), e.to_string()))?;

        match write_local(&mut remote_file, local) {
            Ok(bytes) => {
                debug!(remote, bytes, "Fetched remote file");
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(local);
                let kind = match e.kind() {
                    std::io::ErrorKind::PermissionDenied => TransferFailureKind::PermissionDenied,
                    _ => TransferFailureKind::Other,
                };
                Err(Error::transfer(remote, kind, e.to_string()))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        drop(self.sftp.take());
        self.session
            .disconnect(None, "closing", None)
            .map_err(|e| Error::Protocol {
                host: self.host.clone(),
                message: e.to_string(),
            })
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!("Error closing SFTP session on drop: {e}");
        }
    }
}
