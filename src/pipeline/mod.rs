//! Run orchestration
//!
//! Ties the components together for each entry point:
//!
//! - `run_extraction` - gate, then every configured host in turn, then teardown
//! - `run_password_pull` - one password-authenticated host with a selection rule
//! - `run_etl` - reconcile downloaded files and load them into the sink
//!
//! Host-level failures end up in the host's [`TransferOutcome`]; only the
//! gate and a missing source directory stop a run.

use crate::config::{EtlConfig, ExtractorConfig, PasswordSftpConfig};
use crate::credential::CredentialLoader;
use crate::download::{download_all, unique_names};
use crate::error::{Error, Result};
use crate::gate::NetworkGate;
use crate::reconcile::SchemaReconciler;
use crate::select::FileSelector;
use crate::sink::{load_table, TableSink};
use crate::transfer::{close_session, ClientAuth, Connector, Endpoint, RemoteFs};
use crate::types::{ExtractionReport, HostTarget, MatchMode, RemoteFileSet, TransferOutcome};
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

const BANNER: &str = "============================================================";

/// Names reported as failed when a host cannot be processed at all
fn requested_names(set: &RemoteFileSet) -> Vec<String> {
    match set {
        RemoteFileSet::Explicit(names) => unique_names(names),
        RemoteFileSet::Rule(_) => Vec::new(),
    }
}

/// Select and fetch on an open session
fn transfer_files(
    session: &mut dyn RemoteFs,
    host: &HostTarget,
    remote_dir: &str,
    set: &RemoteFileSet,
    local_dir: &Path,
) -> TransferOutcome {
    let targets = match FileSelector::new().select_checked(session, remote_dir, set) {
        Ok(targets) => targets,
        Err(e) => {
            error!(host = %host.display_name, "Error listing remote files: {e}");
            return TransferOutcome::unreachable(host, Vec::new(), e.to_string());
        }
    };

    if targets.is_empty() {
        warn!(host = %host.display_name, "No files matched in {remote_dir}");
        return TransferOutcome::completed(host, Vec::new(), Vec::new());
    }

    match download_all(session, remote_dir, &targets, local_dir) {
        Ok(report) => TransferOutcome::completed(host, report.downloaded, report.failed),
        Err(e) => {
            error!(
                host = %host.display_name,
                "Cannot prepare {}: {e}",
                local_dir.display()
            );
            TransferOutcome::completed(host, Vec::new(), targets)
        }
    }
}

/// Open a session, transfer, and close the session on every path
fn with_session(
    connector: &dyn Connector,
    host: &HostTarget,
    auth: &ClientAuth,
    remote_dir: &str,
    set: &RemoteFileSet,
    local_dir: &Path,
) -> TransferOutcome {
    let Some(mut session) = connector.open(&Endpoint::from(host), auth) else {
        return TransferOutcome::unreachable(
            host,
            requested_names(set),
            format!("could not open session to {}", host.address),
        );
    };

    let outcome = transfer_files(session.as_mut(), host, remote_dir, set, local_dir);
    close_session(Some(session));
    outcome
}

fn log_host_summary(outcome: &TransferOutcome) {
    info!(
        "{} - Downloaded: {}, Failed: {}",
        outcome.host,
        outcome.downloaded.len(),
        outcome.failed.len()
    );
    for name in &outcome.failed {
        warn!("  failed: {name}");
    }
}

/// Fetch the configured files from one key-authenticated host
pub fn process_host(
    config: &ExtractorConfig,
    host: &HostTarget,
    connector: &dyn Connector,
) -> TransferOutcome {
    info!("{BANNER}");
    info!("Processing {} ({})", host.display_name, host.address);
    info!("{BANNER}");

    let set = config.file_set();
    let outcome = match CredentialLoader::new().load(&host.credential_path) {
        Some(credential) => with_session(
            connector,
            host,
            &ClientAuth::Key(credential),
            &config.remote_path,
            &set,
            &host.local_dir(&config.download_base_dir),
        ),
        None => {
            error!(
                host = %host.display_name,
                "Could not load key {}",
                host.credential_path.display()
            );
            TransferOutcome::unreachable(
                host,
                requested_names(&set),
                format!("credential unreadable: {}", host.credential_path.display()),
            )
        }
    };

    log_host_summary(&outcome);
    outcome
}

/// Run the extraction across every configured host.
///
/// With a gate, the link must come up before any host is visited; teardown
/// runs whether or not it did.
pub fn run_extraction(
    config: &ExtractorConfig,
    gate: Option<&NetworkGate>,
    connector: &dyn Connector,
) -> Result<ExtractionReport> {
    info!("{BANNER}");
    info!("Starting ENEL SFTP extraction");
    info!("{BANNER}");

    if let Some(gate) = gate {
        if !gate.ensure_connected() {
            error!("Could not connect to the VPN, aborting extraction");
            gate.ensure_disconnected();
            return Err(Error::GateTimeout {
                waited_secs: gate.config().max_wait().as_secs(),
            });
        }
    }

    let report = ExtractionReport {
        outcomes: config
            .hosts
            .iter()
            .map(|host| process_host(config, host, connector))
            .collect(),
    };

    if let Some(gate) = gate {
        gate.ensure_disconnected();
    }

    info!("{BANNER}");
    info!("EXTRACTION SUMMARY");
    info!("{BANNER}");
    for outcome in &report.outcomes {
        info!(
            "{} ({}): {} | downloaded {} | failed {}",
            outcome.host,
            outcome.address,
            outcome.status(),
            outcome.downloaded.len(),
            outcome.failed.len()
        );
    }
    info!(
        "Total downloaded: {}, total failed: {}",
        report.total_downloaded(),
        report.total_failed()
    );

    Ok(report)
}

/// Password-authenticated pull of the files matching the configured
/// prefix and month
pub fn run_password_pull(
    config: &PasswordSftpConfig,
    mode: MatchMode,
    connector: &dyn Connector,
) -> TransferOutcome {
    let mut host = HostTarget::new(
        config.host.clone(),
        config.username.clone(),
        config.host.clone(),
        "",
    );
    host.port = config.port;

    info!(
        mode = ?mode,
        "Pulling '{}' files for month {} from {}:{}",
        config.file_prefix,
        config.file_month,
        config.host,
        config.remote_path
    );

    let outcome = with_session(
        connector,
        &host,
        &ClientAuth::Password(config.password.clone()),
        &config.remote_path,
        &RemoteFileSet::Rule(config.rule(mode)),
        &config.download_base_dir,
    );

    log_host_summary(&outcome);
    outcome
}

/// Result of a reconcile-and-load run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EtlOutcome {
    /// Rows were appended to `table`
    Loaded { table: String, rows: usize },
    /// No file was found or none could be parsed
    NothingToLoad,
}

/// Reconcile the source directory and load the result
pub fn run_etl(config: &EtlConfig, sink: &mut dyn TableSink) -> Result<EtlOutcome> {
    info!("Reconciling files under {}", config.source_dir.display());

    let Some(table) =
        SchemaReconciler::new().reconcile(&config.source_dir, &config.expected_columns)?
    else {
        warn!("No data to load");
        return Ok(EtlOutcome::NothingToLoad);
    };

    let rows = load_table(sink, &config.sink.table, table.batch())?;
    Ok(EtlOutcome::Loaded {
        table: config.sink.table.clone(),
        rows,
    })
}

#[cfg(test)]
mod tests;
