//! Configuration for extraction, reconciliation and loading
//!
//! Every value is read once from the environment (with fallbacks) into an
//! immutable config struct that is passed by reference to the components.
//! `from_lookup` takes any key lookup so tests never touch the process
//! environment.

use crate::error::{Error, Result};
use crate::types::{HostTarget, MatchMode, RemoteFileSet, SelectionRule, DEFAULT_SFTP_PORT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Key/value source for configuration
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Columns every reconciled reading-effectiveness row carries
pub const EXPECTED_COLUMNS: [&str; 21] = [
    "CO",
    "REFERENCIA",
    "NUMERO_CLIENTE",
    "MATRICULA_LEITURISTA",
    "SECTOR",
    "LOCALIDADE",
    "ZONA",
    "MUNICIPIO",
    "BAIRRO",
    "IRREG_LIDA",
    "IRREG_OPERADOR",
    "NUMERO_MEDIDOR",
    "DESC_IRREG_LIDA",
    "DESC_IRREG_OPERADOR",
    "DX",
    "TELEMEDIDO",
    "UNIDADE_LEITURA",
    "CODIGO_MUNICIPIO",
    "FAT_BIMESTRAL",
    "LATITUDE",
    "LONGITUDE",
];

/// Daily batch files fetched from every host
pub const DEFAULT_REMOTE_FILES: [&str; 3] = [
    "COELCE_elaazisysd00_grandesclientes.txt.zip",
    "COELCE_elaazisysd00_maecartas.txt.zip",
    "COELCE_elaazisysd00_ordemfilhas.txt.zip",
];

fn env_or(lookup: Lookup<'_>, name: &str, default: &str) -> String {
    lookup(name).unwrap_or_else(|| default.to_string())
}

fn parse_or<T: FromStr>(lookup: Lookup<'_>, name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::invalid_value(name, format!("'{raw}': {e}"))),
        None => Ok(default),
    }
}

fn flag_or(lookup: Lookup<'_>, name: &str, default: bool) -> Result<bool> {
    match lookup(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(Error::invalid_value(name, format!("'{other}' is not a boolean"))),
        },
        None => Ok(default),
    }
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

// ============================================================================
// Network Gate
// ============================================================================

/// VPN gate settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Whether the gate is required before touching any host
    pub enabled: bool,
    /// VPN portal (informational, shown to the operator)
    pub portal: String,
    /// Connection manager executable
    pub manager_path: PathBuf,
    /// Adapter name that appears in the routing table when connected
    pub adapter_name: String,
    /// Delay between link probes
    pub poll_interval: Duration,
    /// Maximum number of probes after launching the manager
    pub max_polls: u32,
    /// Log a progress line every this many probes
    pub progress_every: u32,
    /// Time allowed for the disconnect command
    pub disconnect_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            portal: "vpn.enel.com".to_string(),
            manager_path: PathBuf::from(
                r"C:\Program Files\Palo Alto Networks\GlobalProtect\PanGPA.exe",
            ),
            adapter_name: "PANGP Virtual Ethernet Adapter".to_string(),
            poll_interval: Duration::from_secs(5),
            max_polls: 36,
            progress_every: 6,
            disconnect_timeout: Duration::from_secs(30),
        }
    }
}

impl GateConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&process_env)
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            enabled: flag_or(lookup, "ENEL_VPN_ENABLED", defaults.enabled)?,
            portal: env_or(lookup, "ENEL_VPN_PORTAL", &defaults.portal),
            manager_path: lookup("ENEL_GLOBALPROTECT_PATH")
                .map_or(defaults.manager_path, PathBuf::from),
            adapter_name: env_or(lookup, "ENEL_VPN_ADAPTER", &defaults.adapter_name),
            poll_interval: Duration::from_secs(parse_or(lookup, "ENEL_VPN_POLL_SECS", 5u64)?),
            max_polls: parse_or(lookup, "ENEL_VPN_MAX_POLLS", defaults.max_polls)?,
            progress_every: defaults.progress_every,
            disconnect_timeout: Duration::from_secs(parse_or(
                lookup,
                "ENEL_VPN_DISCONNECT_TIMEOUT_SECS",
                30u64,
            )?),
        })
    }

    /// Total time the gate waits after launching the manager
    pub fn max_wait(&self) -> Duration {
        self.poll_interval * self.max_polls
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Key-authenticated extraction across the configured hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// VPN gate
    pub gate: GateConfig,
    /// Directory holding the per-host key folders
    pub keys_base_path: PathBuf,
    /// Hosts visited in order
    pub hosts: Vec<HostTarget>,
    /// Remote directory holding the batch files
    pub remote_path: String,
    /// Exact file names fetched from each host
    pub files: Vec<String>,
    /// Local root for downloads
    pub download_base_dir: PathBuf,
}

impl ExtractorConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&process_env)
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let keys_base_path = PathBuf::from(env_or(
            lookup,
            "ENEL_KEYS_BASE_PATH",
            r"\\10.71.201.243\mis$\DADOS OPERACOES\ENEL\INDUSTRIA ON DEMAND\CHAVES",
        ));

        let mut hosts = vec![HostTarget::new(
            env_or(lookup, "ENEL_HOST_CE", "10.154.78.75"),
            env_or(lookup, "ENEL_HOST_CE_USER", "sftpce"),
            "HOST_CE",
            keys_base_path.join("CE").join("id_rsa_22052020_204527"),
        )];

        // The RJ host is only visited when explicitly configured
        if let Some(address) = lookup("ENEL_HOST_RJ") {
            hosts.push(HostTarget::new(
                address,
                env_or(lookup, "ENEL_HOST_RJ_USER", "sftprj"),
                "HOST_RJ",
                keys_base_path.join("RJ").join("id_rj"),
            ));
        }

        let files = match lookup("ENEL_REMOTE_FILES") {
            Some(raw) => {
                let files: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                if files.is_empty() {
                    return Err(Error::invalid_value("ENEL_REMOTE_FILES", "no file names"));
                }
                crate::download::unique_names(&files)
            }
            None => DEFAULT_REMOTE_FILES.iter().map(ToString::to_string).collect(),
        };

        Ok(Self {
            gate: GateConfig::from_lookup(lookup)?,
            keys_base_path,
            hosts,
            remote_path: env_or(
                lookup,
                "ENEL_REMOTE_PATH",
                "/synergia/archivos/batch/lst/diarios/",
            ),
            files,
            download_base_dir: PathBuf::from(env_or(
                lookup,
                "ENEL_DOWNLOAD_BASE_DIR",
                "./archives",
            )),
        })
    }

    /// The explicit file set requested from every host
    pub fn file_set(&self) -> RemoteFileSet {
        RemoteFileSet::Explicit(self.files.clone())
    }
}

// ============================================================================
// Relational Sink
// ============================================================================

/// Database the reconciled table is loaded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkEngine {
    /// Native DuckDB database file
    #[default]
    Duckdb,
    /// PostgreSQL attached through DuckDB
    Postgres,
    /// MySQL attached through DuckDB
    Mysql,
    /// SQLite attached through DuckDB
    Sqlite,
}

impl FromStr for SinkEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "duckdb" => Ok(Self::Duckdb),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::invalid_value(
                "ENEL_SINK_ENGINE",
                format!("unknown engine '{other}'"),
            )),
        }
    }
}

/// Connection settings for the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Engine type
    pub engine: SinkEngine,
    /// Host (network engines only)
    pub host: String,
    /// Port (network engines only, engine default when absent)
    pub port: Option<u16>,
    /// User (network engines only)
    pub user: String,
    /// Password (network engines only)
    pub password: String,
    /// Database name, or file path for file engines (`:memory:` allowed)
    pub database: String,
    /// Destination table
    pub table: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            engine: SinkEngine::Duckdb,
            host: "localhost".to_string(),
            port: None,
            user: String::new(),
            password: String::new(),
            database: "./enel.duckdb".to_string(),
            table: "EfetividadeLeitura".to_string(),
        }
    }
}

impl SinkConfig {
    /// Load from an arbitrary key lookup
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        let engine = match lookup("ENEL_SINK_ENGINE") {
            Some(raw) => raw.parse()?,
            None => defaults.engine,
        };
        let port = match lookup("ENEL_SINK_PORT") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u16>()
                    .map_err(|e| Error::invalid_value("ENEL_SINK_PORT", format!("'{raw}': {e}")))?,
            ),
            None => None,
        };

        Ok(Self {
            engine,
            host: env_or(lookup, "ENEL_SINK_HOST", &defaults.host),
            port,
            user: env_or(lookup, "ENEL_SINK_USER", &defaults.user),
            password: env_or(lookup, "ENEL_SINK_PASSWORD", &defaults.password),
            database: env_or(lookup, "ENEL_SINK_DATABASE", &defaults.database),
            table: env_or(lookup, "ENEL_SINK_TABLE", &defaults.table),
        })
    }
}

// ============================================================================
// ETL
// ============================================================================

/// Reconcile-and-load settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtlConfig {
    /// Directory scanned recursively for `.txt` files
    pub source_dir: PathBuf,
    /// Output columns, in order (provenance column is appended)
    pub expected_columns: Vec<String>,
    /// Destination
    pub sink: SinkConfig,
}

impl EtlConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&process_env)
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Self {
            source_dir: PathBuf::from(env_or(
                lookup,
                "ENEL_EFETIVIDADE_DIR",
                "./archives/EfetividadeLeitura - Copia",
            )),
            expected_columns: EXPECTED_COLUMNS.iter().map(ToString::to_string).collect(),
            sink: SinkConfig::from_lookup(lookup)?,
        })
    }
}

// ============================================================================
// Password-Authenticated Pulls
// ============================================================================

/// Ad-hoc password-authenticated pull of files picked by prefix and month
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordSftpConfig {
    /// Server address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Remote directory listed for candidates
    pub remote_path: String,
    /// Required file prefix
    pub file_prefix: String,
    /// Required month token
    pub file_month: String,
    /// Local directory for downloads
    pub download_base_dir: PathBuf,
}

impl PasswordSftpConfig {
    /// Load from the process environment for the given mode
    pub fn from_env(mode: MatchMode) -> Result<Self> {
        Self::from_lookup(&process_env, mode)
    }

    /// Load from an arbitrary key lookup.
    ///
    /// The two modes differ only in their month and download fallbacks.
    pub fn from_lookup(lookup: Lookup<'_>, mode: MatchMode) -> Result<Self> {
        let (month, download_dir) = match mode {
            MatchMode::Substring => ("202602", "./archives"),
            MatchMode::Regex => ("202601", "./archives/EfetividadeLeitura"),
        };

        Ok(Self {
            host: env_or(lookup, "ENEL_TEST_SFTP_HOST", "10.152.153.33"),
            port: parse_or(lookup, "ENEL_TEST_SFTP_PORT", DEFAULT_SFTP_PORT)?,
            username: env_or(lookup, "ENEL_TEST_SFTP_USER", "EXPLOTACAO"),
            password: env_or(lookup, "ENEL_TEST_SFTP_PASSWORD", ""),
            remote_path: env_or(
                lookup,
                "ENEL_TEST_SFTP_REMOTE_PATH",
                "/D:/LOGS/Coelce/ExtratorEfetividadeLeitura",
            ),
            file_prefix: env_or(lookup, "ENEL_TEST_FILE_PREFIX", "BaseMes"),
            file_month: env_or(lookup, "ENEL_TEST_FILE_MONTH", month),
            download_base_dir: PathBuf::from(env_or(
                lookup,
                "ENEL_TEST_DOWNLOAD_BASE_DIR",
                download_dir,
            )),
        })
    }

    /// Apply command-line overrides, keeping configured values for `None`
    #[must_use]
    pub fn with_overrides(
        mut self,
        file_month: Option<String>,
        file_prefix: Option<String>,
        download_dir: Option<PathBuf>,
        remote_path: Option<String>,
    ) -> Self {
        if let Some(month) = file_month {
            self.file_month = month;
        }
        if let Some(prefix) = file_prefix {
            self.file_prefix = prefix;
        }
        if let Some(dir) = download_dir {
            self.download_base_dir = dir;
        }
        if let Some(path) = remote_path {
            self.remote_path = path;
        }
        self
    }

    /// Selection rule for the given mode
    pub fn rule(&self, mode: MatchMode) -> SelectionRule {
        SelectionRule::new(self.file_prefix.clone(), self.file_month.clone(), mode)
    }
}
