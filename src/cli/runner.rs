//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat, PullArgs};
use crate::config::{EtlConfig, ExtractorConfig, PasswordSftpConfig};
use crate::error::{Error, Result};
use crate::gate::NetworkGate;
use crate::pipeline::{run_etl, run_extraction, run_password_pull, EtlOutcome};
use crate::processing::{ordens_filhas, DEFAULT_INPUT};
use crate::sink::DuckDbSink;
use crate::transfer::SftpConnector;
use crate::types::{MatchMode, TransferOutcome};
use arrow::util::pretty::pretty_format_batches;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Instant;

/// Rows shown by `ordens-filhas`
const PREVIEW_ROWS: usize = 5;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Extract => self.extract(),
            Commands::Etl => self.etl(),
            Commands::OrdensFilhas { arquivo } => self.ordens_filhas(arquivo.clone()),
            Commands::TestSftp(args) => self.pull(MatchMode::Substring, args),
            Commands::TestSftpRegex(args) => self.pull(MatchMode::Regex, args),
        }
    }

    fn extract(&self) -> Result<()> {
        let started = Instant::now();
        let config = ExtractorConfig::from_env()?;
        let gate = config
            .gate
            .enabled
            .then(|| NetworkGate::global_protect(config.gate.clone()));
        let connector = SftpConnector::new();

        let report = run_extraction(&config, gate.as_ref(), &connector)?;

        for outcome in &report.outcomes {
            self.output_host(outcome);
        }
        self.output_message(&json!({
            "type": "SUMMARY",
            "hosts": report.outcomes.len(),
            "unreachable": report.unreachable_hosts().count(),
            "downloaded": report.total_downloaded(),
            "failed": report.total_failed(),
            "duration_ms": started.elapsed().as_millis() as u64,
        }));
        Ok(())
    }

    fn etl(&self) -> Result<()> {
        let config = EtlConfig::from_env()?;
        let mut sink = DuckDbSink::connect(&config.sink)?;

        let outcome = run_etl(&config, &mut sink)?;
        let mut message =
            serde_json::to_value(&outcome).map_err(|e| Error::Other(e.to_string()))?;
        if let Value::Object(map) = &mut message {
            map.insert("type".to_string(), json!("ETL"));
        }
        self.output_message(&message);

        if outcome == EtlOutcome::NothingToLoad {
            eprintln!("No data to load from {}", config.source_dir.display());
        }
        Ok(())
    }

    fn ordens_filhas(&self, arquivo: Option<PathBuf>) -> Result<()> {
        let path = arquivo.unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT));
        let batch = ordens_filhas::process_ordens_filhas(&path)?;

        match self.cli.format {
            OutputFormat::Pretty => {
                let preview = batch.slice(0, batch.num_rows().min(PREVIEW_ROWS));
                println!("{}", pretty_format_batches(&[preview])?);
                println!("Total rows: {}", batch.num_rows());
            }
            OutputFormat::Json => self.output_message(&json!({
                "type": "ORDENS_FILHAS",
                "path": path.display().to_string(),
                "rows": batch.num_rows(),
                "columns": batch
                    .schema()
                    .fields()
                    .iter()
                    .map(|f| f.name().clone())
                    .collect::<Vec<_>>(),
            })),
        }
        Ok(())
    }

    fn pull(&self, mode: MatchMode, args: &PullArgs) -> Result<()> {
        let config = PasswordSftpConfig::from_env(mode)?.with_overrides(
            args.file_month.clone(),
            args.file_prefix.clone(),
            args.download_dir.clone(),
            args.remote_path.clone(),
        );

        let outcome = run_password_pull(&config, mode, &SftpConnector::new());
        self.output_host(&outcome);
        Ok(())
    }

    fn output_host(&self, outcome: &TransferOutcome) {
        let mut message = serde_json::to_value(outcome).unwrap_or_default();
        if let Value::Object(map) = &mut message {
            map.insert("type".to_string(), json!("HOST_RESULT"));
            map.insert("status".to_string(), json!(outcome.status()));
        }
        self.output_message(&message);
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
