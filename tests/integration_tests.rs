//! Integration tests for the extractor
//!
//! Run the whole flow against an in-memory remote: extraction into a
//! scratch directory, then reconciliation and loading into DuckDB.

use enel_sftp::config::{EtlConfig, ExtractorConfig, GateConfig, SinkConfig, EXPECTED_COLUMNS};
use enel_sftp::credential::CredentialLoader;
use enel_sftp::download::download_all;
use enel_sftp::reconcile::SchemaReconciler;
use enel_sftp::select::FileSelector;
use enel_sftp::sink::{DuckDbSink, TableSink};
use enel_sftp::error::TransferFailureKind;
use enel_sftp::transfer::{ClientAuth, Connector, Endpoint, RemoteFs};
use enel_sftp::{run_etl, run_extraction, EtlOutcome, HostTarget, MatchMode, RemoteFileSet};
use enel_sftp::{SelectionRule, TransferOutcome};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const RSA_KEY: &str = include_str!("fixtures/keys/id_rsa_pem");

/// Remote directory tree held in memory, keyed by full path
#[derive(Debug, Clone, Default)]
struct StaticRemote {
    files: BTreeMap<String, Vec<u8>>,
}

impl StaticRemote {
    fn with_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), contents.into());
        self
    }
}

impl RemoteFs for StaticRemote {
    fn list_dir(&mut self, dir: &str) -> enel_sftp::Result<Vec<String>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let names: Vec<String> = self
            .files
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(String::from)
            .collect();
        if names.is_empty() {
            return Err(enel_sftp::Error::listing(dir, "no such directory"));
        }
        Ok(names)
    }

    fn fetch(&mut self, remote: &str, local: &Path) -> enel_sftp::Result<()> {
        let contents = self.files.get(remote).ok_or_else(|| {
            enel_sftp::Error::transfer(remote, TransferFailureKind::NotFound, "no such file")
        })?;
        std::fs::write(local, contents)?;
        Ok(())
    }

    fn close(&mut self) -> enel_sftp::Result<()> {
        Ok(())
    }
}

/// Serves the same in-memory remote to every endpoint it knows
struct StaticConnector {
    address: String,
    remote: StaticRemote,
}

impl Connector for StaticConnector {
    fn open(&self, endpoint: &Endpoint, _auth: &ClientAuth) -> Option<Box<dyn RemoteFs>> {
        (endpoint.host == self.address).then(|| Box::new(self.remote.clone()) as Box<dyn RemoteFs>)
    }
}

fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn extractor_config(root: &Path, hosts: Vec<HostTarget>) -> ExtractorConfig {
    ExtractorConfig {
        gate: GateConfig {
            enabled: false,
            ..GateConfig::default()
        },
        keys_base_path: root.join("keys"),
        hosts,
        remote_path: "/synergia/archivos/batch/lst/diarios/".to_string(),
        files: vec![
            "COELCE_efetividade_a.txt.zip".to_string(),
            "COELCE_efetividade_b.txt".to_string(),
            "COELCE_missing.txt.zip".to_string(),
        ],
        download_base_dir: root.join("archives"),
    }
}

#[test]
fn test_extract_then_load() {
    let root = TempDir::new().unwrap();
    let key = root.path().join("id_rsa");
    std::fs::write(&key, RSA_KEY).unwrap();

    let remote = StaticRemote::default()
        .with_file(
            "/synergia/archivos/batch/lst/diarios/COELCE_efetividade_a.txt.zip",
            zip_bytes(&[(
                "efetividade_a.txt",
                "CO|REFERENCIA|NUMERO_CLIENTE\n1|202601|100\n1|202601|101\n1|202601|102\n",
            )]),
        )
        .with_file(
            "/synergia/archivos/batch/lst/diarios/COELCE_efetividade_b.txt",
            "CO|LATITUDE|LONGITUDE|UNKNOWN\n2|-3.7|-38.5|x\n2|-3.8|-38.6|y\n",
        );
    let connector = StaticConnector {
        address: "10.154.78.75".to_string(),
        remote,
    };

    let config = extractor_config(
        root.path(),
        vec![HostTarget::new("10.154.78.75", "sftpce", "HOST_CE", &key)],
    );
    let report = run_extraction(&config, None, &connector).unwrap();

    let outcome: &TransferOutcome = &report.outcomes[0];
    assert!(outcome.connected);
    assert_eq!(
        outcome.downloaded,
        vec!["COELCE_efetividade_a.txt.zip", "COELCE_efetividade_b.txt"]
    );
    assert_eq!(outcome.failed, vec!["COELCE_missing.txt.zip"]);

    let etl = EtlConfig {
        source_dir: root.path().join("archives"),
        expected_columns: EXPECTED_COLUMNS.iter().map(ToString::to_string).collect(),
        sink: SinkConfig {
            database: ":memory:".to_string(),
            ..SinkConfig::default()
        },
    };
    let mut sink = DuckDbSink::connect(&etl.sink).unwrap();

    let loaded = run_etl(&etl, &mut sink).unwrap();
    assert_eq!(
        loaded,
        EtlOutcome::Loaded {
            table: "EfetividadeLeitura".to_string(),
            rows: 5
        }
    );
    assert!(sink.table_exists("EfetividadeLeitura").unwrap());

    // Loading again appends to the existing table
    run_etl(&etl, &mut sink).unwrap();
    assert_eq!(sink.row_count("EfetividadeLeitura").unwrap(), 10);
}

#[test]
fn test_reconciled_table_shape() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("CE")).unwrap();
    std::fs::write(root.path().join("CE/a.txt"), "CO|ZONA\n1|Z1\n").unwrap();

    let expected: Vec<String> = EXPECTED_COLUMNS.iter().map(ToString::to_string).collect();
    let table = SchemaReconciler::new()
        .reconcile(root.path(), &expected)
        .unwrap()
        .unwrap();

    let names = table.column_names();
    assert_eq!(names.len(), EXPECTED_COLUMNS.len() + 1);
    assert_eq!(names[0], "CO");
    assert_eq!(names[names.len() - 1], "source_file");
    assert_eq!(table.value(0, "ZONA"), Some("Z1"));
    assert_eq!(table.value(0, "LATITUDE"), None);
}

#[test]
fn test_rule_selection_then_download() {
    let root = TempDir::new().unwrap();
    let mut remote = StaticRemote::default()
        .with_file("/logs/BaseMes202601_a.txt", "A\n1\n")
        .with_file("/logs/BaseMes202601_b.TXT", "A\n2\n")
        .with_file("/logs/BaseMes202602_c.txt", "A\n3\n");

    let set = RemoteFileSet::Rule(SelectionRule::new("BaseMes", "202601", MatchMode::Regex));
    let targets = FileSelector::new().select(&mut remote, "/logs", &set);
    let report = download_all(&mut remote, "/logs", &targets, root.path()).unwrap();

    assert_eq!(report.downloaded.len(), 2);
    assert!(report.failed.is_empty());
    assert!(root.path().join("BaseMes202601_b.TXT").exists());
}

#[test]
fn test_credential_then_live_sftp() {
    // Requires a reachable server; skipped unless configured
    let (Ok(host), Ok(user), Ok(key)) = (
        std::env::var("ENEL_LIVE_SFTP_HOST"),
        std::env::var("ENEL_LIVE_SFTP_USER"),
        std::env::var("ENEL_LIVE_SFTP_KEY"),
    ) else {
        println!("Skipping: ENEL_LIVE_SFTP_HOST/USER/KEY not set");
        return;
    };

    let credential = CredentialLoader::new()
        .load(Path::new(&key))
        .expect("key should load");
    let mut session = enel_sftp::transfer::SftpConnector::new()
        .open(&Endpoint::new(host, user), &ClientAuth::Key(credential))
        .expect("session should open");

    let remote_path = std::env::var("ENEL_REMOTE_PATH").unwrap_or_else(|_| "/".to_string());
    assert!(session.list_dir(&remote_path).is_ok());
    session.close().unwrap();
    session.close().unwrap();
}
