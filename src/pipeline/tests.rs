//! Tests for run orchestration

use super::*;
use crate::config::{GateConfig, SinkConfig, EXPECTED_COLUMNS};
use crate::gate::{GateController, LinkProbe};
use crate::sink::DuckDbSink;
use crate::transfer::MemoryFs;
use pretty_assertions::assert_eq;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;

const RSA_KEY: &str = include_str!("../../tests/fixtures/keys/id_rsa_pem");

// ============================================================================
// Fakes
// ============================================================================

/// Remote shared between the connector and the test
struct SharedFs(Rc<RefCell<MemoryFs>>);

impl RemoteFs for SharedFs {
    fn list_dir(&mut self, dir: &str) -> Result<Vec<String>> {
        self.0.borrow_mut().list_dir(dir)
    }

    fn fetch(&mut self, remote: &str, local: &Path) -> Result<()> {
        self.0.borrow_mut().fetch(remote, local)
    }

    fn close(&mut self) -> Result<()> {
        self.0.borrow_mut().close()
    }
}

#[derive(Default)]
struct FakeConnector {
    hosts: HashMap<String, Rc<RefCell<MemoryFs>>>,
    opened: RefCell<Vec<String>>,
    passwords: RefCell<Vec<String>>,
}

impl FakeConnector {
    fn with_host(mut self, address: &str, fs: MemoryFs) -> Self {
        self.hosts
            .insert(address.to_string(), Rc::new(RefCell::new(fs)));
        self
    }

    fn fs(&self, address: &str) -> Rc<RefCell<MemoryFs>> {
        Rc::clone(&self.hosts[address])
    }
}

impl Connector for FakeConnector {
    fn open(&self, endpoint: &Endpoint, auth: &ClientAuth) -> Option<Box<dyn RemoteFs>> {
        self.opened.borrow_mut().push(endpoint.host.clone());
        if let ClientAuth::Password(password) = auth {
            self.passwords.borrow_mut().push(password.clone());
        }
        let fs = self.hosts.get(&endpoint.host)?;
        Some(Box::new(SharedFs(Rc::clone(fs))))
    }
}

struct FixedProbe(Rc<Cell<bool>>);

impl LinkProbe for FixedProbe {
    fn is_connected(&self) -> bool {
        self.0.get()
    }
}

#[derive(Default)]
struct CountingController {
    launches: Rc<Cell<u32>>,
    disconnects: Rc<Cell<u32>>,
}

impl GateController for CountingController {
    fn launch(&self) -> Result<()> {
        self.launches.set(self.launches.get() + 1);
        Ok(())
    }

    fn disconnect(&self, _timeout: Duration) -> Result<()> {
        self.disconnects.set(self.disconnects.get() + 1);
        Ok(())
    }
}

fn gate(up: bool) -> (NetworkGate, Rc<Cell<u32>>, Rc<Cell<u32>>) {
    let controller = CountingController::default();
    let launches = Rc::clone(&controller.launches);
    let disconnects = Rc::clone(&controller.disconnects);
    let config = GateConfig {
        poll_interval: Duration::ZERO,
        max_polls: 3,
        ..GateConfig::default()
    };
    let gate = NetworkGate::new(
        Box::new(FixedProbe(Rc::new(Cell::new(up)))),
        Box::new(controller),
        config,
    );
    (gate, launches, disconnects)
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

fn host(address: &str, name: &str, key: PathBuf) -> HostTarget {
    HostTarget::new(address, "user", name, key)
}

fn extractor_config(dir: &TempDir, hosts: Vec<HostTarget>, files: &[&str]) -> ExtractorConfig {
    ExtractorConfig {
        gate: GateConfig::default(),
        keys_base_path: dir.path().join("keys"),
        hosts,
        remote_path: "/batch/".to_string(),
        files: files.iter().map(ToString::to_string).collect(),
        download_base_dir: dir.path().join("archives"),
    }
}

fn write_key(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, RSA_KEY).unwrap();
    path
}

// ============================================================================
// Extraction Tests
// ============================================================================

#[test]
fn test_process_host_downloads_and_closes() {
    let dir = TempDir::new().unwrap();
    let key = write_key(&dir, "id_ce");
    let connector = FakeConnector::default().with_host(
        "10.0.0.1",
        MemoryFs::new()
            .with_file("/batch/a.txt.zip", zip_bytes(&[("a.txt", "x")]))
            .with_file("/batch/c.txt", "c"),
    );
    let target = host("10.0.0.1", "HOST_CE", key);
    let config = extractor_config(&dir, vec![target.clone()], &["a.txt.zip", "b.txt", "c.txt"]);

    let outcome = process_host(&config, &target, &connector);

    assert!(outcome.connected);
    assert_eq!(outcome.downloaded, vec!["a.txt.zip", "c.txt"]);
    assert_eq!(outcome.failed, vec!["b.txt"]);
    assert_eq!(connector.fs("10.0.0.1").borrow().closes(), 1);
    assert_eq!(connector.fs("10.0.0.1").borrow().listings(), 0);

    let local = dir.path().join("archives").join("CE");
    assert!(local.join("a.txt").exists());
    assert!(!local.join("a.txt.zip").exists());
}

#[test]
fn test_missing_key_skips_host_without_connecting() {
    let dir = TempDir::new().unwrap();
    let connector = FakeConnector::default().with_host("10.0.0.1", MemoryFs::new());
    let target = host("10.0.0.1", "HOST_CE", dir.path().join("absent"));
    let config = extractor_config(&dir, vec![target.clone()], &["a.zip", "b.zip"]);

    let outcome = process_host(&config, &target, &connector);

    assert!(!outcome.connected);
    assert!(outcome.downloaded.is_empty());
    assert_eq!(outcome.failed, vec!["a.zip", "b.zip"]);
    assert!(connector.opened.borrow().is_empty());
}

#[test]
fn test_extraction_continues_past_unreachable_host() {
    let dir = TempDir::new().unwrap();
    let key = write_key(&dir, "id");
    let connector = FakeConnector::default()
        .with_host("10.0.0.2", MemoryFs::new().with_file("/batch/a.zip", "not a zip"));
    let config = extractor_config(
        &dir,
        vec![
            host("10.0.0.1", "HOST_CE", key.clone()),
            host("10.0.0.2", "HOST_RJ", key),
        ],
        &["a.zip"],
    );
    let (gate, launches, disconnects) = gate(true);

    let report = run_extraction(&config, Some(&gate), &connector).unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].status(), "FAILED");
    assert_eq!(report.outcomes[0].failed, vec!["a.zip"]);
    assert_eq!(report.outcomes[1].status(), "OK");
    assert_eq!(report.outcomes[1].downloaded, vec!["a.zip"]);
    assert!(dir.path().join("archives/RJ/a.zip").exists());
    assert_eq!(launches.get(), 0);
    assert_eq!(disconnects.get(), 1);
}

#[test]
fn test_gate_failure_aborts_before_any_host() {
    let dir = TempDir::new().unwrap();
    let key = write_key(&dir, "id");
    let connector = FakeConnector::default().with_host("10.0.0.1", MemoryFs::new());
    let config = extractor_config(&dir, vec![host("10.0.0.1", "HOST_CE", key)], &["a.zip"]);
    let (gate, launches, disconnects) = gate(false);

    let err = run_extraction(&config, Some(&gate), &connector).unwrap_err();

    assert!(matches!(err, Error::GateTimeout { .. }));
    assert!(connector.opened.borrow().is_empty());
    assert_eq!(launches.get(), 1);
    assert_eq!(disconnects.get(), 1);
}

#[test]
fn test_extraction_without_gate() {
    let dir = TempDir::new().unwrap();
    let key = write_key(&dir, "id");
    let connector =
        FakeConnector::default().with_host("10.0.0.1", MemoryFs::new().with_file("/batch/a.txt", "a"));
    let config = extractor_config(&dir, vec![host("10.0.0.1", "HOST_CE", key)], &["a.txt"]);

    let report = run_extraction(&config, None, &connector).unwrap();
    assert_eq!(report.total_downloaded(), 1);
    assert_eq!(report.total_failed(), 0);
}

// ============================================================================
// Password Pull Tests
// ============================================================================

fn password_config(dir: &TempDir, month: &str) -> PasswordSftpConfig {
    PasswordSftpConfig {
        host: "10.9.9.9".to_string(),
        port: 22,
        username: "EXPLOTACAO".to_string(),
        password: "secret".to_string(),
        remote_path: "/D:/LOGS".to_string(),
        file_prefix: "BaseMes".to_string(),
        file_month: month.to_string(),
        download_base_dir: dir.path().join("out"),
    }
}

#[test]
fn test_password_pull_modes() {
    for mode in [MatchMode::Substring, MatchMode::Regex] {
        let dir = TempDir::new().unwrap();
        let connector = FakeConnector::default().with_host(
            "10.9.9.9",
            MemoryFs::new()
                .with_file("/D:/LOGS/BaseMes202601_export.txt", "A\n1\n")
                .with_file("/D:/LOGS/BaseMes202601_old.csv", "A\n1\n")
                .with_file("/D:/LOGS/OtherMes202601.txt", "A\n1\n"),
        );

        let outcome = run_password_pull(&password_config(&dir, "202601"), mode, &connector);

        assert!(outcome.connected, "{mode:?}");
        assert_eq!(outcome.downloaded, vec!["BaseMes202601_export.txt"]);
        assert!(dir.path().join("out/BaseMes202601_export.txt").exists());
        assert_eq!(*connector.passwords.borrow(), vec!["secret"]);
        assert_eq!(connector.fs("10.9.9.9").borrow().closes(), 1);
    }
}

#[test]
fn test_password_pull_listing_failure() {
    let dir = TempDir::new().unwrap();
    let connector = FakeConnector::default().with_host(
        "10.9.9.9",
        MemoryFs::new()
            .with_file("/D:/LOGS/BaseMes202601.txt", "x")
            .with_unlistable_dir("/D:/LOGS"),
    );

    let outcome = run_password_pull(
        &password_config(&dir, "202601"),
        MatchMode::Substring,
        &connector,
    );

    assert!(!outcome.connected);
    assert!(outcome.downloaded.is_empty());
    assert!(outcome.failed.is_empty());
    assert_eq!(connector.fs("10.9.9.9").borrow().closes(), 1);
}

#[test]
fn test_password_pull_zero_matches_is_connected() {
    let dir = TempDir::new().unwrap();
    let connector = FakeConnector::default()
        .with_host("10.9.9.9", MemoryFs::new().with_file("/D:/LOGS/readme.md", "x"));

    let outcome = run_password_pull(
        &password_config(&dir, "202601"),
        MatchMode::Regex,
        &connector,
    );
    assert!(outcome.connected);
    assert!(outcome.downloaded.is_empty());
}

// ============================================================================
// ETL Tests
// ============================================================================

fn etl_config(source_dir: PathBuf) -> EtlConfig {
    EtlConfig {
        source_dir,
        expected_columns: EXPECTED_COLUMNS.iter().map(ToString::to_string).collect(),
        sink: SinkConfig {
            database: ":memory:".to_string(),
            ..SinkConfig::default()
        },
    }
}

#[test]
fn test_etl_loads_reconciled_rows() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "CO|REFERENCIA|EXTRA\n1|202601|x\n2|202601|y\n").unwrap();
    std::fs::write(dir.path().join("b.txt"), "NUMERO_CLIENTE\n77\n").unwrap();

    let config = etl_config(dir.path().to_path_buf());
    let mut sink = DuckDbSink::connect(&config.sink).unwrap();

    let outcome = run_etl(&config, &mut sink).unwrap();
    assert_eq!(
        outcome,
        EtlOutcome::Loaded {
            table: "EfetividadeLeitura".to_string(),
            rows: 3
        }
    );
    assert_eq!(sink.row_count("EfetividadeLeitura").unwrap(), 3);
}

#[test]
fn test_etl_nothing_to_load() {
    let dir = TempDir::new().unwrap();
    let config = etl_config(dir.path().to_path_buf());
    let mut sink = DuckDbSink::in_memory().unwrap();

    assert_eq!(run_etl(&config, &mut sink).unwrap(), EtlOutcome::NothingToLoad);
    assert!(!sink.table_exists("EfetividadeLeitura").unwrap());
}

#[test]
fn test_etl_missing_source_dir() {
    let dir = TempDir::new().unwrap();
    let config = etl_config(dir.path().join("missing"));
    let mut sink = DuckDbSink::in_memory().unwrap();

    let err = run_etl(&config, &mut sink).unwrap_err();
    assert!(matches!(err, Error::SourceDirMissing { .. }));
}
