use std::{
    fs::{self, File},
    path::Path,
    time::{Duration, SystemTime},
};

use mdconv::{
    domain::{
        error::ValidationError,
        job::{JobId, OutputFormat},
    },
    infra::storage::{IN_FLIGHT_MARKER, JobStore, StoreError},
};
use tempfile::TempDir;

const TTL: Duration = Duration::from_secs(24 * 3600);

fn store(dir: &TempDir, grace: Duration) -> JobStore {
    JobStore::open(dir.path().join("jobs"), grace).expect("store")
}

fn age(path: &Path, by: Duration) {
    File::open(path)
        .expect("open for mtime")
        .set_modified(SystemTime::now() - by)
        .expect("set mtime");
}

fn finished_job(store: &JobStore, contents: &[u8]) -> mdconv::domain::job::Job {
    let job = store.create_job().expect("job");
    store
        .write_artifact(&job, "report", OutputFormat::Pdf, contents)
        .expect("artifact");
    store.finish(&job).expect("finish");
    job
}

#[test]
fn expired_jobs_are_swept_and_fresh_jobs_survive() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir, Duration::from_secs(600));

    let old = finished_job(&store, b"old");
    let fresh = finished_job(&store, b"fresh");
    age(&old.directory, TTL + Duration::from_secs(60));

    assert!(store.is_expired(&old.id.to_string(), TTL));
    assert!(!store.is_expired(&fresh.id.to_string(), TTL));

    assert_eq!(store.sweep_expired(TTL), 1);
    assert!(!old.directory.exists());
    assert!(fresh.directory.join("report.pdf").is_file());

    assert_eq!(store.sweep_expired(TTL), 0);
}

#[test]
fn open_job_survives_sweep_while_its_marker_is_within_grace() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir, Duration::from_secs(600));

    let writing = store.create_job().expect("job");
    let aged = TTL + Duration::from_secs(60);
    age(&writing.directory.join(IN_FLIGHT_MARKER), aged);
    age(&writing.directory, aged);

    assert_eq!(store.sweep_expired(TTL), 0);
    assert!(writing.directory.exists());
    assert!(store.is_expired(&writing.id.to_string(), TTL));
}

#[test]
fn abandoned_marker_stops_protecting_after_ttl_plus_grace() {
    let dir = TempDir::new().unwrap();
    let grace = Duration::from_secs(600);
    let store = store(&dir, grace);

    let crashed = store.create_job().expect("job");
    let aged = TTL + grace + Duration::from_secs(60);
    age(&crashed.directory.join(IN_FLIGHT_MARKER), aged);
    age(&crashed.directory, aged);

    assert_eq!(store.sweep_expired(TTL), 1);
    assert!(!crashed.directory.exists());
}

#[test]
fn writing_an_artifact_refreshes_the_marker() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir, Duration::from_secs(600));

    let job = store.create_job().expect("job");
    let marker = job.directory.join(IN_FLIGHT_MARKER);
    age(&marker, TTL * 2);
    store
        .write_artifact(&job, "report", OutputFormat::Docx, b"PK")
        .expect("artifact");

    let marker_age = SystemTime::now()
        .duration_since(fs::metadata(&marker).unwrap().modified().unwrap())
        .unwrap_or_default();
    assert!(marker_age < Duration::from_secs(60), "{marker_age:?}");

    age(&job.directory, TTL * 2);
    assert_eq!(store.sweep_expired(TTL), 0);
    assert!(job.directory.join("report.docx").is_file());
}

#[test]
fn sweep_ignores_entries_that_are_not_jobs() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir, Duration::ZERO);

    let stray_dir = store.base_dir().join("keep-me");
    fs::create_dir(&stray_dir).unwrap();
    let stray_file = store.base_dir().join(format!("{}", JobId::new()));
    fs::write(&stray_file, b"not a directory").unwrap();
    age(&stray_dir, TTL * 2);
    age(&stray_file, TTL * 2);

    assert_eq!(store.sweep_expired(TTL), 0);
    assert!(stray_dir.exists());
    assert!(stray_file.exists());
}

#[test]
fn resolve_validates_before_touching_the_filesystem() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir, Duration::from_secs(600));

    let err = store.resolve_file("../../etc", "pdf").unwrap_err();
    assert!(
        matches!(
            err,
            StoreError::Validation(ValidationError::InvalidJobId { .. })
        ),
        "{err:?}"
    );

    let missing = JobId::new().to_string();
    assert_eq!(store.resolve_file(&missing, "pdf").unwrap(), None);
}

#[test]
fn resolve_finds_the_artifact_for_a_format() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir, Duration::from_secs(600));
    let job = finished_job(&store, b"%PDF-1.7");
    let id = job.id.to_string();

    let path = store.resolve_file(&id, "PDF").unwrap().expect("pdf present");
    assert_eq!(path.file_name().unwrap(), "report.pdf");
    assert!(path.starts_with(store.base_dir()));
    assert_eq!(store.resolve_file(&id, "docx").unwrap(), None);
}

#[test]
fn purge_removes_every_file_and_the_directory() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir, Duration::from_secs(600));
    let job = finished_job(&store, &vec![42u8; 4096]);

    let files = store.list_files(&job.id.to_string()).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "report.pdf");
    assert_eq!(files[0].mime_type, "application/pdf");

    assert!(store.purge(job.id));
    assert!(!job.directory.exists());
    assert!(!store.purge(job.id));
    assert!(store.is_expired(&job.id.to_string(), TTL));
}
