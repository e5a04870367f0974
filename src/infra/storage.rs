//! Filesystem job store: one UUID-named directory per conversion job.
//!
//! Layout is `{base_dir}/{job_id}/{base_name}.{format}`. Job directories are
//! always direct children of the canonical base directory, and nothing
//! outside the base directory is ever resolved, swept or deleted.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::domain::error::ValidationError;
use crate::domain::job::{Job, JobId, OutputFormat, RenderResult};

/// Marker present while a request is still writing into its job directory.
pub const IN_FLIGHT_MARKER: &str = ".inflight";
const SECURE_OVERWRITE_BYTES: u64 = 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("path traversal detected for job `{job_id}`")]
    PathTraversal { job_id: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct JobStore {
    base_dir: PathBuf,
    in_flight_grace: Duration,
}

impl JobStore {
    /// Opens (creating if needed) the store rooted at `base_dir`.
    pub fn open(base_dir: impl AsRef<Path>, in_flight_grace: Duration) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref();
        fs::create_dir_all(base_dir)?;
        let base_dir = base_dir.canonicalize()?;
        debug!(
            target = "infra::storage",
            op = "open",
            base_dir = %base_dir.display(),
            in_flight_grace_secs = in_flight_grace.as_secs(),
        );
        Ok(Self {
            base_dir,
            in_flight_grace,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn job_dir(&self, id: JobId) -> PathBuf {
        self.base_dir.join(id.to_string())
    }

    /// Allocates a fresh job directory and marks it in flight.
    pub fn create_job(&self) -> Result<Job, StoreError> {
        let id = JobId::new();
        let directory = self.job_dir(id);
        fs::create_dir(&directory)?;
        fs::File::create(directory.join(IN_FLIGHT_MARKER))?;

        info!(
            target = "infra::storage",
            op = "create_job",
            job_id = %id,
            directory = %directory.display(),
        );
        Ok(Job::new(id, directory, OffsetDateTime::now_utc()))
    }

    /// Writes one artifact atomically: a hidden temporary file in the job
    /// directory is renamed onto `{base_name}.{format}`.
    pub fn write_artifact(
        &self,
        job: &Job,
        base_name: &str,
        format: OutputFormat,
        bytes: &[u8],
    ) -> Result<RenderResult, StoreError> {
        let output_path = job
            .directory
            .join(format!("{base_name}.{}", format.extension()));

        self.touch_marker(job)?;
        let mut staged = tempfile::Builder::new()
            .prefix(".staged-")
            .tempfile_in(&job.directory)?;
        staged.write_all(bytes)?;
        staged.as_file().sync_all()?;
        staged
            .persist(&output_path)
            .map_err(|err| StoreError::Io(err.error))?;

        let checksum = hex::encode(Sha256::digest(bytes));
        debug!(
            target = "infra::storage",
            op = "write_artifact",
            job_id = %job.id,
            format = %format,
            bytes = bytes.len(),
            checksum = %checksum,
        );
        Ok(RenderResult {
            format,
            output_path,
            byte_size: bytes.len() as u64,
            checksum,
        })
    }

    /// Refreshes the in-flight marker so a long multi-format job stays protected.
    fn touch_marker(&self, job: &Job) -> Result<(), StoreError> {
        match fs::File::options()
            .write(true)
            .open(job.directory.join(IN_FLIGHT_MARKER))
        {
            Ok(marker) => Ok(marker.set_modified(SystemTime::now())?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    /// Clears the in-flight marker once a request is done with the job.
    pub fn finish(&self, job: &Job) -> Result<(), StoreError> {
        match fs::remove_file(job.directory.join(IN_FLIGHT_MARKER)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    /// Resolves the stored artifact for `(job_id, format)`.
    ///
    /// Identifier and format are validated before the filesystem is touched.
    /// Returns `Ok(None)` when the job or the artifact does not exist.
    pub fn resolve_file(&self, job_id: &str, format: &str) -> Result<Option<PathBuf>, StoreError> {
        let id = JobId::parse(job_id)?;
        let format: OutputFormat = format.parse()?;

        let Some(directory) = self.contained_job_dir(id)? else {
            return Ok(None);
        };

        let mut candidates = Vec::new();
        for entry in fs::read_dir(&directory)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            let is_regular = entry.file_type().map(|kind| kind.is_file()).unwrap_or(false);
            let matches_format = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(format.extension()));
            if is_regular && matches_format {
                candidates.push(path);
            }
        }
        candidates.sort();

        let resolved = candidates.into_iter().next();
        debug!(
            target = "infra::storage",
            op = "resolve_file",
            job_id = %id,
            format = %format,
            found = resolved.is_some(),
        );
        Ok(resolved)
    }

    /// Canonical job directory, or `None` when it does not exist. Anything
    /// that canonicalizes outside the base directory fails closed.
    fn contained_job_dir(&self, id: JobId) -> Result<Option<PathBuf>, StoreError> {
        let candidate = self.job_dir(id);
        let canonical = match candidate.canonicalize() {
            Ok(path) => path,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };

        let expected_name = id.to_string();
        let contained = canonical.parent() == Some(self.base_dir.as_path())
            && canonical.file_name().and_then(|name| name.to_str()) == Some(expected_name.as_str());
        if !contained {
            warn!(
                target = "infra::storage",
                op = "contain",
                job_id = %id,
                resolved = %canonical.display(),
                "job path escapes the storage directory"
            );
            return Err(StoreError::PathTraversal {
                job_id: expected_name,
            });
        }

        if !canonical.is_dir() {
            return Ok(None);
        }
        Ok(Some(canonical))
    }

    /// Deletes every job directory older than `max_age`. Returns the number
    /// removed. Per-directory failures are logged and skipped.
    pub fn sweep_expired(&self, max_age: Duration) -> usize {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    target = "infra::storage",
                    op = "sweep",
                    base_dir = %self.base_dir.display(),
                    error = %err,
                    "failed to list storage directory"
                );
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| canonical_job_id(name))
            else {
                continue;
            };
            let is_dir = entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            let age = match directory_age(&path, now) {
                Ok(age) => age,
                Err(err) => {
                    warn!(
                        target = "infra::storage",
                        op = "sweep",
                        job_id = %id,
                        error = %err,
                        "failed to stat job directory; skipping"
                    );
                    continue;
                }
            };
            if age <= max_age {
                continue;
            }

            if self.is_in_flight(&path, now, max_age) {
                debug!(
                    target = "infra::storage",
                    op = "sweep",
                    job_id = %id,
                    "job still in flight; skipping"
                );
                continue;
            }

            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    removed += 1;
                    debug!(
                        target = "infra::storage",
                        op = "sweep",
                        job_id = %id,
                        age_secs = age.as_secs(),
                        "removed expired job"
                    );
                }
                Err(err) => warn!(
                    target = "infra::storage",
                    op = "sweep",
                    job_id = %id,
                    error = %err,
                    "failed to remove expired job; continuing"
                ),
            }
        }

        metrics::counter!("mdconv_jobs_swept_total").increment(removed as u64);
        info!(
            target = "infra::storage",
            op = "sweep",
            removed,
            max_age_secs = max_age.as_secs(),
        );
        removed
    }

    /// A marker protects its directory until it is older than `max_age` plus
    /// the grace window. Past that the writer is assumed to have crashed.
    fn is_in_flight(&self, directory: &Path, now: SystemTime, max_age: Duration) -> bool {
        let deadline = max_age.saturating_add(self.in_flight_grace);
        match fs::metadata(directory.join(IN_FLIGHT_MARKER)).and_then(|meta| meta.modified()) {
            Ok(modified) => now
                .duration_since(modified)
                .map(|age| age <= deadline)
                .unwrap_or(true),
            Err(_) => false,
        }
    }

    /// True when the job is gone, older than `max_age`, or cannot be inspected.
    pub fn is_expired(&self, job_id: &str, max_age: Duration) -> bool {
        let Ok(id) = JobId::parse(job_id) else {
            return true;
        };
        match directory_age(&self.job_dir(id), SystemTime::now()) {
            Ok(age) => age > max_age,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!(
                        target = "infra::storage",
                        op = "is_expired",
                        job_id = %id,
                        error = %err,
                        "failed to stat job; treating as expired"
                    );
                }
                true
            }
        }
    }

    /// Securely deletes every file of a job, then the directory itself.
    /// Returns false when the job does not exist or deletion failed.
    pub fn purge(&self, id: JobId) -> bool {
        let directory = match self.contained_job_dir(id) {
            Ok(Some(directory)) => directory,
            Ok(None) => return false,
            Err(err) => {
                warn!(
                    target = "infra::storage",
                    op = "purge",
                    job_id = %id,
                    error = %err,
                    "refusing to purge job"
                );
                return false;
            }
        };

        if let Ok(entries) = fs::read_dir(&directory) {
            for entry in entries.flatten() {
                secure_delete(&entry.path());
            }
        }
        let purged = secure_delete(&directory);
        info!(target = "infra::storage", op = "purge", job_id = %id, purged);
        purged
    }

    /// Metadata for every visible file in a job directory.
    pub fn list_files(&self, job_id: &str) -> Result<Vec<FileInfo>, StoreError> {
        let id = JobId::parse(job_id)?;
        let Some(directory) = self.contained_job_dir(id)? else {
            return Ok(Vec::new());
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let regular = entry.file_type().map(|kind| kind.is_file()).unwrap_or(false);
            if regular && !hidden {
                files.push(FileInfo::read(&entry.path())?);
            }
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }
}

/// Parses a directory name that must be exactly a hyphenated lowercase UUID.
fn canonical_job_id(name: &str) -> Option<JobId> {
    JobId::parse(name)
        .ok()
        .filter(|id| id.to_string() == name)
}

fn directory_age(path: &Path, now: SystemTime) -> io::Result<Duration> {
    let modified = fs::symlink_metadata(path)?.modified()?;
    Ok(now.duration_since(modified).unwrap_or(Duration::ZERO))
}

/// Best-effort secure erase. Files get their first 1KB overwritten with random
/// bytes before unlinking; directories are removed recursively; symlinks are
/// unlinked without touching their target. Never panics or errors.
pub fn secure_delete(path: &Path) -> bool {
    let outcome = (|| -> io::Result<()> {
        let metadata = fs::symlink_metadata(path)?;
        let kind = metadata.file_type();
        if kind.is_symlink() {
            return fs::remove_file(path);
        }
        if kind.is_dir() {
            return fs::remove_dir_all(path);
        }

        let overwrite_len = metadata.len().min(SECURE_OVERWRITE_BYTES) as usize;
        if overwrite_len > 0 {
            let mut noise = vec![0u8; overwrite_len];
            rand::thread_rng().fill_bytes(&mut noise);
            let mut file = OpenOptions::new().write(true).open(path)?;
            file.write_all(&noise)?;
            file.sync_all()?;
        }
        fs::remove_file(path)
    })();

    match outcome {
        Ok(()) => true,
        Err(err) => {
            warn!(
                target = "infra::storage",
                op = "secure_delete",
                path = %path.display(),
                error = %err,
                "secure delete failed"
            );
            false
        }
    }
}

/// Descriptive metadata for a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub modified: OffsetDateTime,
    pub extension: Option<String>,
    pub mime_type: String,
}

impl FileInfo {
    pub fn read(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes: metadata.len(),
            modified: OffsetDateTime::from(metadata.modified()?),
            extension: path
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase()),
            mime_type: mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        })
    }
}
