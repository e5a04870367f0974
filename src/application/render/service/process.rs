use std::{
    ffi::OsStr,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
    time::Instant,
};

use serde::Serialize;
use tracing::{debug, warn};

use crate::application::render::types::EngineError;

/// An external rendering program invoked once per conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    name: &'static str,
    path: PathBuf,
}

/// Result of `<tool> --version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolProbe {
    pub tool: String,
    pub path: PathBuf,
    pub version: Option<String>,
    pub error: Option<String>,
}

impl ToolProbe {
    pub fn is_available(&self) -> bool {
        self.version.is_some()
    }
}

impl ExternalTool {
    pub fn new(name: &'static str, path: impl Into<PathBuf>) -> Self {
        Self {
            name,
            path: path.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs the tool to completion with stdin closed and stderr captured.
    /// A non-zero exit becomes [`EngineError::Exit`].
    pub(crate) fn run<I, S>(&self, args: I) -> Result<Output, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let started_at = Instant::now();
        let output = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                warn!(
                    target = "application::render::process",
                    op = "spawn",
                    tool = self.name,
                    path = %self.path.display(),
                    error = %err,
                    "failed to spawn external tool"
                );
                if err.kind() == ErrorKind::NotFound {
                    EngineError::NotFound {
                        tool: self.name.to_string(),
                        source: err,
                    }
                } else {
                    EngineError::Io(err)
                }
            })?;

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target = "application::render::process",
                op = "run",
                tool = self.name,
                elapsed_ms,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                stderr = %stderr,
                "external tool failed"
            );
            return Err(EngineError::Exit {
                tool: self.name.to_string(),
                exit_code,
                stderr,
            });
        }

        debug!(
            target = "application::render::process",
            op = "run",
            tool = self.name,
            elapsed_ms,
        );
        Ok(output)
    }

    /// Runs `<tool> --version` and keeps the first line of its output.
    pub fn probe_version(&self) -> ToolProbe {
        let (version, error) = match self.run(["--version"]) {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let line = stdout.lines().next().unwrap_or_default().trim().to_string();
                (Some(line), None)
            }
            Err(err) => (None, Some(err.to_string())),
        };
        ToolProbe {
            tool: self.name.to_string(),
            path: self.path.clone(),
            version,
            error,
        }
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::test_support::fake_tool;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn probe_reports_first_version_line() {
        let dir = TempDir::new().expect("temp dir");
        let path = fake_tool(dir.path(), "pandoc", "echo 'pandoc 3.1.9'\necho 'extra'\n");
        let probe = ExternalTool::new("pandoc", path).probe_version();
        assert!(probe.is_available());
        assert_eq!(probe.version.as_deref(), Some("pandoc 3.1.9"));
    }

    #[test]
    fn missing_binary_maps_to_not_found() {
        let tool = ExternalTool::new("pandoc", "/definitely/not/here/pandoc");
        let err = tool.run(["--version"]).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }), "{err:?}");
        assert!(!tool.probe_version().is_available());
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
        let dir = TempDir::new().expect("temp dir");
        let path = fake_tool(dir.path(), "weasyprint", "echo 'boom' >&2\nexit 42\n");
        let err = ExternalTool::new("weasyprint", path)
            .run(["in.html"])
            .unwrap_err();
        match err {
            EngineError::Exit {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(42));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
