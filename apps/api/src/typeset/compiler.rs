//! Compiler invocation: one confined toolchain run per request.
//!
//! [`Toolchain`] is the seam: `locate` resolves the executable without
//! spawning it, `run` performs a single invocation under a hard timeout.
//! Production uses [`TectonicToolchain`] over `tokio::process`; tests swap in
//! fakes so the [`compile_markdown`] control flow is exercised without real
//! processes.
//!
//! Every compile gets a fresh temporary working directory. The directory is
//! removed when the `TempDir` guard drops, which covers every exit path:
//! success, classification failures, timeouts, and early `?` returns.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::typeset::markdown::transpile;
use crate::typeset::template::assemble;

/// Maximum accepted content length, in Unicode characters.
pub const MAX_CONTENT_CHARS: usize = 20_000;
/// Default wall-clock budget for one toolchain invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Compiler program resolved from the search path unless overridden.
pub const DEFAULT_PROGRAM: &str = "tectonic";

/// LaTeX source filename inside the working directory.
const SOURCE_FILE: &str = "resume.tex";
/// Artifact the toolchain is expected to leave in the working directory.
const ARTIFACT_FILE: &str = "resume.pdf";
/// Compiler output beyond this many characters is cut from diagnostics.
const DIAGNOSTIC_CAP: usize = 4_000;
/// How long pipe draining may continue after the process exited or was
/// killed. Descendants inheriting the pipes can hold EOF back past this.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

// ─────────────────────────────────────────────────────────────────────────────
// Error taxonomy
// ─────────────────────────────────────────────────────────────────────────────

/// Classified outcome of a failed compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Caller-correctable input problem. Rejected before any subprocess or
    /// filesystem work happens.
    #[error("{0}")]
    Input(String),

    /// The compiler executable could not be resolved. A deployment fault,
    /// not a per-request one.
    #[error("Typesetting toolchain is not installed")]
    ToolchainUnavailable,

    /// The compiler exited nonzero. Deterministic for a given document, so
    /// it is never retried.
    #[error("Typesetting failed: {diagnostic}")]
    CompileFailure { diagnostic: String },

    /// The invocation exceeded its wall-clock budget and was killed.
    #[error("Typesetting timed out after {budget_secs}s: {diagnostic}")]
    Timeout { budget_secs: u64, diagnostic: String },

    /// The compiler reported success but left no artifact behind.
    #[error("Typesetting produced no PDF output")]
    OutputMissing,

    /// Filesystem trouble around the working directory.
    #[error("Workspace I/O error: {0}")]
    Workspace(#[from] std::io::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Toolchain port
// ─────────────────────────────────────────────────────────────────────────────

/// Raw result of one toolchain invocation.
#[derive(Debug)]
pub enum ToolchainRun {
    /// The process exited on its own. `exit_code` is `None` when it was
    /// terminated by a signal.
    Completed {
        exit_code: Option<i32>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// The invocation outlived its budget and its process tree was killed.
    /// Output captured up to that point is preserved for diagnostics.
    TimedOut { stdout: Vec<u8>, stderr: Vec<u8> },
}

/// Port over the external typesetting compiler.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Resolves the compiler executable without spawning it. `None` means
    /// compilation cannot be attempted by this process.
    fn locate(&self) -> Option<PathBuf>;

    /// Runs one confined invocation: current directory pinned to `workdir`,
    /// output directed into `workdir`, stdout and stderr captured, and the
    /// process tree killed once `timeout` elapses.
    async fn run(
        &self,
        workdir: &Path,
        source_file: &str,
        timeout: Duration,
    ) -> Result<ToolchainRun, std::io::Error>;
}

/// Production toolchain: the `tectonic` CLI (or a configured override).
#[derive(Debug, Clone)]
pub struct TectonicToolchain {
    program: String,
}

impl TectonicToolchain {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Toolchain for TectonicToolchain {
    fn locate(&self) -> Option<PathBuf> {
        let program = Path::new(&self.program);
        // More than one path component means an explicit location was
        // configured; honor it without consulting PATH. The executable bit
        // is still required, same as for search-path candidates.
        if program.components().count() > 1 {
            return is_executable(program).then(|| program.to_path_buf());
        }
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(&self.program))
            .find(|candidate| is_executable(candidate))
    }

    async fn run(
        &self,
        workdir: &Path,
        source_file: &str,
        timeout: Duration,
    ) -> Result<ToolchainRun, std::io::Error> {
        let mut command = Command::new(&self.program);
        command
            .arg("-o")
            .arg(workdir)
            .arg(source_file)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Fresh process group, so the timeout path can signal everything the
        // compiler spawned and not just the direct child.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;
        #[cfg(unix)]
        let group_id = child.id();

        // Drain both pipes concurrently so a chatty compiler cannot fill one
        // buffer and wedge against our wait. The buffers are shared with the
        // drain tasks; partial output survives a drain being cut short.
        let stdout_pipe = child.stdout.take().expect("stdout was piped");
        let stderr_pipe = child.stderr.take().expect("stderr was piped");
        let (stdout_task, stdout_buf) = spawn_drain(stdout_pipe);
        let (stderr_task, stderr_buf) = spawn_drain(stderr_pipe);

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        if waited.is_err() {
            // Signal the group before reaping the leader. Once the leader is
            // reaped its id could be recycled.
            #[cfg(unix)]
            if let Some(group) = group_id {
                signal_group_kill(group);
            }
            let _ = child.kill().await;
        }

        // Pipes hit EOF once every holder of the write end is dead. A
        // descendant that escaped the kill would hold EOF back forever, so
        // draining is bounded and then cut.
        tokio::join!(
            join_drain(stdout_task, DRAIN_GRACE),
            join_drain(stderr_task, DRAIN_GRACE),
        );
        let stdout = std::mem::take(&mut *stdout_buf.lock().await);
        let stderr = std::mem::take(&mut *stderr_buf.lock().await);

        match waited {
            Ok(status) => Ok(ToolchainRun::Completed {
                exit_code: status?.code(),
                stdout,
                stderr,
            }),
            Err(_elapsed) => Ok(ToolchainRun::TimedOut { stdout, stderr }),
        }
    }
}

/// Reads a pipe to EOF into a shared buffer. The task holds the buffer lock
/// for its whole run; `run` locks only after joining or aborting the task.
fn spawn_drain(
    mut pipe: impl AsyncReadExt + Unpin + Send + 'static,
) -> (JoinHandle<()>, Arc<Mutex<Vec<u8>>>) {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let task_buf = Arc::clone(&buf);
    let task = tokio::spawn(async move {
        let mut sink = task_buf.lock().await;
        let _ = pipe.read_to_end(&mut sink).await;
    });
    (task, buf)
}

/// Joins a drain task, aborting it if EOF does not arrive within `grace`.
async fn join_drain(mut task: JoinHandle<()>, grace: Duration) {
    if tokio::time::timeout(grace, &mut task).await.is_err() {
        task.abort();
    }
}

/// Sends SIGKILL to an entire process group. The leader must not have been
/// reaped yet, or the group id could already belong to someone else.
#[cfg(unix)]
fn signal_group_kill(group: u32) {
    unsafe {
        libc::kill(-(group as libc::pid_t), libc::SIGKILL);
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ─────────────────────────────────────────────────────────────────────────────
// Compile pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Invoker configuration, passed explicitly per call. There is no
/// module-level state.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Hard wall-clock budget for the toolchain subprocess.
    pub timeout: Duration,
    /// Maximum accepted content length, in Unicode characters.
    pub max_content_chars: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_content_chars: MAX_CONTENT_CHARS,
        }
    }
}

/// Compiles markdown `content` into PDF bytes through one confined toolchain
/// invocation.
///
/// Validation and toolchain resolution happen before anything touches the
/// filesystem, so rejected requests leave no trace. Failures come back as a
/// classified [`CompileError`] rather than a panic or a raw exit status.
pub async fn compile_markdown(
    content: &str,
    toolchain: &dyn Toolchain,
    options: &CompileOptions,
) -> Result<Bytes, CompileError> {
    if content.is_empty() {
        return Err(CompileError::Input("No content provided.".to_string()));
    }
    let chars = content.chars().count();
    if chars > options.max_content_chars {
        return Err(CompileError::Input(format!(
            "Content too long (max {} chars).",
            options.max_content_chars
        )));
    }

    if toolchain.locate().is_none() {
        return Err(CompileError::ToolchainUnavailable);
    }

    let started = Instant::now();
    let source = assemble(&transpile(content));

    let workdir = tempfile::Builder::new().prefix("typeset-").tempdir()?;
    tokio::fs::write(workdir.path().join(SOURCE_FILE), &source).await?;
    debug!(chars, source_bytes = source.len(), "Compiling document");

    let run = toolchain
        .run(workdir.path(), SOURCE_FILE, options.timeout)
        .await
        .map_err(|err| match err.kind() {
            // The program disappeared between locate and spawn.
            std::io::ErrorKind::NotFound => CompileError::ToolchainUnavailable,
            _ => CompileError::Workspace(err),
        })?;

    match run {
        ToolchainRun::TimedOut { stdout, stderr } => {
            warn!(
                budget_secs = options.timeout.as_secs(),
                "Toolchain killed after exceeding its time budget"
            );
            Err(CompileError::Timeout {
                budget_secs: options.timeout.as_secs(),
                diagnostic: select_diagnostic(&stderr, &stdout),
            })
        }
        ToolchainRun::Completed {
            exit_code,
            stdout,
            stderr,
        } if exit_code != Some(0) => Err(CompileError::CompileFailure {
            diagnostic: select_diagnostic(&stderr, &stdout),
        }),
        ToolchainRun::Completed { .. } => {
            let artifact = workdir.path().join(ARTIFACT_FILE);
            let bytes = match tokio::fs::read(&artifact).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(CompileError::OutputMissing);
                }
                Err(err) => return Err(CompileError::Workspace(err)),
            };
            info!(
                artifact_bytes = bytes.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Document compiled"
            );
            Ok(Bytes::from(bytes))
        }
    }
}

/// Picks stderr (falling back to stdout when stderr is empty) and caps the
/// text so error payloads stay bounded.
fn select_diagnostic(stderr: &[u8], stdout: &[u8]) -> String {
    let raw = if stderr.is_empty() { stdout } else { stderr };
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    if text.chars().count() <= DIAGNOSTIC_CAP {
        return text.to_string();
    }
    let truncated: String = text.chars().take(DIAGNOSTIC_CAP).collect();
    format!("{truncated} [truncated]")
}


#[cfg(all(test, unix))]
mod cli_tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set perms");
        path
    }

    #[test]
    fn test_locate_resolves_explicit_path() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(dir.path(), "fake-tectonic", "#!/bin/sh\nexit 0\n");
        let toolchain = TectonicToolchain::new(script.to_string_lossy().to_string());
        assert_eq!(toolchain.locate(), Some(script));
    }

    #[test]
    fn test_locate_misses_unknown_program() {
        let toolchain = TectonicToolchain::new("definitely-not-a-typesetter-3cf1");
        assert_eq!(toolchain.locate(), None);
    }

    #[test]
    fn test_locate_rejects_non_executable_path() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("fake-tectonic");
        fs::write(&path, "not a program").expect("write file");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("set perms");
        let toolchain = TectonicToolchain::new(path.to_string_lossy().to_string());
        assert_eq!(toolchain.locate(), None);
    }

    #[tokio::test]
    async fn test_run_confines_invocation_to_workdir() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            dir.path(),
            "fake-tectonic",
            r#"#!/bin/sh
set -eu
echo "$@" > "$PWD/args.log"
pwd > "$PWD/cwd.log"
"#,
        );
        let workdir = TempDir::new().expect("workdir");
        let toolchain = TectonicToolchain::new(script.to_string_lossy().to_string());

        let run = toolchain
            .run(workdir.path(), "resume.tex", Duration::from_secs(10))
            .await
            .expect("run succeeds");
        match run {
            ToolchainRun::Completed { exit_code, .. } => assert_eq!(exit_code, Some(0)),
            other => panic!("unexpected run result: {other:?}"),
        }

        let args = fs::read_to_string(workdir.path().join("args.log")).expect("args captured");
        assert!(args.contains("-o"), "missing -o flag: {args}");
        assert!(
            args.contains(&workdir.path().display().to_string()),
            "output not directed at workdir: {args}"
        );
        assert!(args.contains("resume.tex"), "missing source file: {args}");

        let cwd = fs::read_to_string(workdir.path().join("cwd.log")).expect("cwd captured");
        assert!(
            cwd.trim().ends_with(
                workdir
                    .path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .expect("workdir name")
            ),
            "process did not run inside the workdir: {cwd}"
        );
    }

    #[tokio::test]
    async fn test_run_surfaces_exit_code_and_stderr() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            dir.path(),
            "fake-tectonic",
            "#!/bin/sh\necho \"boom\" >&2\nexit 42\n",
        );
        let workdir = TempDir::new().expect("workdir");
        let toolchain = TectonicToolchain::new(script.to_string_lossy().to_string());

        let run = toolchain
            .run(workdir.path(), "resume.tex", Duration::from_secs(10))
            .await
            .expect("run completes");
        match run {
            ToolchainRun::Completed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(42));
                assert!(String::from_utf8_lossy(&stderr).contains("boom"));
            }
            other => panic!("unexpected run result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_kills_timed_out_process() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            dir.path(),
            "fake-tectonic",
            "#!/bin/sh\necho \"started\"\nexec sleep 30\n",
        );
        let workdir = TempDir::new().expect("workdir");
        let toolchain = TectonicToolchain::new(script.to_string_lossy().to_string());

        let started = Instant::now();
        let run = toolchain
            .run(workdir.path(), "resume.tex", Duration::from_millis(250))
            .await
            .expect("run completes");
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "kill did not happen promptly"
        );
        match run {
            ToolchainRun::TimedOut { stdout, .. } => {
                assert!(String::from_utf8_lossy(&stdout).contains("started"));
            }
            other => panic!("unexpected run result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_terminates_descendants_on_timeout() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            dir.path(),
            "fake-tectonic",
            "#!/bin/sh\necho \"started\"\n( sleep 1; : > alive.marker ) &\nexec sleep 30\n",
        );
        let workdir = TempDir::new().expect("workdir");
        let toolchain = TectonicToolchain::new(script.to_string_lossy().to_string());

        let started = Instant::now();
        let run = toolchain
            .run(workdir.path(), "resume.tex", Duration::from_millis(250))
            .await
            .expect("run completes");
        let elapsed = started.elapsed();

        // The background helper keeps the pipes open; the group kill must
        // close them well before the drain grace expires.
        assert!(elapsed < Duration::from_secs(2), "run overran: {elapsed:?}");
        match run {
            ToolchainRun::TimedOut { stdout, .. } => {
                assert!(String::from_utf8_lossy(&stdout).contains("started"));
            }
            other => panic!("unexpected run result: {other:?}"),
        }

        // A surviving helper would drop the marker at the one second mark.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(
            !workdir.path().join("alive.marker").exists(),
            "descendant outlived the kill"
        );
    }

    #[tokio::test]
    async fn test_run_returns_after_exit_when_pipes_stay_open() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            dir.path(),
            "fake-tectonic",
            "#!/bin/sh\necho \"done\"\n( exec sleep 30 ) &\nexit 0\n",
        );
        let workdir = TempDir::new().expect("workdir");
        let toolchain = TectonicToolchain::new(script.to_string_lossy().to_string());

        let started = Instant::now();
        let run = toolchain
            .run(workdir.path(), "resume.tex", Duration::from_secs(10))
            .await
            .expect("run completes");
        let elapsed = started.elapsed();

        // The orphan holds the pipes past the exit; draining must give up
        // after the grace instead of waiting out the orphan.
        assert!(elapsed < Duration::from_secs(8), "run overran: {elapsed:?}");
        match run {
            ToolchainRun::Completed {
                exit_code, stdout, ..
            } => {
                assert_eq!(exit_code, Some(0));
                assert!(String::from_utf8_lossy(&stdout).contains("done"));
            }
            other => panic!("unexpected run result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_compile_end_to_end_with_fake_cli() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            dir.path(),
            "fake-tectonic",
            r#"#!/bin/sh
set -eu
outdir=""
src=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    -o)
      shift
      outdir="$1"
      ;;
    *)
      src="$1"
      ;;
  esac
  shift
done
test -f "$src"
grep -q 'documentclass' "$src"
printf '%%PDF-1.4 fake document' > "$outdir/resume.pdf"
"#,
        );
        let toolchain = TectonicToolchain::new(script.to_string_lossy().to_string());

        let pdf = compile_markdown(
            "# John Doe\n- Shipped the typesetter",
            &toolchain,
            &CompileOptions::default(),
        )
        .await
        .expect("end-to-end compile succeeds");
        assert!(pdf.starts_with(b"%PDF"), "artifact is not a PDF: {pdf:?}");
    }
}
