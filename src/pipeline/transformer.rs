// src/pipeline/transformer.rs

//! External transformer invocation.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{Result, RevbuildError};
use crate::types::Version;

/// Environment variable holding the snapshot directory.
pub const SNAPSHOT_DIR_ENV: &str = "REVBUILD_SNAPSHOT_DIR";
/// Environment variable holding the directory the output must be written to.
pub const OUTPUT_DIR_ENV: &str = "REVBUILD_OUTPUT_DIR";
/// Environment variable holding the version being built.
pub const VERSION_ENV: &str = "REVBUILD_VERSION";

/// Paths handed to the transformer for one build.
#[derive(Debug, Clone)]
pub struct TransformInput {
    pub snapshot_dir: PathBuf,
    pub output_dir: PathBuf,
    pub version: Version,
}

/// How the transformer process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformerExit {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub success: bool,
}

/// Turns a snapshot into an output tree.
///
/// `Err` means the transformer could not be run at all; a transformer that
/// ran and failed reports it through [`TransformerExit`].
pub trait Transformer: Send + Sync {
    fn transform(
        &self,
        input: TransformInput,
    ) -> Pin<Box<dyn Future<Output = Result<TransformerExit>> + Send + '_>>;
}

/// Runs a shell command line as the transformer.
#[derive(Debug, Clone)]
pub struct ShellTransformer {
    command: String,
    working_dir: PathBuf,
}

impl ShellTransformer {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
        }
    }
}

impl Transformer for ShellTransformer {
    fn transform(
        &self,
        input: TransformInput,
    ) -> Pin<Box<dyn Future<Output = Result<TransformerExit>> + Send + '_>> {
        Box::pin(run_shell(&self.command, &self.working_dir, input))
    }
}

/// Shell exit statuses for "command not found" and "not executable".
#[cfg(not(windows))]
const NOT_RUNNABLE_CODES: &[i32] = &[126, 127];
#[cfg(windows)]
const NOT_RUNNABLE_CODES: &[i32] = &[9009];

fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(line);
        c
    }
}

async fn run_shell(
    line: &str,
    working_dir: &Path,
    input: TransformInput,
) -> Result<TransformerExit> {
    let version = input.version;
    info!(version, cmd = %line, cwd = ?working_dir, "starting transformer");

    let mut cmd = shell_command(line);
    cmd.current_dir(working_dir)
        .env(SNAPSHOT_DIR_ENV, &input.snapshot_dir)
        .env(OUTPUT_DIR_ENV, &input.output_dir)
        .env(VERSION_ENV, version.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        RevbuildError::TransformerInvocationError(format!(
            "spawning '{line}' in {}: {e}",
            working_dir.display()
        ))
    })?;

    // Both pipes are drained independently so neither can fill up and stall
    // the child.
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, version, OutputStream::Stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, version, OutputStream::Stderr));
    }

    let status = child.wait().await.map_err(|e| {
        RevbuildError::TransformerInvocationError(format!("waiting for '{line}': {e}"))
    })?;

    if let Some(code) = status.code().filter(|c| NOT_RUNNABLE_CODES.contains(c)) {
        return Err(RevbuildError::TransformerInvocationError(format!(
            "'{line}' could not run its program (shell exit {code})"
        )));
    }

    let exit = TransformerExit {
        code: status.code(),
        success: status.success(),
    };
    info!(
        version,
        exit_code = ?exit.code,
        success = exit.success,
        "transformer exited"
    );
    Ok(exit)
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

async fn forward_lines<R>(reader: R, version: Version, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match stream {
            OutputStream::Stdout => info!(version, "transformer: {}", line),
            OutputStream::Stderr => debug!(version, "transformer stderr: {}", line),
        }
    }
}
