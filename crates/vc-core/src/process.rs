// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! External process invocation.
//!
//! Every backend talks to its tools through [`ProcessRunner`]. Arguments are
//! always passed as an argv vector, never through a shell. Output pipes are
//! drained on their own threads while stdin is fed, so a tool that writes
//! before it has read all of its input cannot deadlock the caller.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::{VcError, VcResult};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What happens to the child's standard error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StderrMode {
    /// Interleave with stdout in one stream (`2>&1`)
    Merge,
    /// Keep separately in [`ProcessOutput::stderr`]
    #[default]
    Capture,
    Discard,
}

/// A fully described invocation of one external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    program: PathBuf,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    stdin: Option<Vec<u8>>,
    stderr: StderrMode,
    current_dir: Option<PathBuf>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            stderr: StderrMode::default(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn stderr(mut self, mode: StderrMode) -> Self {
        self.stderr = mode;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Base name of the program, e.g. `rlog` for `/usr/bin/rlog`
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Arguments as lossy UTF-8, for logging and assertions
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    pub fn get_env(&self) -> &[(OsString, OsString)] {
        &self.env
    }

    pub fn get_stdin(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }

    pub fn stderr_mode(&self) -> StderrMode {
        self.stderr
    }

    /// Human-readable command line
    pub fn display(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }

    fn spawn_error(&self, source: io::Error) -> VcError {
        VcError::Spawn {
            program: self.program.to_string_lossy().into_owned(),
            source,
        }
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Standard output, with stderr interleaved under [`StderrMode::Merge`]
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code; `None` when the process was ended by a signal
    pub status: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    /// Standard output split into lines without terminators
    pub fn lines(&self) -> Vec<String> {
        self.stdout_lossy().lines().map(str::to_string).collect()
    }

    /// A [`VcError::CommandFailed`] describing this output
    pub fn failure(&self, command: &ProcessCommand) -> VcError {
        let output = if self.stderr.is_empty() {
            self.stdout_lossy().trim().to_string()
        } else {
            self.stderr_lossy().trim().to_string()
        };
        VcError::CommandFailed {
            program: command.program_name(),
            status: self.status,
            output,
        }
    }
}

/// Runs external tools on behalf of a backend
pub trait ProcessRunner: Send + Sync {
    /// Run to completion and capture all output.
    fn run(&self, command: &ProcessCommand) -> VcResult<ProcessOutput>;

    /// Start the process and hand back its standard output as a stream.
    /// The process is reaped when the stream is dropped.
    fn stream(&self, command: &ProcessCommand) -> VcResult<Box<dyn Read + Send>>;
}

/// [`ProcessRunner`] backed by `std::process`
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any process that runs longer than `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Spawn `command` with stdout (and possibly stderr) wired to one reader.
    fn spawn(
        &self,
        command: &ProcessCommand,
    ) -> VcResult<(Child, Box<dyn Read + Send>, Option<std::process::ChildStderr>)> {
        let mut cmd = command.to_command();
        cmd.stdin(if command.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let merged = match command.stderr {
            StderrMode::Merge => {
                let (reader, writer) = io::pipe().map_err(|e| command.spawn_error(e))?;
                let writer_clone = writer.try_clone().map_err(|e| command.spawn_error(e))?;
                cmd.stdout(writer_clone).stderr(writer);
                Some(reader)
            }
            StderrMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
                None
            }
            StderrMode::Discard => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::null());
                None
            }
        };

        // A timed-out tool is killed together with anything it started,
        // such as the external diff behind `svn diff --diff-cmd`.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if self.timeout.is_some() {
                cmd.process_group(0);
            }
        }

        let mut child = cmd.spawn().map_err(|e| command.spawn_error(e))?;
        // The Command still owns the parent's copies of the merged pipe's
        // write end; the reader only sees EOF once they are closed.
        drop(cmd);

        let stdout: Box<dyn Read + Send> = match merged {
            Some(reader) => Box::new(reader),
            None => match child.stdout.take() {
                Some(out) => Box::new(out),
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(VcError::Io(io::Error::other("child stdout was not captured")));
                }
            },
        };
        let stderr = child.stderr.take();
        Ok((child, stdout, stderr))
    }

    fn wait(&self, child: &mut Child, command: &ProcessCommand) -> VcResult<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                warn!(
                    program = %command.program_name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Process timed out, killing it"
                );
                kill_tree(child);
                let _ = child.wait();
                return Err(VcError::Timeout {
                    program: command.program_name(),
                    after: timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Kill the child's process group, falling back to the child alone.
#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Ok(pgid) = i32::try_from(child.id()) {
        if killpg(Pid::from_raw(pgid), Signal::SIGKILL).is_ok() {
            return;
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

fn read_all(mut reader: impl Read) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, io::Result<T>>) -> VcResult<T> {
    handle
        .join()
        .map_err(|_| VcError::Io(io::Error::other("pipe thread panicked")))?
        .map_err(VcError::Io)
}

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &ProcessCommand) -> VcResult<ProcessOutput> {
        debug!(
            program = %command.program().display(),
            args = ?command.args_lossy(),
            "Running external command"
        );

        let (mut child, stdout, stderr) = self.spawn(command)?;
        let stdin = child.stdin.take();

        let output = thread::scope(|scope| -> VcResult<ProcessOutput> {
            let writer = match (stdin, command.stdin.as_deref()) {
                (Some(mut pipe), Some(data)) => Some(scope.spawn(move || -> io::Result<()> {
                    let result = pipe.write_all(data);
                    drop(pipe);
                    match result {
                        // The tool may exit without reading all of its input.
                        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                        other => other,
                    }
                })),
                _ => None,
            };
            let out_reader = scope.spawn(move || read_all(stdout));
            let err_reader = stderr.map(|err| scope.spawn(move || read_all(err)));

            let status = self.wait(&mut child, command)?;

            let stdout = join(out_reader)?;
            let stderr = match err_reader {
                Some(handle) => join(handle)?,
                None => Vec::new(),
            };
            if let Some(handle) = writer {
                join(handle)?;
            }

            Ok(ProcessOutput {
                stdout,
                stderr,
                status: status.code(),
            })
        })?;

        debug!(
            program = %command.program_name(),
            status = ?output.status,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "External command finished"
        );
        Ok(output)
    }

    fn stream(&self, command: &ProcessCommand) -> VcResult<Box<dyn Read + Send>> {
        debug!(
            program = %command.program().display(),
            args = ?command.args_lossy(),
            "Streaming external command"
        );

        let (mut child, stdout, stderr) = self.spawn(command)?;
        if let (Some(mut pipe), Some(data)) = (child.stdin.take(), command.stdin.clone()) {
            thread::spawn(move || {
                let _ = pipe.write_all(&data);
            });
        }
        // Nobody reads a streamed command's separate stderr; drain it so
        // the child never blocks or dies writing there.
        if let Some(mut err) = stderr {
            thread::spawn(move || {
                let _ = io::copy(&mut err, &mut io::sink());
            });
        }

        Ok(Box::new(ProcessStream {
            reader: stdout,
            child,
            program: command.program_name(),
        }))
    }
}

/// Standard output of a running process. Dropping it reaps the process,
/// killing it first if it is still running.
pub struct ProcessStream {
    reader: Box<dyn Read + Send>,
    child: Child,
    program: String,
}

impl Read for ProcessStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            trace!(program = %self.program, "Killing unfinished streamed process");
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout_and_status() {
        let runner = SystemRunner::new();
        let cmd = ProcessCommand::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let output = runner.run(&cmd).unwrap();
        assert_eq!(output.stdout_lossy(), "out\n");
        assert_eq!(output.stderr_lossy(), "err\n");
        assert_eq!(output.status, Some(3));
        assert!(!output.success());
    }

    #[test]
    fn test_merge_interleaves_stderr() {
        let runner = SystemRunner::new();
        let cmd = ProcessCommand::new("sh")
            .args(["-c", "echo one; echo two >&2"])
            .stderr(StderrMode::Merge);
        let output = runner.run(&cmd).unwrap();
        assert_eq!(output.lines(), vec!["one", "two"]);
        assert!(output.stderr.is_empty());
    }

    #[test]
    fn test_large_stdin_does_not_deadlock() {
        let runner = SystemRunner::new();
        let input = "x".repeat(1 << 20);
        let cmd = ProcessCommand::new("cat").stdin(input.clone());
        let output = runner.run(&cmd).unwrap();
        assert_eq!(output.stdout.len(), input.len());
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let runner = SystemRunner::new();
        let err = runner
            .run(&ProcessCommand::new("definitely-not-a-real-vc-tool"))
            .unwrap_err();
        assert!(matches!(err, VcError::Spawn { .. }));
    }

    #[test]
    fn test_timeout_kills_child() {
        let runner = SystemRunner::with_timeout(Some(Duration::from_millis(100)));
        let err = runner
            .run(&ProcessCommand::new("sleep").arg("5"))
            .unwrap_err();
        assert!(matches!(err, VcError::Timeout { .. }));
    }

    #[test]
    fn test_timeout_kills_grandchildren_holding_the_pipe() {
        let runner = SystemRunner::with_timeout(Some(Duration::from_millis(100)));
        let started = Instant::now();
        let err = runner
            .run(&ProcessCommand::new("sh").args(["-c", "sleep 5 & sleep 5"]))
            .unwrap_err();
        assert!(matches!(err, VcError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_stream_reads_output() {
        let runner = SystemRunner::new();
        let mut stream = runner
            .stream(&ProcessCommand::new("sh").args(["-c", "printf 'a\\nb\\n'"]))
            .unwrap();
        let mut text = String::new();
        stream.read_to_string(&mut text).unwrap();
        assert_eq!(text, "a\nb\n");
    }

    #[test]
    fn test_program_name_strips_directories() {
        let cmd = ProcessCommand::new("/usr/local/bin/rlog").arg("-r");
        assert_eq!(cmd.program_name(), "rlog");
        assert_eq!(cmd.display(), "/usr/local/bin/rlog -r");
    }
}
