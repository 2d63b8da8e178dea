//! Utilities for running external commands with explicit exit status capture and timeouts

use std::borrow::Cow;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

/// Number of stderr lines kept when reporting a failed command
pub const STDERR_TAIL_LINES: usize = 20;

/// Result of a process that ran to completion (successfully or not)
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last lines of stderr, for error reports
    pub fn stderr_tail(&self) -> String {
        tail_lines(&self.stderr, STDERR_TAIL_LINES)
    }
}

/// The process could not be run to completion at all
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("Failed to start async runtime for {program}: {source}")]
    Runtime {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run a command with optional timeout
///
/// A non-zero exit status is not an error here: the caller inspects
/// [`CommandOutput::exit_code`] and decides.
pub fn run_command(
    program: &str,
    args: &[&str],
    working_dir: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<CommandOutput, CommandError> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    // Own process group: a terminal Ctrl-C reaches only the manager
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("Running command: {} {}", program, redact_args(args).join(" "));

    let output = if let Some(timeout_duration) = timeout {
        // Each call gets its own runtime so it works from any worker thread
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| CommandError::Runtime {
                program: program.to_string(),
                source,
            })?;

        runtime.block_on(async {
            let mut async_cmd = tokio::process::Command::from(cmd);
            async_cmd.kill_on_drop(true);

            match tokio::time::timeout(timeout_duration, async_cmd.output()).await {
                Ok(output) => output.map_err(|source| CommandError::Spawn {
                    program: program.to_string(),
                    source,
                }),
                Err(_) => Err(CommandError::TimedOut {
                    program: program.to_string(),
                    timeout: timeout_duration,
                }),
            }
        })?
    } else {
        cmd.output().map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?
    };

    let result = CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    if result.success() {
        if !result.stdout.is_empty() {
            debug!("Command output: {}", result.stdout.trim_end());
        }
    } else {
        warn!(
            "Command {} exited with {:?}: {}",
            program,
            result.exit_code,
            result.stderr_tail()
        );
    }

    Ok(result)
}

/// Keep the last `max_lines` non-empty lines of `text`
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Hide passwords embedded in connection URLs or passed as arguments
fn redact_args<'a>(args: &[&'a str]) -> Vec<Cow<'a, str>> {
    args.iter()
        .map(|&arg| {
            let (flag, value) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with('-') => (Some(flag), value),
                _ => (None, arg),
            };

            match url::Url::parse(value) {
                Ok(mut parsed) if parsed.password().is_some() => {
                    let _ = parsed.set_password(Some("***"));
                    match flag {
                        Some(flag) => Cow::Owned(format!("{}={}", flag, parsed)),
                        None => Cow::Owned(parsed.to_string()),
                    }
                }
                _ => Cow::Borrowed(arg),
            }
        })
        .collect()
}
