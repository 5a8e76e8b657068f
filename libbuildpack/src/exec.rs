//! External process execution.
//!
//! Buildpacks never spawn processes directly. They go through [`Context::exec`](crate::Context::exec),
//! which delegates to a [`CommandRunner`]. The runner is injected into the context so that tests
//! can replace real processes with scripted results.

use crate::write::{tee, SharedBuffer};
use crate::Env;
use crossbeam_utils::thread::ScopedJoinHandle;
use std::io::{self, Write};
use std::path::PathBuf;
use std::{mem, panic, process, thread};

/// A fully resolved command, ready to be run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// The complete environment of the process. The parent environment is not inherited.
    pub env: Env,
    pub current_dir: PathBuf,
    /// Whether the output should be streamed to the build log while the command runs.
    pub stream_output: bool,
}

impl CommandSpec {
    /// The command line as it is shown in logs and error messages.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The outcome of a process that ran to completion.
///
/// All output fields are trimmed of leading and trailing whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    /// Interleaved stdout and stderr, in the order the process wrote them.
    pub combined: String,
    pub exit_code: i32,
}

impl ExecResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExecError {
    #[error("Could not start {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Running {command:?} failed with exit code {}: {}", .result.exit_code, .result.combined)]
    NonZeroExit { command: String, result: ExecResult },
}

/// Runs commands on behalf of a [`Context`](crate::Context).
///
/// Implementations report a process that exits with a non-zero code as an `Ok` value. Deciding
/// whether that is an error is up to the caller.
pub trait CommandRunner {
    fn run(&self, command: &CommandSpec) -> Result<ExecResult, ExecError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &CommandSpec) -> Result<ExecResult, ExecError> {
        let spawn_error = |source| ExecError::Spawn {
            command: command.command_line(),
            source,
        };

        let mut stdout_buffer = Vec::new();
        let mut stderr_buffer = Vec::new();
        let combined = SharedBuffer::default();

        let (stdout_sink, stderr_sink): (Box<dyn Write + Send>, Box<dyn Write + Send>) =
            if command.stream_output {
                (Box::new(io::stdout()), Box::new(io::stderr()))
            } else {
                (Box::new(io::sink()), Box::new(io::sink()))
            };

        let child = process::Command::new(&command.program)
            .args(&command.args)
            .env_clear()
            .envs(&command.env)
            .current_dir(&command.current_dir)
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let status = write_child_process_output(
            child,
            tee(&mut stdout_buffer, tee(combined.clone(), stdout_sink)),
            tee(&mut stderr_buffer, tee(combined.clone(), stderr_sink)),
        )
        .and_then(|mut child| child.wait())
        .map_err(spawn_error)?;

        Ok(ExecResult {
            stdout: String::from_utf8_lossy(&stdout_buffer).trim().to_string(),
            stderr: String::from_utf8_lossy(&stderr_buffer).trim().to_string(),
            combined: String::from_utf8_lossy(&combined.into_bytes())
                .trim()
                .to_string(),
            // Processes killed by a signal have no exit code.
            exit_code: status.code().unwrap_or(-1),
        })
    }
}

fn write_child_process_output<OW: Write + Send, EW: Write + Send>(
    mut child: process::Child,
    mut stdout_writer: OW,
    mut stderr_writer: EW,
) -> io::Result<process::Child> {
    // stdout and stderr are copied in parallel so interleaved output stays interleaved when it
    // is streamed to the log. Scoped threads allow the writers to borrow local buffers.
    unwind_panic(crossbeam_utils::thread::scope(|scope| {
        let stdout_copy_thread = mem::take(&mut child.stdout)
            .map(|mut stdout| scope.spawn(move |_| io::copy(&mut stdout, &mut stdout_writer)));

        let stderr_copy_thread = mem::take(&mut child.stderr)
            .map(|mut stderr| scope.spawn(move |_| io::copy(&mut stderr, &mut stderr_writer)));

        let stdout_copy_result = stdout_copy_thread.map_or_else(|| Ok(0), join_and_unwind_panic);
        let stderr_copy_result = stderr_copy_thread.map_or_else(|| Ok(0), join_and_unwind_panic);

        stdout_copy_result.and(stderr_copy_result).map(|_| child)
    }))
}

fn join_and_unwind_panic<T>(h: ScopedJoinHandle<T>) -> T {
    unwind_panic(h.join())
}

fn unwind_panic<T>(t: thread::Result<T>) -> T {
    match t {
        Ok(value) => value,
        Err(err) => panic::resume_unwind(err),
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandRunner, CommandSpec, ExecError, SystemCommandRunner};
    use crate::Env;

    fn spec(program: &str, args: &[&str]) -> CommandSpec {
        let mut env = Env::new();
        if let Some(path) = std::env::var_os("PATH") {
            env.insert("PATH", path);
        }

        CommandSpec {
            program: String::from(program),
            args: args.iter().map(ToString::to_string).collect(),
            env,
            current_dir: std::env::temp_dir(),
            stream_output: false,
        }
    }

    #[test]
    #[cfg(unix)]
    fn captures_stdout_stderr_and_exit_code() {
        let result = SystemCommandRunner
            .run(&spec("sh", &["-c", "echo out; echo err >&2; exit 3"]))
            .unwrap();

        assert_eq!(result.stdout, "out");
        assert_eq!(result.stderr, "err");
        assert!(result.combined.contains("out"));
        assert!(result.combined.contains("err"));
        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
    }

    #[test]
    #[cfg(unix)]
    fn does_not_inherit_the_parent_environment() {
        let mut command = spec("sh", &["-c", "printf %s \"$PYTHONUSERBASE\""]);
        command.env.insert("PYTHONUSERBASE", "/layers/pip");

        let result = SystemCommandRunner.run(&command).unwrap();

        assert_eq!(result.stdout, "/layers/pip");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let result = SystemCommandRunner.run(&spec("this-program-does-not-exist-42", &[]));

        assert!(matches!(result, Err(ExecError::Spawn { .. })));
    }

    #[test]
    fn command_line_joins_program_and_args() {
        assert_eq!(
            spec("python3", &["-m", "pip", "check"]).command_line(),
            "python3 -m pip check"
        );
    }
}
