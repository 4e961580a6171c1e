use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::LauncherError;

const SHELL: &str = "sh";

/// Program tokens, environment overrides and working directory for one child
/// process. The first token is the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    tokens: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

impl CommandInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            tokens: vec![program.into()],
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    pub fn from_tokens(tokens: Vec<String>) -> Result<Self, LauncherError> {
        match tokens.first() {
            Some(program) if !program.trim().is_empty() => Ok(Self {
                tokens,
                env: BTreeMap::new(),
                cwd: None,
            }),
            _ => Err(LauncherError::InvalidArgument(
                "command has no program to run".to_string(),
            )),
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.tokens.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(&mut self, env: &BTreeMap<String, String>) -> &mut Self {
        for (key, value) in env {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    pub fn arguments(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Shell-quoted rendering for logs and error messages.
    pub fn render(&self) -> String {
        shell_words::join(self.tokens())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }
}

pub trait ProcessRunner {
    fn run(
        &self,
        invocation: &CommandInvocation,
        capture_output: bool,
    ) -> Result<CommandOutput, io::Error>;
}

pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        invocation: &CommandInvocation,
        capture_output: bool,
    ) -> Result<CommandOutput, io::Error> {
        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.arguments());
        for (key, value) in invocation.env_overrides() {
            cmd.env(key, value);
        }
        if let Some(dir) = invocation.cwd() {
            cmd.current_dir(dir);
        }
        if capture_output {
            let output = cmd.output()?;
            let status_code =
                output
                    .status
                    .code()
                    .unwrap_or(if output.status.success() { 0 } else { 1 });
            Ok(CommandOutput {
                status_code,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        } else {
            let status = cmd.status()?;
            let status_code = status
                .code()
                .unwrap_or(if status.success() { 0 } else { 1 });
            Ok(CommandOutput {
                status_code,
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        }
    }
}

/// A command given either as one command line or as explicit tokens.
///
/// A command line is handed to `sh -c` as a single argument, so variables,
/// redirections and globs in it are expanded by the shell. Tokens are run
/// directly. `"wine winecfg"` and `["wine", "winecfg"]` have the same effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    Line(String),
    Tokens(Vec<String>),
}

impl CommandLine {
    pub fn into_tokens(self) -> Result<Vec<String>, LauncherError> {
        let tokens = match self {
            CommandLine::Line(line) => {
                // unbalanced quoting fails here, not inside the shell
                let words = shell_words::split(&line).map_err(|err| {
                    LauncherError::InvalidArgument(format!("cannot parse command `{line}`: {err}"))
                })?;
                if words.is_empty() {
                    Vec::new()
                } else {
                    vec![SHELL.to_string(), "-c".to_string(), line]
                }
            }
            CommandLine::Tokens(tokens) => tokens,
        };
        if tokens.is_empty() {
            return Err(LauncherError::InvalidArgument(
                "command is empty".to_string(),
            ));
        }
        Ok(tokens)
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        CommandLine::Line(line.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(line: String) -> Self {
        CommandLine::Line(line)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(tokens: Vec<String>) -> Self {
        CommandLine::Tokens(tokens)
    }
}

impl<const N: usize> From<[&str; N]> for CommandLine {
    fn from(tokens: [&str; N]) -> Self {
        CommandLine::Tokens(tokens.iter().map(|t| t.to_string()).collect())
    }
}

fn spawn_error(err: &io::Error, invocation: &CommandInvocation) -> LauncherError {
    if err.kind() == io::ErrorKind::NotFound {
        return LauncherError::Process(format!(
            "`{}` was not found; install it and make sure it is on your PATH",
            invocation.program()
        ));
    }
    LauncherError::Process(format!(
        "failed to run command `{}`: {err}",
        invocation.render()
    ))
}

/// Runs `invocation` with inherited standard streams and returns its exit code.
pub fn run_inherited(
    runner: &dyn ProcessRunner,
    invocation: &CommandInvocation,
) -> Result<i32, LauncherError> {
    debug!(command = %invocation.render(), "running");
    let output = runner
        .run(invocation, false)
        .map_err(|err| spawn_error(&err, invocation))?;
    debug!(status = output.status_code, "command finished");
    Ok(output.status_code)
}

/// Runs `invocation` and captures stdout and stderr.
pub fn run_captured(
    runner: &dyn ProcessRunner,
    invocation: &CommandInvocation,
) -> Result<CommandOutput, LauncherError> {
    debug!(command = %invocation.render(), "running (captured)");
    runner
        .run(invocation, true)
        .map_err(|err| spawn_error(&err, invocation))
}

/// Runs a command with `env` applied to the child only. Blocks until the child
/// exits and returns its exit code; a non-zero code is not an error here.
pub fn execute(
    runner: &dyn ProcessRunner,
    command: impl Into<CommandLine>,
    env: &BTreeMap<String, String>,
) -> Result<i32, LauncherError> {
    let tokens = command.into().into_tokens()?;
    let mut invocation = CommandInvocation::from_tokens(tokens)?;
    invocation.envs(env);
    run_inherited(runner, &invocation)
}

/// The Wine prefix every launcher command runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinePrefix {
    path: PathBuf,
    arch: String,
}

impl WinePrefix {
    pub fn new(path: impl Into<PathBuf>, arch: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            arch: arch.into(),
        }
    }

    pub fn env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(
            "WINEPREFIX".to_string(),
            self.path.to_string_lossy().to_string(),
        );
        env.insert("WINEARCH".to_string(), self.arch.clone());
        env
    }

    pub fn execute(
        &self,
        runner: &dyn ProcessRunner,
        command: impl Into<CommandLine>,
    ) -> Result<i32, LauncherError> {
        execute(runner, command, &self.env())
    }
}
