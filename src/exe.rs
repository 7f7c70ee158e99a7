//! External command execution
//!
//! Every tool the harness drives (image builder, kpartx, mount, umount,
//! blkid) goes through [`CommandRunner`], so verification logic never talks
//! to `std::process` directly.

use std::ffi::{OsStr, OsString};
use std::process::{Command, Output};

use anyhow::anyhow;
use log::{debug, trace};

use crate::error::MountckError;

/// A command line to run: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Render the command line for logs and reports
    pub fn render(&self) -> String {
        let mut rendered = self.program.clone();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        rendered
    }
}

/// Captured result of a finished command.
///
/// A non-zero exit is data, not an error: callers decide whether it is an
/// expected failure (a partition that does not mount) or something else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Produce a string explaining the exit status of the process
    pub fn explain_exit(&self) -> String {
        match self.code {
            Some(code) => format!("process exited with status: {code}"),
            None => "process was terminated by a signal".to_string(),
        }
    }

    /// Get all available output, useful for reporting or debugging
    pub fn output_report(&self) -> String {
        let mut res = String::with_capacity(self.stdout.len() + self.stderr.len() + 20);

        if !self.stdout.is_empty() {
            res += &format!("stdout:\n{}\n", self.stdout);
        }

        if !self.stderr.is_empty() {
            if !res.is_empty() {
                res += "\n";
            }
            res += &format!("stderr:\n{}\n", self.stderr);
        }

        res
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into(),
            stderr: String::from_utf8_lossy(&output.stderr).into(),
        }
    }
}

/// Runs external commands and captures their output.
///
/// Blocks until the command exits. An `Err` means the command could not be
/// run at all.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, MountckError>;

    /// Run and turn a non-zero exit into an error carrying the output
    fn run_and_check(&self, invocation: &Invocation) -> anyhow::Result<()> {
        let output = self.run(invocation)?;
        if output.success() {
            return Ok(());
        }

        Err(match output.output_report() {
            s if !s.is_empty() => anyhow!("Process output:\n{}", s),
            _ => anyhow!("(No output was captured)"),
        }
        .context(output.explain_exit())
        .context(format!("Error when running: {}", invocation.render())))
    }
}

/// Runs commands on the host, optionally through `sudo`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    sudo: bool,
}

impl SystemRunner {
    pub fn new(sudo: bool) -> Self {
        Self { sudo }
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut command = if self.sudo {
            let mut command = Command::new("sudo");
            command.arg(invocation.program());
            command
        } else {
            Command::new(invocation.program())
        };
        command.args(invocation.args());
        command
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, MountckError> {
        let rendered = invocation.render();
        debug!("Executing '{rendered}'");

        let output: CommandOutput = self
            .command(invocation)
            .output()
            .map_err(|e| MountckError::external_tool_failed(invocation.program(), e.to_string()))?
            .into();

        trace!(
            "Executed '{rendered}': {}. Report:\n{}",
            output.explain_exit(),
            output.output_report(),
        );

        Ok(output)
    }
}
