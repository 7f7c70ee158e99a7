//! Scripted command runner for unit tests

use std::cell::RefCell;

use crate::error::MountckError;
use crate::exe::{CommandOutput, CommandRunner, Invocation};

type Script = Box<dyn Fn(&Invocation) -> Result<CommandOutput, MountckError>>;

/// Records every invocation and answers from a script instead of the host.
pub struct ScriptedRunner {
    script: Script,
    log: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Invocation) -> Result<CommandOutput, MountckError> + 'static,
    {
        Self {
            script: Box::new(script),
            log: RefCell::new(Vec::new()),
        }
    }

    /// Rendered invocations, in call order
    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Rendered invocations of one program, in call order
    pub fn calls_to(&self, program: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.split(' ').next() == Some(program))
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, MountckError> {
        self.log.borrow_mut().push(invocation.render());
        (self.script)(invocation)
    }
}

pub fn ok(stdout: &str) -> Result<CommandOutput, MountckError> {
    Ok(CommandOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

pub fn fail(code: i32, stdout: &str, stderr: &str) -> Result<CommandOutput, MountckError> {
    Ok(CommandOutput {
        code: Some(code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    })
}

/// `kpartx -avs` output for `count` partitions of `loop0`
pub fn kpartx_lines(count: usize) -> String {
    (1..=count)
        .map(|i| format!("add map loop0p{i} (253:{}): 0 2048 linear 7:0 {}\n", i - 1, i * 2048))
        .collect()
}
