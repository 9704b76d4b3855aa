use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Outcome of an external verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Success,
    Failure(String),
}

impl Signal {
    pub fn is_success(&self) -> bool {
        matches!(self, Signal::Success)
    }
}

/// Boundary to whatever decides that an applied group left the project healthy
pub trait Verifier {
    fn verify(&mut self, root: &Path) -> Signal;
}

/// Runs a shell command in the project root; exit status 0 means success
pub struct ShellVerifier {
    command: String,
}

impl ShellVerifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut command = Command::new("cmd");
            command.arg("/C").arg(&self.command);
            command
        } else {
            let mut command = Command::new("sh");
            command.arg("-c").arg(&self.command);
            command
        }
    }
}

impl Verifier for ShellVerifier {
    fn verify(&mut self, root: &Path) -> Signal {
        info!("Verifying with: {}", self.command);
        let output = match self.shell().current_dir(root).output() {
            Ok(output) => output,
            Err(e) => return Signal::Failure(format!("could not run '{}': {}", self.command, e)),
        };

        if output.status.success() {
            debug!("Verify command succeeded");
            return Signal::Success;
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        let mut detail = match output.status.code() {
            Some(code) => format!("'{}' exited with status {}", self.command, code),
            None => format!("'{}' was terminated by a signal", self.command),
        };
        if !tail.is_empty() {
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            detail.push_str(": ");
            detail.push_str(&tail.join(" | "));
        }
        Signal::Failure(detail)
    }
}
