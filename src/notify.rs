use std::process::{Command, Stdio};

use tracing::{debug, warn};

/// Told that the persisted status changed; the observer re-reads what it needs.
pub trait StatusObserver: Send + Sync {
    fn status_changed(&self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StatusObserver for NoopObserver {
    fn status_changed(&self) {}
}

impl<F> StatusObserver for F
where
    F: Fn() + Send + Sync,
{
    fn status_changed(&self) {
        self()
    }
}

/// Runs a hook program on every change, e.g. a script that refreshes a
/// panel applet. The hook's exit status and failures are only logged.
#[derive(Debug, Clone)]
pub struct CommandObserver {
    program: String,
    args: Vec<String>,
}

impl CommandObserver {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits on whitespace: first word is the program.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self::new(program, words.collect()))
    }
}

impl StatusObserver for CommandObserver {
    fn status_changed(&self) {
        let out = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        match out {
            Ok(out) if out.status.success() => {
                debug!(program = %self.program, "notify hook ran");
            }
            Ok(out) => warn!(
                program = %self.program,
                code = out.status.code().unwrap_or(-1),
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "notify hook failed"
            ),
            Err(e) => warn!(program = %self.program, error = %e, "notify hook could not start"),
        }
    }
}
