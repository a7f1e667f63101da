//! Capabilities injected by the host
//!
//! Steps reach external services only through `ExternalContext`, a keyed
//! lookup of capability objects. The core ships one capability, the
//! `ProcessRunner`, with a `std::process` implementation.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{ErrorBuilder, ErrorCode};

/// Key under which the process runner is registered
pub const PROCESS_RUNNER: &str = "ProcessRunner";

/// Keyed capability objects
#[derive(Default)]
pub struct ExternalContext {
    entries: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl ExternalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context holding the system process runner
    pub fn with_defaults() -> Self {
        Self::new().with(
            PROCESS_RUNNER,
            Arc::new(SystemProcessRunner::default()) as Arc<dyn ProcessRunner>,
        )
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.entries.insert(key.to_string(), Box::new(value));
    }

    pub fn with<T: Any + Send + Sync>(mut self, key: &str, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up the capability registered under `key` as a `T`
    pub fn try_get_context<T: Clone + 'static>(&self, key: &str) -> Result<T, ErrorBuilder> {
        self.entries
            .get(key)
            .and_then(|entry| entry.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| ErrorCode::MissingContext(key.to_string()).into())
    }

    pub fn process_runner(&self) -> Result<Arc<dyn ProcessRunner>, ErrorBuilder> {
        self.try_get_context::<Arc<dyn ProcessRunner>>(PROCESS_RUNNER)
    }
}

impl fmt::Debug for ExternalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalContext")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/* ===================== Processes ===================== */

/// Captured result of an external process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external processes
pub trait ProcessRunner: Send + Sync {
    /// Run `path` to completion. Cancelling the token stops the process and
    /// returns `Cancelled`.
    fn run(
        &self,
        path: &str,
        arguments: &[String],
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ErrorBuilder>;
}

/// `ProcessRunner` backed by `std::process`
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    poll_interval: Duration,
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}

fn process_error(path: &str, message: impl fmt::Display) -> ErrorBuilder {
    ErrorCode::ExternalProcessError {
        path: path.to_string(),
        message: message.to_string(),
    }
    .into()
}

fn read_all(mut pipe: impl Read + Send + 'static) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

impl ProcessRunner for SystemProcessRunner {
    fn run(
        &self,
        path: &str,
        arguments: &[String],
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ErrorBuilder> {
        debug!(path = %path, ?arguments, "starting external process");

        let mut child = Command::new(path)
            .args(arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| process_error(path, &e).with_cause(e))?;

        let stdout = child.stdout.take().map(read_all);
        let stderr = child.stderr.take().map(read_all);

        let status = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ErrorCode::Cancelled.into());
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => std::thread::sleep(self.poll_interval),
                Err(e) => return Err(process_error(path, &e).with_cause(e)),
            }
        };

        let collect = |handle: Option<std::thread::JoinHandle<String>>| {
            handle.and_then(|h| h.join().ok()).unwrap_or_default()
        };

        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}
