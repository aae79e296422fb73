//! Container engine seam: runs external image-builder commands.

use async_trait::async_trait;
use gantry_core::{Error, Result};
use std::fmt;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

/// Output line from a running command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub content: String,
}

impl OutputLine {
    pub fn stdout(content: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stdout,
            content: content.into(),
        }
    }

    pub fn stderr(content: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stderr,
            content: content.into(),
        }
    }
}

/// Output stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// A single command line handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The subcommand, e.g. `build` for `docker build ...`.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Trait for running image-builder commands.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Run a command to completion, streaming its output lines to the
    /// provided channel. Returns the exit code.
    async fn run(&self, invocation: &Invocation, output_tx: mpsc::Sender<OutputLine>) -> Result<i32>;
}

/// Engine that spawns a docker-compatible CLI (docker, podman) on the host.
#[derive(Debug, Clone, Default)]
pub struct DockerEngine;

impl DockerEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn run(&self, invocation: &Invocation, output_tx: mpsc::Sender<OutputLine>) -> Result<i32> {
        let start = std::time::Instant::now();

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::BuildTask(format!("Failed to spawn `{}`: {}", invocation, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("stderr was not captured".to_string()))?;

        let stdout_handle = tokio::spawn(forward_lines(stdout, OutputStream::Stdout, output_tx.clone()));
        let stderr_handle = tokio::spawn(forward_lines(stderr, OutputStream::Stderr, output_tx));

        let status = child.wait().await?;

        // Wait for output streaming to complete
        let _ = stdout_handle.await;
        let _ = stderr_handle.await;

        let exit_code = status.code().unwrap_or(-1);
        debug!(
            command = %invocation,
            exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "Command completed"
        );

        Ok(exit_code)
    }
}

async fn forward_lines<R>(reader: R, stream: OutputStream, tx: mpsc::Sender<OutputLine>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let output = OutputLine {
            stream,
            content: line,
        };
        if tx.send(output).await.is_err() {
            break;
        }
    }
}
