// src/job/launcher.rs

//! Spawning external search-engine processes.
//!
//! Jobs talk to a [`ProcessLauncher`] rather than to `tokio::process`
//! directly, so tests can record command lines and fake the files a real
//! run would leave behind.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::Result;

use super::BoxFuture;

/// How a launched process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, or -1 when the process was terminated by a signal.
    pub code: i32,
    pub success: bool,
}

impl ExitReport {
    pub fn success() -> Self {
        Self { code: 0, success: true }
    }

    pub fn failed(code: i32) -> Self {
        Self { code, success: false }
    }
}

/// A program and its arguments, passed to the OS as an argument vector.
///
/// No shell sees the arguments, so paths reach the program byte for byte.
/// `Display` renders a shell-quoted line for logs only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl CommandLine {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<OsString>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Arguments as (lossy) strings.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display_quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", display_quote(&arg.to_string_lossy()))?;
        }
        Ok(())
    }
}

fn display_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Runs one command to completion.
pub trait ProcessLauncher: Send + Sync + fmt::Debug {
    fn launch<'a>(
        &'a self,
        command: &'a CommandLine,
        working_dir: &'a Path,
    ) -> BoxFuture<'a, Result<ExitReport>>;
}

/// Spawns the program directly and waits for exit.
///
/// No timeout: a hung process keeps its job admitted until it is killed
/// from outside.
#[derive(Debug, Clone, Default)]
pub struct DirectLauncher;

impl ProcessLauncher for DirectLauncher {
    fn launch<'a>(
        &'a self,
        command: &'a CommandLine,
        working_dir: &'a Path,
    ) -> BoxFuture<'a, Result<ExitReport>> {
        Box::pin(async move {
            let mut cmd = Command::new(&command.program);
            cmd.args(&command.args)
                .current_dir(working_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());

            info!(cmd = %command, dir = ?working_dir, "starting process");

            let mut child = cmd
                .spawn()
                .with_context(|| format!("spawning `{command}` in {working_dir:?}"))?;

            // Drain both pipes; a full pipe stalls the child.
            if let Some(stdout) = child.stdout.take() {
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stdout).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        debug!("stdout: {}", line);
                    }
                });
            }
            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        debug!("stderr: {}", line);
                    }
                });
            }

            let status = child
                .wait()
                .await
                .with_context(|| format!("waiting for `{command}`"))?;

            let report = ExitReport {
                code: status.code().unwrap_or(-1),
                success: status.success(),
            };
            info!(exit_code = report.code, success = report.success, "process exited");
            Ok(report)
        })
    }
}
