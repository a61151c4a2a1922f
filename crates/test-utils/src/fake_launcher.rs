use std::path::{Path, PathBuf};
use std::sync::Mutex;

use msrunner::errors::{OrchestratorError, Result};
use msrunner::fs::mock::MockFileSystem;
use msrunner::job::{BoxFuture, CommandLine, ExitReport, ProcessLauncher};

/// A launcher that records commands and, instead of running anything,
/// writes the files the real search engine would have produced.
///
/// Matching is done on the rendered command line (`CommandLine`'s
/// `Display`).
#[derive(Debug)]
pub struct RecordingLauncher {
    fs: MockFileSystem,
    outputs: Vec<(String, Vec<(PathBuf, String)>)>,
    broken: Vec<String>,
    launched: Mutex<Vec<(CommandLine, PathBuf)>>,
}

impl RecordingLauncher {
    pub fn new(fs: &MockFileSystem) -> Self {
        Self {
            fs: fs.clone(),
            outputs: Vec::new(),
            broken: Vec::new(),
            launched: Mutex::new(Vec::new()),
        }
    }

    /// When a launched command line contains `needle`, create empty `files`.
    pub fn produces(self, needle: &str, files: &[&str]) -> Self {
        let files: Vec<(&str, &str)> = files.iter().map(|f| (*f, "")).collect();
        self.produces_with(needle, &files)
    }

    /// Like [`RecordingLauncher::produces`], with contents per file.
    pub fn produces_with(mut self, needle: &str, files: &[(&str, &str)]) -> Self {
        let files = files
            .iter()
            .map(|(path, contents)| (PathBuf::from(path), contents.to_string()))
            .collect();
        self.outputs.push((needle.to_string(), files));
        self
    }

    /// When a launched command line contains `needle`, fail to spawn.
    pub fn fails_to_spawn(mut self, needle: &str) -> Self {
        self.broken.push(needle.to_string());
        self
    }

    /// Commands launched so far, in order.
    pub fn commands(&self) -> Vec<CommandLine> {
        self.launched
            .lock()
            .unwrap()
            .iter()
            .map(|(cmd, _)| cmd.clone())
            .collect()
    }

    /// Rendered command lines launched so far, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.commands().iter().map(ToString::to_string).collect()
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn launch<'a>(
        &'a self,
        command: &'a CommandLine,
        working_dir: &'a Path,
    ) -> BoxFuture<'a, Result<ExitReport>> {
        Box::pin(async move {
            self.launched
                .lock()
                .unwrap()
                .push((command.clone(), working_dir.to_path_buf()));
            let command_line = command.to_string();

            if self.broken.iter().any(|n| command_line.contains(n.as_str())) {
                return Err(OrchestratorError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "program not found",
                )));
            }

            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            for (needle, files) in &self.outputs {
                if command_line.contains(needle.as_str()) {
                    for (file, contents) in files {
                        self.fs.add_file(file, contents.as_bytes());
                    }
                }
            }
            Ok(ExitReport::success())
        })
    }
}
