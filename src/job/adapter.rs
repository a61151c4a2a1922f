// src/job/adapter.rs

//! In-process analysis tasks behind the [`Job`] interface, so they can be
//! weighted and chained with external stages.
//!
//! Each [`AnalysisTask`] case brings its own work and its own "is the output
//! artifact there" check. Adding a task kind means adding a case here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use tracing::{debug, info};

use crate::errors::Result;
use crate::fs::FileSystem;

use super::oracle::FilePattern;
use super::{BoxFuture, CompletionFuture, Job, JobSpec, dependency_value};

/// Column holding the PSM q-value in search result tables.
pub const Q_VALUE_COLUMN: &str = "QValue";

/// Per-PSM result tables. Peptide and protein-group tables share the
/// extension and are skipped.
const PSM_TABLE_PATTERN: &str = "*PSMs.psmtsv";

/// The in-process analyses the orchestrator knows how to run.
#[derive(Debug, Clone)]
pub enum AnalysisTask {
    /// Count PSMs at or below `q_value_cutoff` in every result table of the
    /// input and write a `File\tPSMs` table.
    PsmSummary {
        output_file: PathBuf,
        q_value_cutoff: f64,
    },
    /// Concatenate the tables matching `pattern` in the input directory
    /// under a single header.
    MergeTables {
        pattern: String,
        output_file: PathBuf,
    },
}

impl AnalysisTask {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisTask::PsmSummary { .. } => "psm-summary",
            AnalysisTask::MergeTables { .. } => "merge-tables",
        }
    }

    /// The artifact whose existence means the task has run.
    pub fn output_file(&self) -> &Path {
        match self {
            AnalysisTask::PsmSummary { output_file, .. } => output_file,
            AnalysisTask::MergeTables { output_file, .. } => output_file,
        }
    }

    /// Whether the task's output is present; returns its result value.
    fn completed_result(&self, fs: &dyn FileSystem) -> Option<String> {
        match self {
            AnalysisTask::PsmSummary { output_file, .. } => {
                fs.is_file(output_file).then(|| output_file.display().to_string())
            }
            AnalysisTask::MergeTables { output_file, .. } => {
                fs.is_file(output_file).then(|| output_file.display().to_string())
            }
        }
    }

    fn execute(&self, fs: &dyn FileSystem, input: &Path) -> anyhow::Result<()> {
        match self {
            AnalysisTask::PsmSummary {
                output_file,
                q_value_cutoff,
            } => summarize_psms(fs, input, output_file, *q_value_cutoff),
            AnalysisTask::MergeTables {
                pattern,
                output_file,
            } => merge_tables(fs, input, pattern, output_file),
        }
    }
}

fn input_tables(
    fs: &dyn FileSystem,
    input: &Path,
    pattern: &FilePattern,
    exclude: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    if fs.is_file(input) {
        return Ok(vec![input.to_path_buf()]);
    }
    let tables: Vec<_> = fs
        .list_files(input)?
        .into_iter()
        .filter(|f| pattern.matches(f) && f != exclude)
        .collect();
    if tables.is_empty() {
        bail!("no input tables found in {:?}", input);
    }
    Ok(tables)
}

fn summarize_psms(
    fs: &dyn FileSystem,
    input: &Path,
    output_file: &Path,
    cutoff: f64,
) -> anyhow::Result<()> {
    let pattern = FilePattern::new(PSM_TABLE_PATTERN)?;
    let mut out = String::from("File\tPSMs\n");

    for table in input_tables(fs, input, &pattern, output_file)? {
        let contents = fs.read_to_string(&table)?;
        let mut lines = contents.lines();
        let header = lines
            .next()
            .ok_or_else(|| anyhow!("{:?} is empty", table))?;
        let column = header
            .split('\t')
            .position(|c| c.trim() == Q_VALUE_COLUMN)
            .ok_or_else(|| anyhow!("{:?} has no {} column", table, Q_VALUE_COLUMN))?;

        let mut passing = 0usize;
        for (i, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let field = line.split('\t').nth(column).unwrap_or("").trim();
            let q: f64 = field
                .parse()
                .with_context(|| format!("{:?} line {}: bad q-value {:?}", table, i + 2, field))?;
            if q <= cutoff {
                passing += 1;
            }
        }

        let name = table
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(table = %name, passing, "counted PSMs");
        out.push_str(&format!("{name}\t{passing}\n"));
    }

    fs.write(output_file, out.as_bytes())
}

fn merge_tables(
    fs: &dyn FileSystem,
    input: &Path,
    pattern: &str,
    output_file: &Path,
) -> anyhow::Result<()> {
    let pattern = FilePattern::new(pattern)?;
    let mut header: Option<String> = None;
    let mut out = String::new();

    for table in input_tables(fs, input, &pattern, output_file)? {
        let contents = fs.read_to_string(&table)?;
        let mut lines = contents.lines();
        let Some(this_header) = lines.next() else {
            continue;
        };
        match &header {
            None => {
                out.push_str(this_header);
                out.push('\n');
                header = Some(this_header.to_string());
            }
            Some(h) if h != this_header => {
                bail!("{:?} has a different header than the tables before it", table);
            }
            Some(_) => {}
        }
        for line in lines.filter(|l| !l.trim().is_empty()) {
            out.push_str(line);
            out.push('\n');
        }
    }

    fs.write(output_file, out.as_bytes())
}

/// Adapter running an [`AnalysisTask`] as a schedulable job.
///
/// The task reads from its dependency's result (a directory or a file), or
/// from the working directory when it has no dependency.
#[derive(Debug)]
pub struct TaskJob {
    spec: JobSpec,
    task: AnalysisTask,
    fs: Arc<dyn FileSystem>,
    completion: CompletionFuture,
}

impl TaskJob {
    pub fn new(spec: JobSpec, task: AnalysisTask, fs: Arc<dyn FileSystem>) -> Result<Self> {
        if let AnalysisTask::MergeTables { pattern, .. } = &task {
            FilePattern::new(pattern)?;
        }
        Ok(Self {
            spec,
            task,
            fs,
            completion: CompletionFuture::new(),
        })
    }

    pub fn task(&self) -> &AnalysisTask {
        &self.task
    }

    async fn input(&self) -> PathBuf {
        match dependency_value(&self.spec).await {
            Some(value) => PathBuf::from(value),
            None => self.spec.working_dir.clone(),
        }
    }
}

impl Job for TaskJob {
    fn spec(&self) -> &JobSpec {
        &self.spec
    }

    fn completion(&self) -> &CompletionFuture {
        &self.completion
    }

    fn has_started_externally(&self) -> bool {
        self.task.completed_result(self.fs.as_ref()).is_some()
    }

    fn watched_path(&self) -> Option<&Path> {
        Some(self.task.output_file())
    }

    fn is_completed(&self) -> bool {
        match self.task.completed_result(self.fs.as_ref()) {
            Some(result) => {
                if self.completion.resolve(result.as_str()) {
                    info!(job = %self.spec.summary, result = %result, "task output written");
                }
                true
            }
            None => false,
        }
    }

    fn prompt(&self) -> BoxFuture<'_, String> {
        Box::pin(async move {
            let input = self.input().await;
            format!(
                "{} {} -> {}",
                self.task.name(),
                input.display(),
                self.task.output_file().display()
            )
        })
    }

    fn run(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let input = self.input().await;
            info!(
                job = %self.spec.summary,
                task = self.task.name(),
                input = ?input,
                "running in-process task"
            );

            let fs = Arc::clone(&self.fs);
            let task = self.task.clone();
            tokio::task::spawn_blocking(move || task.execute(fs.as_ref(), &input))
                .await
                .map_err(|e| anyhow!("{} task panicked: {e}", self.task.name()))??;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    const HEADER: &str = "File Name\tScan Number\tQValue";

    fn summary_job(fs: &MockFileSystem, dep: &CompletionFuture) -> TaskJob {
        TaskJob::new(
            JobSpec::new("summarize PSMs", 0.5).depends_on(dep.clone()),
            AnalysisTask::PsmSummary {
                output_file: PathBuf::from("/report/psms.tsv"),
                q_value_cutoff: 0.01,
            },
            Arc::new(fs.clone()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn psm_summary_counts_rows_under_the_cutoff() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/search/a_PSMs.psmtsv",
            format!("{HEADER}\na.raw\t1\t0.001\na.raw\t2\t0.01\na.raw\t3\t0.2\n"),
        );
        fs.add_file("/search/b_PSMs.psmtsv", format!("{HEADER}\nb.raw\t7\t0.5\n"));
        fs.add_file("/search/notes.txt", "ignored");
        fs.add_file(
            "/search/AllPeptides.psmtsv",
            format!("{HEADER}\na.raw\t1\t0.001\n"),
        );
        fs.add_file("/search/AllProteinGroups.psmtsv", "Protein\tQValue\nP1\t0\n");

        let dep = CompletionFuture::new();
        dep.resolve("/search");
        let job = summary_job(&fs, &dep);

        assert!(!job.has_started_externally());
        job.run().await.unwrap();
        assert!(job.is_completed());
        assert_eq!(job.completion().value().as_deref(), Some("/report/psms.tsv"));

        let written = fs.read_to_string(Path::new("/report/psms.tsv")).unwrap();
        assert_eq!(written, "File\tPSMs\na_PSMs.psmtsv\t2\nb_PSMs.psmtsv\t0\n");
    }

    #[tokio::test]
    async fn psm_summary_rejects_tables_without_q_values() {
        let fs = MockFileSystem::new();
        fs.add_file("/search/a_PSMs.psmtsv", "File Name\tScore\na.raw\t12\n");
        let dep = CompletionFuture::new();
        dep.resolve("/search");

        let err = summary_job(&fs, &dep).run().await.unwrap_err();
        assert!(err.to_string().contains("QValue"));
        assert!(!fs.exists(Path::new("/report/psms.tsv")));
    }

    #[tokio::test]
    async fn merge_keeps_one_header() {
        let fs = MockFileSystem::new();
        fs.add_file("/in/a.tsv", "x\ty\n1\t2\n");
        fs.add_file("/in/b.tsv", "x\ty\n3\t4\n\n");
        let job = TaskJob::new(
            JobSpec::new("merge", 0.1).with_working_dir("/in"),
            AnalysisTask::MergeTables {
                pattern: "*.tsv".to_string(),
                output_file: PathBuf::from("/in/merged.tsv"),
            },
            Arc::new(fs.clone()),
        )
        .unwrap();

        assert_eq!(job.prompt().await, "merge-tables /in -> /in/merged.tsv");
        job.run().await.unwrap();
        let merged = fs.read_to_string(Path::new("/in/merged.tsv")).unwrap();
        assert_eq!(merged, "x\ty\n1\t2\n3\t4\n");

        // A rerun must not pick up its own output.
        job.run().await.unwrap();
        assert_eq!(fs.read_to_string(Path::new("/in/merged.tsv")).unwrap(), merged);
    }

    #[tokio::test]
    async fn merge_refuses_mismatched_headers() {
        let fs = MockFileSystem::new();
        fs.add_file("/in/a.tsv", "x\ty\n1\t2\n");
        fs.add_file("/in/b.tsv", "x\tz\n3\t4\n");
        let job = TaskJob::new(
            JobSpec::new("merge", 0.1).with_working_dir("/in"),
            AnalysisTask::MergeTables {
                pattern: "*.tsv".to_string(),
                output_file: PathBuf::from("/out/merged.tsv"),
            },
            Arc::new(fs),
        )
        .unwrap();

        assert!(job.run().await.is_err());
        assert!(!job.is_completed());
    }

    #[test]
    fn invalid_merge_pattern_is_rejected_up_front() {
        let res = TaskJob::new(
            JobSpec::new("merge", 0.1),
            AnalysisTask::MergeTables {
                pattern: "[".to_string(),
                output_file: PathBuf::from("/out/merged.tsv"),
            },
            Arc::new(MockFileSystem::new()),
        );
        assert!(res.is_err());
    }
}
