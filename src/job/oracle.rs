// src/job/oracle.rs

//! Completion oracles: decide from a job's output directory whether some run
//! of it has started or finished.
//!
//! No marker files or IPC are involved. A stage is done when the artifacts it
//! produces are present in the expected number, so the same checks work for
//! runs of this process, a crashed earlier run, or another machine writing to
//! the same share.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use tracing::trace;

use crate::fs::FileSystem;

/// Extension of spectra files written by calibration and averaging.
pub const SPECTRA_EXTENSION: &str = "mzML";

/// Extension of per-file and summary search results.
pub const SEARCH_RESULT_EXTENSION: &str = "psmtsv";

/// Extension of spectral library files.
pub const LIBRARY_EXTENSION: &str = "msp";

/// Result files a search writes beyond one per input (all PSMs, peptides,
/// protein groups).
pub const SEARCH_AUX_RESULT_FILES: usize = 3;

pub const CALIBRATION_MARKER: &str = "-calib";
pub const AVERAGING_MARKER: &str = "-averaged";

/// Completion predicate of one job kind.
pub trait CompletionOracle: Send + Sync + fmt::Debug {
    /// Directory holding this job's own result files. Stages may share an
    /// output directory; each has its own results subdirectory.
    fn results_dir(&self) -> &Path;

    /// Some run of the job has begun once its results directory exists.
    fn has_started(&self, fs: &dyn FileSystem) -> bool {
        fs.is_dir(self.results_dir())
    }

    /// The job's result value if its outputs are complete.
    fn completed_result(&self, fs: &dyn FileSystem) -> Option<String>;
}

/// Case-insensitive file-name pattern such as `*.psmtsv`.
#[derive(Debug, Clone)]
pub struct FilePattern {
    matcher: GlobMatcher,
}

impl FilePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid file pattern {pattern:?}"))?;
        Ok(Self {
            matcher: glob.compile_matcher(),
        })
    }

    /// Pattern for every file with the given extension.
    pub fn extension(ext: &str) -> Result<Self> {
        Self::new(&format!("*.{}", globset::escape(ext)))
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.matcher.is_match(Path::new(name)))
    }

    /// Matching files directly inside `dir`; a missing directory has none.
    pub fn files_in(&self, fs: &dyn FileSystem, dir: &Path) -> Vec<PathBuf> {
        match fs.list_files(dir) {
            Ok(files) => files.into_iter().filter(|f| self.matches(f)).collect(),
            Err(err) => {
                trace!(dir = ?dir, error = %err, "cannot list results directory");
                Vec::new()
            }
        }
    }
}

/// Calibration and averaging: one marked spectra file per input.
#[derive(Debug, Clone)]
pub struct MarkedSpectraOracle {
    results_dir: PathBuf,
    expected: usize,
    data_files: FilePattern,
    marked_files: FilePattern,
}

impl MarkedSpectraOracle {
    pub fn new(results_dir: impl Into<PathBuf>, expected: usize, marker: &str) -> Result<Self> {
        let marked = format!("*{}*.{}", globset::escape(marker), SPECTRA_EXTENSION);
        Ok(Self {
            results_dir: results_dir.into(),
            expected,
            data_files: FilePattern::extension(SPECTRA_EXTENSION)?,
            marked_files: FilePattern::new(&marked)?,
        })
    }

    pub fn calibration(results_dir: impl Into<PathBuf>, expected: usize) -> Result<Self> {
        Self::new(results_dir, expected, CALIBRATION_MARKER)
    }

    pub fn averaging(results_dir: impl Into<PathBuf>, expected: usize) -> Result<Self> {
        Self::new(results_dir, expected, AVERAGING_MARKER)
    }
}

impl CompletionOracle for MarkedSpectraOracle {
    fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    fn completed_result(&self, fs: &dyn FileSystem) -> Option<String> {
        let data = self.data_files.files_in(fs, &self.results_dir);
        let marked = data.iter().filter(|f| self.marked_files.matches(f)).count();
        trace!(
            dir = ?self.results_dir,
            data = data.len(),
            marked,
            expected = self.expected,
            "checked spectra outputs"
        );
        (data.len() == self.expected && marked == self.expected)
            .then(|| self.results_dir.display().to_string())
    }
}

/// GPTMD + search: one result file per input plus the summary files.
#[derive(Debug, Clone)]
pub struct SearchOracle {
    results_dir: PathBuf,
    inputs: usize,
    results: FilePattern,
}

impl SearchOracle {
    pub fn new(results_dir: impl Into<PathBuf>, inputs: usize) -> Result<Self> {
        Ok(Self {
            results_dir: results_dir.into(),
            inputs,
            results: FilePattern::extension(SEARCH_RESULT_EXTENSION)?,
        })
    }

    fn results_complete(&self, fs: &dyn FileSystem) -> bool {
        let found = self.results.files_in(fs, &self.results_dir).len();
        trace!(
            dir = ?self.results_dir,
            found,
            needed = self.inputs + SEARCH_AUX_RESULT_FILES,
            "checked search outputs"
        );
        found >= self.inputs + SEARCH_AUX_RESULT_FILES
    }
}

impl CompletionOracle for SearchOracle {
    fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    fn completed_result(&self, fs: &dyn FileSystem) -> Option<String> {
        self.results_complete(fs)
            .then(|| self.results_dir.display().to_string())
    }
}

/// A search that also builds a spectral library, written after the regular
/// search results.
#[derive(Debug, Clone)]
pub struct LibrarySearchOracle {
    search: SearchOracle,
    libraries: FilePattern,
}

impl LibrarySearchOracle {
    pub fn new(results_dir: impl Into<PathBuf>, inputs: usize) -> Result<Self> {
        Ok(Self {
            search: SearchOracle::new(results_dir, inputs)?,
            libraries: FilePattern::extension(LIBRARY_EXTENSION)?,
        })
    }
}

impl CompletionOracle for LibrarySearchOracle {
    fn results_dir(&self) -> &Path {
        self.search.results_dir()
    }

    fn completed_result(&self, fs: &dyn FileSystem) -> Option<String> {
        if !self.search.results_complete(fs) {
            return None;
        }
        self.libraries
            .files_in(fs, &self.search.results_dir)
            .into_iter()
            .min()
            .map(|lib| lib.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn stage(fs: &MockFileSystem, dir: &str, names: &[&str]) {
        for name in names {
            fs.add_file(format!("{dir}/{name}"), "");
        }
    }

    #[test]
    fn calibration_needs_every_marked_file() {
        let fs = MockFileSystem::new();
        let oracle = MarkedSpectraOracle::calibration("/out/calib/Task1", 3).unwrap();

        assert!(!oracle.has_started(&fs));
        stage(&fs, "/out/calib/Task1", &["a-calib.mzML", "b-calib.mzML"]);
        assert!(oracle.has_started(&fs));
        assert_eq!(oracle.completed_result(&fs), None);

        stage(&fs, "/out/calib/Task1", &["c-calib.mzML"]);
        assert_eq!(oracle.completed_result(&fs).as_deref(), Some("/out/calib/Task1"));
    }

    #[test]
    fn unmarked_spectra_keep_calibration_incomplete() {
        let fs = MockFileSystem::new();
        let oracle = MarkedSpectraOracle::calibration("/out", 2).unwrap();
        stage(&fs, "/out", &["a-calib.mzML", "b.mzML"]);
        assert_eq!(oracle.completed_result(&fs), None);
    }

    #[test]
    fn averaging_uses_its_own_marker() {
        let fs = MockFileSystem::new();
        let oracle = MarkedSpectraOracle::averaging("/avg", 2).unwrap();
        stage(&fs, "/avg", &["a-calib.mzML", "b-calib.mzML"]);
        assert_eq!(oracle.completed_result(&fs), None);

        fs.remove("/avg");
        stage(&fs, "/avg", &["a-calib-averaged.MZML", "b-calib-averaged.mzML"]);
        assert!(oracle.completed_result(&fs).is_some());
    }

    #[test]
    fn search_needs_inputs_plus_summary_files() {
        let fs = MockFileSystem::new();
        let oracle = SearchOracle::new("/search/Task2", 2).unwrap();
        stage(
            &fs,
            "/search/Task2",
            &["a_PSMs.psmtsv", "b_PSMs.psmtsv", "AllPSMs.psmtsv", "AllPeptides.psmtsv"],
        );
        assert_eq!(oracle.completed_result(&fs), None);

        stage(&fs, "/search/Task2", &["AllProteinGroups.psmtsv"]);
        assert_eq!(oracle.completed_result(&fs).as_deref(), Some("/search/Task2"));
    }

    #[test]
    fn library_search_waits_for_msp() {
        let fs = MockFileSystem::new();
        let oracle = LibrarySearchOracle::new("/lib", 1).unwrap();
        stage(
            &fs,
            "/lib",
            &["a.psmtsv", "AllPSMs.psmtsv", "AllPeptides.psmtsv", "AllProteinGroups.psmtsv"],
        );
        assert_eq!(oracle.completed_result(&fs), None);

        stage(&fs, "/lib", &["SpectralLibrary.msp"]);
        assert_eq!(oracle.completed_result(&fs).as_deref(), Some("/lib/SpectralLibrary.msp"));
    }

    #[test]
    fn sibling_results_in_a_shared_output_dir_do_not_count_as_started() {
        let fs = MockFileSystem::new();
        stage(&fs, "/out/Task1", &["a-calib.mzML"]);

        let search = SearchOracle::new("/out/Task2", 1).unwrap();
        assert!(!search.has_started(&fs));

        fs.add_dir("/out/Task2");
        assert!(search.has_started(&fs));
    }

    #[test]
    fn patterns_only_look_at_file_names() {
        let pattern = FilePattern::extension("psmtsv").unwrap();
        assert!(pattern.matches(Path::new("/a/b/AllPSMs.PSMTSV")));
        assert!(!pattern.matches(Path::new("/a/b.psmtsv/readme.txt")));
    }
}
