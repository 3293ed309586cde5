//! Project file locations as the remote interpreter expects them.

use std::path::{Path, PathBuf};

use crate::client::protocol::forward_slashes;

/// Paths derived from the workbench project file.
///
/// Everything is handed out with forward slashes so it can be embedded in
/// double-quoted script literals as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    fullname: PathBuf,
    results: Option<PathBuf>,
    pictures: Option<PathBuf>,
}

impl ProjectPaths {
    /// Paths for a project file, with results and pictures next to it.
    #[must_use]
    pub fn new(project_file: impl Into<PathBuf>) -> Self {
        Self {
            fullname: project_file.into(),
            results: None,
            pictures: None,
        }
    }

    /// Overrides the results directory.
    #[must_use]
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results = Some(dir.into());
        self
    }

    /// Overrides the pictures directory.
    #[must_use]
    pub fn with_pictures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pictures = Some(dir.into());
        self
    }

    /// Points at another project file, e.g. after "save as".
    pub fn set_project_file(&mut self, project_file: impl Into<PathBuf>) {
        self.fullname = project_file.into();
    }

    /// Full path of the project file.
    #[must_use]
    pub fn fullname(&self) -> String {
        slashed(&self.fullname)
    }

    /// Project name: the file name without extension.
    ///
    /// Both separators are honoured, so a Windows path names the same
    /// project on every host.
    #[must_use]
    pub fn name(&self) -> String {
        let full = self.fullname();
        let file = full.rsplit_once('/').map_or(full.as_str(), |(_, f)| f);
        match file.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => file.to_string(),
        }
    }

    /// Directory holding the project file.
    #[must_use]
    pub fn project_dir(&self) -> String {
        self.fullname()
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default()
    }

    /// Results directory, `<project dir>/<name>_Results` unless overridden.
    #[must_use]
    pub fn results_dir(&self) -> String {
        self.results
            .as_deref()
            .map_or_else(|| self.default_output_dir(), slashed)
    }

    /// Pictures directory, `<project dir>/<name>_Results` unless overridden.
    #[must_use]
    pub fn pictures_dir(&self) -> String {
        self.pictures
            .as_deref()
            .map_or_else(|| self.default_output_dir(), slashed)
    }

    /// Solver script next to the project, `<project dir>/<name>_<suffix>.py`.
    #[must_use]
    pub fn script_file(&self, suffix: &str) -> String {
        let file = format!("{}_{suffix}.py", self.name());
        let dir = self.project_dir();
        if dir.is_empty() {
            file
        } else {
            format!("{dir}/{file}")
        }
    }

    fn default_output_dir(&self) -> String {
        let dir = self.project_dir();
        if dir.is_empty() {
            format!("{}_Results", self.name())
        } else {
            format!("{dir}/{}_Results", self.name())
        }
    }
}

fn slashed(path: &Path) -> String {
    forward_slashes(&path.to_string_lossy())
}
