//! Scene catalog
//!
//! Resolves asset directories into the ordered list of scenes to run.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::assignment::{AssetDirectory, Assignment};
use crate::error::GradeError;

/// One scene descriptor with its grading attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub path: PathBuf,
    pub graded: bool,
    pub hidden: bool,
    pub extra_credit: bool,
}

impl TestCase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            graded: true,
            hidden: false,
            extra_credit: false,
        }
    }

    pub fn extra_credit(mut self, value: bool) -> Self {
        self.extra_credit = value;
        self
    }

    pub fn graded(mut self, value: bool) -> Self {
        self.graded = value;
        self
    }

    pub fn hidden(mut self, value: bool) -> Self {
        self.hidden = value;
        self
    }

    /// Last three path components, e.g. `t1m1/SpringTests/spring.xml`
    pub fn short_name(&self) -> String {
        let parts: Vec<String> = self
            .path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let start = parts.len().saturating_sub(3);
        parts[start..].join("/")
    }
}

/// Name-based selection of scenes
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    /// Directory names not descended into, and `<dir>/<file>` names skipped
    pub exclude: BTreeSet<String>,
    /// When set, only scenes whose parent directory name or `<dir>/<file>`
    /// name is listed are kept
    pub include: Option<BTreeSet<String>>,
}

impl CatalogFilter {
    pub fn exclude(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn include(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include
            .get_or_insert_with(BTreeSet::new)
            .extend(names.into_iter().map(Into::into));
        self
    }

    fn keeps_file(&self, parent_name: &str, full_name: &str) -> bool {
        if self.exclude.contains(full_name) {
            return false;
        }
        match &self.include {
            Some(include) => include.contains(parent_name) || include.contains(full_name),
            None => true,
        }
    }
}

/// Scene catalog
#[derive(Debug, Clone)]
pub struct SceneCatalog {
    extension: String,
    filter: CatalogFilter,
}

impl SceneCatalog {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_string(),
            filter: CatalogFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: CatalogFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Every scene under an asset directory, inheriting its flags
    pub fn scan_directory(&self, dir: &AssetDirectory) -> Result<Vec<TestCase>, GradeError> {
        let root = &dir.path;
        if !root.is_dir() {
            return Err(GradeError::CatalogNotFound { root: root.clone() });
        }

        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !self.is_excluded_dir(e));

        let mut tests = Vec::new();
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() || !self.has_scene_extension(entry.path()) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let parent_name = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let full_name = format!("{}/{}", parent_name, file_name);

            if self.filter.keeps_file(&parent_name, &full_name) {
                tests.push(TestCase {
                    path: entry.into_path(),
                    graded: dir.graded,
                    hidden: dir.hidden,
                    extra_credit: dir.extra_credit,
                });
            }
        }

        tests.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Found {} scene(s) under {}", tests.len(), dir);
        Ok(tests)
    }

    /// Scenes of every asset directory of an assignment, in path order
    pub fn for_assignment(&self, assignment: &Assignment) -> Result<Vec<TestCase>, GradeError> {
        let mut tests = Vec::new();
        for dir in &assignment.directories {
            tests.extend(self.scan_directory(dir)?);
        }
        tests.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(tests)
    }

    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && self
                .filter
                .exclude
                .contains(entry.file_name().to_string_lossy().as_ref())
    }

    fn has_scene_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy() == self.extension.as_str())
            .unwrap_or(false)
    }
}
