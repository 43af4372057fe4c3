use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::config::AnalysisConfig;
use crate::constants::analysis::MAX_FILE_SIZE;
use crate::types::{Result, SyncError};

/// Walks a source tree and yields the files eligible for analysis
pub struct FileScanner {
    root: PathBuf,
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
    max_file_size: u64,
    respect_gitignore: bool,
}

impl FileScanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            include: Vec::new(),
            exclude: Vec::new(),
            max_file_size: MAX_FILE_SIZE as u64,
            respect_gitignore: true,
        }
    }

    /// Scanner configured from the `[analysis]` section
    pub fn from_config<P: AsRef<Path>>(root: P, config: &AnalysisConfig) -> Result<Self> {
        Ok(Self::new(root)
            .with_include(&config.include)?
            .with_exclude(&config.exclude)?
            .with_max_file_size(config.max_file_size as u64)
            .respect_gitignore(config.respect_gitignore))
    }

    pub fn with_include(mut self, patterns: &[String]) -> Result<Self> {
        self.include = compile(patterns)?;
        Ok(self)
    }

    pub fn with_exclude(mut self, patterns: &[String]) -> Result<Self> {
        self.exclude = compile(patterns)?;
        Ok(self)
    }

    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn respect_gitignore(mut self, enabled: bool) -> Self {
        self.respect_gitignore = enabled;
        self
    }

    /// Eligible files, sorted by relative path
    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        if !self.root.is_dir() {
            return Err(SyncError::Config(format!(
                "Source root is not a directory: {}",
                self.root.display()
            )));
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .require_git(false)
            .follow_links(false) // Security: prevent symlink traversal attacks
            .build();

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");

            if !self.is_included(&relative) || self.is_excluded(&relative) {
                continue;
            }

            if let Ok(metadata) = path.metadata() {
                if metadata.len() > self.max_file_size {
                    tracing::debug!(path = %relative, size = metadata.len(), "Skipping large file");
                    continue;
                }

                files.push(ScannedFile {
                    path: path.to_path_buf(),
                    relative,
                    size: metadata.len(),
                });
            }
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(files)
    }

    fn is_included(&self, relative: &str) -> bool {
        self.include.is_empty() || self.include.iter().any(|p| p.matches(relative))
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(relative))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p)
                .map_err(|e| SyncError::Config(format!("Invalid glob pattern '{}': {}", p, e)))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Path relative to the scan root with `/` separators
    pub relative: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/shop")).unwrap();
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub mod shop;").unwrap();
        fs::write(dir.path().join("src/shop/orders.rs"), "pub struct Order;").unwrap();
        fs::write(dir.path().join("target/debug/out.rs"), "").unwrap();
        fs::write(dir.path().join("README.md"), "# readme").unwrap();
        dir
    }

    #[test]
    fn test_scan_applies_include_and_exclude() {
        let dir = tree();
        let files = FileScanner::new(dir.path())
            .with_include(&["**/*.rs".to_string()])
            .unwrap()
            .with_exclude(&["target/**".to_string()])
            .unwrap()
            .scan()
            .unwrap();

        let paths: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(paths, vec!["src/lib.rs", "src/shop/orders.rs"]);
    }

    #[test]
    fn test_scan_skips_large_files() {
        let dir = tree();
        let files = FileScanner::new(dir.path())
            .with_max_file_size(10)
            .scan()
            .unwrap();
        assert!(files.iter().all(|f| f.size <= 10));
        assert!(files.iter().any(|f| f.relative == "README.md"));
    }

    #[test]
    fn test_scan_honors_gitignore() {
        let dir = tree();
        fs::write(dir.path().join(".gitignore"), "README.md\n").unwrap();

        let files = FileScanner::new(dir.path()).scan().unwrap();
        assert!(!files.iter().any(|f| f.relative == "README.md"));

        let files = FileScanner::new(dir.path())
            .respect_gitignore(false)
            .scan()
            .unwrap();
        assert!(files.iter().any(|f| f.relative == "README.md"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = FileScanner::new(".").with_exclude(&["[".to_string()]);
        assert!(matches!(err, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_missing_root() {
        assert!(FileScanner::new("/nonexistent/wikisync-root").scan().is_err());
    }
}
