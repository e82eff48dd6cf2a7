use crate::config::ScanConfig;
use regex::Regex;
use std::path::Path;

pub struct FileFilter {
    activity_extensions: Vec<String>,
    archive_extensions: Vec<String>,
    exclude_dirs: Vec<String>,
    exclude_patterns: Vec<Regex>,
    skip_hidden: bool,
}

impl FileFilter {
    pub fn new(config: &ScanConfig) -> Self {
        let exclude_patterns = config
            .exclude_patterns
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect();

        Self {
            activity_extensions: lowercase_all(&config.extensions),
            archive_extensions: lowercase_all(&config.archive_extensions),
            exclude_dirs: config.exclude_dirs.clone(),
            exclude_patterns,
            skip_hidden: config.skip_hidden,
        }
    }

    pub fn is_activity_file(&self, path: &Path) -> bool {
        self.is_candidate(path, &self.activity_extensions)
    }

    pub fn is_archive(&self, path: &Path) -> bool {
        self.is_candidate(path, &self.archive_extensions)
    }

    fn is_candidate(&self, path: &Path, extensions: &[String]) -> bool {
        if self.skip_hidden && is_hidden_name(path) {
            return false;
        }

        if self.matches_any_pattern(&path.to_string_lossy().replace('\\', "/")) {
            return false;
        }

        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| extensions.contains(&ext.to_lowercase()))
    }

    /// Decide whether a zip entry name is worth extracting. Resource forks and
    /// `__MACOSX` metadata written by macOS archivers are always skipped.
    pub fn is_archive_entry_wanted(&self, entry_name: &str) -> bool {
        let normalized = entry_name.replace('\\', "/");

        if normalized.ends_with('/') {
            return false;
        }

        if normalized
            .split('/')
            .any(|segment| self.is_excluded_dir_name(segment))
        {
            return false;
        }

        let file_name = normalized.rsplit('/').next().unwrap_or("");
        if file_name.starts_with("._") {
            return false;
        }

        self.is_activity_file(Path::new(file_name))
    }

    /// `path` is relative to the scan root, so patterns never see the root's own location.
    pub fn should_traverse_directory(&self, path: &Path) -> bool {
        if let Some(dir_name) = path.file_name().and_then(|s| s.to_str()) {
            if self.is_excluded_dir_name(dir_name) {
                return false;
            }

            if self.skip_hidden && dir_name.starts_with('.') && dir_name != "." && dir_name != ".." {
                return false;
            }

            let path_str = path.to_string_lossy().replace('\\', "/");
            if self.matches_any_pattern(&path_str) {
                return false;
            }
        }

        true
    }

    fn is_excluded_dir_name(&self, name: &str) -> bool {
        let name_lower = name.to_lowercase();
        self.exclude_dirs
            .iter()
            .any(|exclude| name_lower == exclude.to_lowercase() || name_lower.starts_with(&exclude.to_lowercase()))
    }

    pub fn matches_any_pattern(&self, text: &str) -> bool {
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.is_match(text))
    }

    pub fn activity_extensions(&self) -> &[String] {
        &self.activity_extensions
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

fn is_hidden_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().trim_start_matches('.').to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}
