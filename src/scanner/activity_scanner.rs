use crate::config::ScanConfig;
use crate::error::{FitBatchError, Result};
use crate::scanner::archive::ArchiveExtractor;
use crate::scanner::file_filter::FileFilter;
use log::{debug, info, warn};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    File,
    Archive { archive: PathBuf, entry: String },
}

/// A FIT file ready to be decoded. Archive entries point at their extracted
/// copy inside the scan workspace.
#[derive(Debug, Clone)]
pub struct ActivitySource {
    pub path: PathBuf,
    pub display_name: String,
    pub origin: SourceOrigin,
}

impl ActivitySource {
    pub fn is_from_archive(&self) -> bool {
        matches!(self.origin, SourceOrigin::Archive { .. })
    }
}

pub struct ScanResult {
    pub sources: Vec<ActivitySource>,
    pub errors: Vec<String>,
    pub archives_scanned: usize,
    // Keeps extracted archive entries on disk until the run is over
    workspace: TempDir,
}

impl ScanResult {
    pub fn direct_files(&self) -> usize {
        self.sources.iter().filter(|s| !s.is_from_archive()).count()
    }

    pub fn display_summary(&self) -> String {
        format!(
            "Scan Results:\n  Activity files: {}\n  From archives: {}\n  Archives opened: {}\n  Scan errors: {}\n",
            self.sources.len(),
            self.sources.len() - self.direct_files(),
            self.archives_scanned,
            self.errors.len()
        )
    }
}

pub struct ActivityScanner {
    filter: FileFilter,
    max_depth: usize,
}

impl ActivityScanner {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            filter: FileFilter::new(config),
            max_depth: config.max_depth,
        }
    }

    /// Checks that `root` is a directory this process can list.
    pub fn validate_root<P: AsRef<Path>>(root: P) -> Result<()> {
        let root_path = root.as_ref();

        if !root_path.is_dir() {
            return Err(FitBatchError::InputNotReadable {
                path: format!("{} is not a directory", root_path.display()),
            });
        }

        std::fs::read_dir(root_path).map_err(|e| FitBatchError::InputNotReadable {
            path: format!("{}: {}", root_path.display(), e),
        })?;

        Ok(())
    }

    pub fn scan_directory<P: AsRef<Path>>(&self, root: P) -> Result<ScanResult> {
        let root_path = root.as_ref();
        Self::validate_root(root_path)?;

        let workspace = tempfile::Builder::new().prefix("fitbatch-").tempdir()?;
        let archive_extractor = ArchiveExtractor::new(&self.filter);

        let mut sources = Vec::new();
        let mut scan_errors = Vec::new();
        let mut archives_scanned = 0usize;

        let walker = WalkDir::new(root_path)
            .max_depth(self.max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| self.should_traverse(e, root_path));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let message = if err
                        .io_error()
                        .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied)
                    {
                        format!("Permission denied: {}", err)
                    } else {
                        format!("Scan error: {}", err)
                    };
                    warn!("{}", message);
                    scan_errors.push(message);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let display_name = match relative_display_name(path, root_path) {
                Ok(name) => name,
                Err(err) => {
                    scan_errors.push(err.to_string());
                    continue;
                }
            };

            // Exclude patterns see the path below the root, never the root itself
            let relative_path = Path::new(&display_name);

            if self.filter.is_archive(relative_path) {
                let dest_dir = workspace.path().join(format!("{:04}", archives_scanned));
                archives_scanned += 1;

                match archive_extractor.extract(path, &display_name, &dest_dir) {
                    Ok(contents) => {
                        debug!(
                            "{} activity files extracted from {}",
                            contents.sources.len(),
                            display_name
                        );
                        sources.extend(contents.sources);
                        scan_errors.extend(contents.errors);
                    }
                    Err(err) => {
                        let message = format!("Error unzipping {}: {}", path.display(), err);
                        warn!("{}", message);
                        scan_errors.push(message);
                    }
                }
            } else if self.filter.is_activity_file(relative_path) {
                sources.push(ActivitySource {
                    path: path.to_path_buf(),
                    display_name,
                    origin: SourceOrigin::File,
                });
            }
        }

        sources.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        info!(
            "Found {} activity files ({} archives) in '{}'",
            sources.len(),
            archives_scanned,
            root_path.display()
        );

        Ok(ScanResult {
            sources,
            errors: scan_errors,
            archives_scanned,
            workspace,
        })
    }

    fn should_traverse(&self, entry: &DirEntry, root: &Path) -> bool {
        if entry.depth() == 0 || entry.file_type().is_file() {
            return true;
        }

        if entry.file_type().is_dir() {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            return self.filter.should_traverse_directory(relative);
        }

        true
    }
}

fn relative_display_name(file_path: &Path, root_path: &Path) -> Result<String> {
    let relative = file_path
        .strip_prefix(root_path)
        .map_err(|_| FitBatchError::InvalidPath {
            path: format!(
                "Cannot calculate relative path for {} from root {}",
                file_path.display(),
                root_path.display()
            ),
        })?;

    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(FitBatchError::InvalidPath {
            path: format!(
                "Path contains parent directory references: {}",
                relative.display()
            ),
        });
    }

    Ok(relative.to_string_lossy().replace('\\', "/"))
}
