use crate::error::{FitBatchError, Result};
use crate::scanner::file_filter::FileFilter;
use crate::scanner::{ActivitySource, SourceOrigin};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use zip::ZipArchive;

#[derive(Debug, Default)]
pub struct ArchiveContents {
    pub sources: Vec<ActivitySource>,
    pub errors: Vec<String>,
}

pub struct ArchiveExtractor<'a> {
    filter: &'a FileFilter,
}

impl<'a> ArchiveExtractor<'a> {
    pub fn new(filter: &'a FileFilter) -> Self {
        Self { filter }
    }

    /// Extracts every wanted entry of `archive_path` below `dest_dir`.
    ///
    /// Only an archive that cannot be opened at all is an error; a failing
    /// entry is recorded in `ArchiveContents::errors` and the rest are still
    /// extracted.
    pub fn extract(
        &self,
        archive_path: &Path,
        display_prefix: &str,
        dest_dir: &Path,
    ) -> Result<ArchiveContents> {
        info!("Unzipping file: {}", archive_path.display());

        let file = File::open(archive_path)?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| FitBatchError::Archive {
            archive: archive_path.display().to_string(),
            message: e.to_string(),
        })?;

        fs::create_dir_all(dest_dir)?;

        let mut contents = ArchiveContents::default();

        for index in 0..archive.len() {
            let mut entry = match archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    let message = format!(
                        "Error reading entry #{} of {}: {}",
                        index,
                        archive_path.display(),
                        e
                    );
                    warn!("{}", message);
                    contents.errors.push(message);
                    continue;
                }
            };

            if entry.is_dir() || !self.filter.is_archive_entry_wanted(entry.name()) {
                debug!("Skipping archive entry {}", entry.name());
                continue;
            }

            let entry_name = entry.name().replace('\\', "/");

            // Entries that would escape the workspace are refused
            let Some(relative) = entry.enclosed_name() else {
                let message = format!(
                    "Unsafe entry path {} in {}",
                    entry_name,
                    archive_path.display()
                );
                warn!("{}", message);
                contents.errors.push(message);
                continue;
            };

            let dest_path = dest_dir.join(relative);
            let written = dest_path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| File::create(&dest_path))
                .and_then(|mut out| io::copy(&mut entry, &mut out));

            match written {
                Ok(bytes) => {
                    debug!("Extracted {} ({} bytes)", entry_name, bytes);
                    contents.sources.push(ActivitySource {
                        path: dest_path,
                        display_name: format!("{}/{}", display_prefix, entry_name),
                        origin: SourceOrigin::Archive {
                            archive: archive_path.to_path_buf(),
                            entry: entry_name,
                        },
                    });
                }
                Err(e) => {
                    let message = format!(
                        "Error extracting {} from {}: {}",
                        entry_name,
                        archive_path.display(),
                        e
                    );
                    warn!("{}", message);
                    contents.errors.push(message);
                    let _ = fs::remove_file(&dest_path);
                }
            }
        }

        Ok(contents)
    }
}
