use crate::error::{Error, Result};
use crate::glob::{glob_match, validate_pattern};
use crate::image::clean_path;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{ContentResolver, Location, PathResolver, Reference};

/// Resolves paths against a plain directory tree, rooted at `/`.
///
/// The tree is walked once, on the first glob query; later globs match
/// against that listing.
pub struct DirectoryResolver {
    root: PathBuf,
    listing: OnceLock<Vec<String>>,
}

impl DirectoryResolver {
    pub fn new(root: &Path) -> Result<Self> {
        let root = fs::canonicalize(root).map_err(|e| Error::Source {
            specifier: root.display().to_string(),
            reason: e.to_string(),
        })?;
        if !root.is_dir() {
            return Err(Error::Source {
                specifier: root.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }
        Ok(Self {
            root,
            listing: OnceLock::new(),
        })
    }

    fn host_path(&self, path: &str) -> PathBuf {
        self.root.join(clean_path(path).trim_start_matches('/'))
    }

    /// Maps a host path back into the source's `/`-rooted namespace, if it lies inside the root.
    fn source_path(&self, host: &Path) -> Option<String> {
        let relative = host.strip_prefix(&self.root).ok()?;
        Some(clean_path(&relative.to_string_lossy().replace('\\', "/")))
    }

    /// Every non-directory path under the root, in file-name order.
    fn listing(&self) -> &[String] {
        self.listing.get_or_init(|| {
            let mut paths = Vec::new();
            for entry in WalkDir::new(&self.root).follow_links(false).sort_by_file_name() {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable directory entry");
                        continue;
                    }
                };
                if entry.file_type().is_dir() {
                    continue;
                }
                if let Some(path) = self.source_path(entry.path()) {
                    paths.push(path);
                }
            }
            debug!(root = %self.root.display(), files = paths.len(), "walked directory");
            paths
        })
    }

    fn locate(&self, path: &str) -> Option<Location> {
        let host = self.host_path(path);
        if !host.is_file() {
            return None;
        }
        let canonical = fs::canonicalize(&host).ok()?;
        let real_path = self
            .source_path(&canonical)
            .unwrap_or_else(|| clean_path(path));
        Some(Location::new(real_path, clean_path(path), Reference::Host(canonical)))
    }
}

impl ContentResolver for DirectoryResolver {
    fn file_content_by_location(&self, location: &Location) -> Result<Box<dyn Read + Send>> {
        let Reference::Host(path) = location.reference() else {
            return Err(Error::NotFound(location.real_path.clone()));
        };
        match File::open(path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(location.real_path.clone()))
            }
            Err(e) => Err(Error::io(path, e)),
        }
    }
}

impl PathResolver for DirectoryResolver {
    fn has_path(&self, path: &str) -> bool {
        self.host_path(path).exists()
    }

    fn files_by_path(&self, paths: &[&str]) -> Result<Vec<Location>> {
        Ok(paths.iter().filter_map(|p| self.locate(p)).collect())
    }

    fn files_by_glob(&self, patterns: &[&str]) -> Result<Vec<Location>> {
        for pattern in patterns {
            validate_pattern(pattern)?;
        }

        let mut seen = HashSet::new();
        let mut locations = Vec::new();
        for pattern in patterns {
            for path in self.listing().iter().filter(|p| glob_match(pattern, p)) {
                if let Some(location) = self.locate(path) {
                    if seen.insert(location.reference().clone()) {
                        locations.push(location);
                    }
                }
            }
        }

        debug!(root = %self.root.display(), ?patterns, matches = locations.len(), "directory glob");
        Ok(locations)
    }

    fn relative_file_by_path(&self, _anchor: &Location, path: &str) -> Option<Location> {
        self.locate(path)
    }
}
