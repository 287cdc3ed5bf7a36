use crate::error::Result;
use std::io::Read;

use super::Location;

/// Knows how to get file content for a [`Location`].
pub trait ContentResolver {
    /// Opens the content behind a location.
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) when the location's
    /// reference no longer resolves; this means the source changed under the
    /// resolver and must not be skipped silently.
    fn file_content_by_location(&self, location: &Location) -> Result<Box<dyn Read + Send>>;
}

/// Knows how to turn paths and globs into [`Location`]s.
pub trait PathResolver {
    /// Whether the path exists in the source. Never errors.
    fn has_path(&self, path: &str) -> bool;

    /// Fetches the locations of the given paths (an image may have several per path).
    fn files_by_path(&self, paths: &[&str]) -> Result<Vec<Location>>;

    /// Fetches the locations of every file matched by the given globs.
    fn files_by_glob(&self, patterns: &[&str]) -> Result<Vec<Location>>;

    /// Fetches a file as seen from the layer that produced `anchor`, ignoring
    /// anything introduced by later layers.
    fn relative_file_by_path(&self, anchor: &Location, path: &str) -> Option<Location>;
}

/// A read-only query surface over one source, shareable between catalogers.
pub trait Resolver: ContentResolver + PathResolver + Send + Sync {}

impl<T: ContentResolver + PathResolver + Send + Sync> Resolver for T {}
