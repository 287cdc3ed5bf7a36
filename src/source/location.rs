use crate::image::FileRef;
use serde::Serialize;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// What a [`Location`] points at underneath its paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// An entry in one layer of an image.
    Image(FileRef),
    /// A file on the host filesystem (canonical path).
    Host(PathBuf),
}

/// One occurrence of a file within a source.
///
/// Two locations are equal when they share a [`Reference`]; the same virtual
/// path seen in two layers gives two distinct locations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Path of the file actually read (symlinks resolved).
    #[serde(rename = "path")]
    pub real_path: String,
    /// Path as requested or matched, before symlink resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_path: Option<String>,
    /// Layer that holds the file, for image sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_index: Option<usize>,
    #[serde(skip)]
    reference: Reference,
}

impl Location {
    pub fn new(real_path: impl Into<String>, virtual_path: impl Into<String>, reference: Reference) -> Self {
        let real_path = real_path.into();
        let virtual_path = virtual_path.into();
        Self {
            virtual_path: (virtual_path != real_path).then_some(virtual_path),
            real_path,
            layer_index: None,
            reference,
        }
    }

    pub(crate) fn in_layer(mut self, layer: usize) -> Self {
        self.layer_index = Some(layer);
        self
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// The path a user would recognize: the virtual path when one differs, else the real path.
    pub fn path(&self) -> &str {
        self.virtual_path.as_deref().unwrap_or(&self.real_path)
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.virtual_path, self.layer_index) {
            (Some(v), Some(layer)) => write!(f, "{} -> {} (layer {})", v, self.real_path, layer),
            (Some(v), None) => write!(f, "{} -> {}", v, self.real_path),
            (None, Some(layer)) => write!(f, "{} (layer {})", self.real_path, layer),
            (None, None) => write!(f, "{}", self.real_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_is_by_reference() {
        let a = Location::new("/a", "/a", Reference::Image(FileRef::new(1, "/a".to_string())));
        let b = Location::new("/a", "/a", Reference::Image(FileRef::new(2, "/a".to_string())));
        let a_via_link = Location::new("/a", "/link", Reference::Image(FileRef::new(1, "/a".to_string())));

        assert_ne!(a, b);
        assert_eq!(a, a_via_link);

        let set: HashSet<_> = [a, b, a_via_link].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_virtual_path_only_kept_when_different() {
        let plain = Location::new("/a", "/a", Reference::Host(PathBuf::from("/tmp/a")));
        assert!(plain.virtual_path.is_none());
        assert_eq!(plain.path(), "/a");

        let linked = Location::new("/usr/lib/x.so.1", "/usr/lib/x.so", Reference::Host(PathBuf::from("/tmp/x")));
        assert_eq!(linked.path(), "/usr/lib/x.so");
        assert_eq!(linked.to_string(), "/usr/lib/x.so -> /usr/lib/x.so.1");
    }
}
