use crate::error::Result;
use crate::glob::{glob_match, validate_pattern};
use crate::image::{clean_path, path_exists, resolve_real_path, EntryKind, Image, Layer};
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

use super::squash::{image_content, locate, relative_to_anchor};
use super::{ContentResolver, Location, PathResolver};

/// Resolves paths against every layer of an image independently.
///
/// A path present in several layers yields one location per layer, oldest
/// first, including occurrences a newer layer shadows in the squashed view.
pub struct AllLayersResolver {
    image: Arc<Image>,
}

impl AllLayersResolver {
    pub fn new(image: Arc<Image>) -> Self {
        Self { image }
    }

    /// The location of `path` as written by `layer`, if that layer holds it.
    fn locate_in_layer(&self, layer: &Layer, path: &str) -> Option<Location> {
        let squash = self.image.squash_at(layer.index)?;
        match layer.tree.get(path).map(|e| &e.kind) {
            Some(EntryKind::Dir) => None,
            // links are followed through the view of the layer that wrote them
            Some(EntryKind::File(_) | EntryKind::Symlink(_)) => locate(&self.image, squash, path),
            // an ancestor link may redirect into a file this layer wrote
            None => {
                let real_path = resolve_real_path(squash, path)?;
                if real_path == path || !layer.tree.get(&real_path)?.is_file() {
                    return None;
                }
                locate(&self.image, squash, path)
            }
        }
    }
}

impl ContentResolver for AllLayersResolver {
    fn file_content_by_location(&self, location: &Location) -> Result<Box<dyn Read + Send>> {
        image_content(&self.image, location)
    }
}

impl PathResolver for AllLayersResolver {
    fn has_path(&self, path: &str) -> bool {
        self.image
            .layers()
            .iter()
            .filter_map(|l| self.image.squash_at(l.index))
            .any(|squash| path_exists(squash, path))
    }

    fn files_by_path(&self, paths: &[&str]) -> Result<Vec<Location>> {
        let mut locations = Vec::new();
        for path in paths {
            let path = clean_path(path);
            for layer in self.image.layers() {
                if let Some(location) = self.locate_in_layer(layer, &path) {
                    locations.push(location);
                }
            }
        }
        Ok(locations)
    }

    fn files_by_glob(&self, patterns: &[&str]) -> Result<Vec<Location>> {
        for pattern in patterns {
            validate_pattern(pattern)?;
        }

        let mut locations = Vec::new();
        for pattern in patterns {
            for layer in self.image.layers() {
                for path in layer.tree.keys().filter(|p| glob_match(pattern, p)) {
                    if let Some(location) = self.locate_in_layer(layer, path) {
                        locations.push(location);
                    }
                }
            }
        }

        debug!(?patterns, matches = locations.len(), "all-layers glob");
        Ok(locations)
    }

    fn relative_file_by_path(&self, anchor: &Location, path: &str) -> Option<Location> {
        relative_to_anchor(&self.image, anchor, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Arc<Image> {
        Image::builder()
            .layer(|l| l.file("/a", "one").file("/etc/app.conf", "v1"))
            .layer(|l| l.file("/a", "two"))
            .layer(|l| l.file("/a", "three").file("/b", "late"))
            .build_shared()
    }

    #[test]
    fn test_files_by_path_returns_one_location_per_layer() {
        let resolver = AllLayersResolver::new(image());

        let locations = resolver.files_by_path(&["/a"]).unwrap();
        assert_eq!(locations.len(), 3);

        let layers: Vec<_> = locations.iter().map(|l| l.layer_index).collect();
        assert_eq!(layers, vec![Some(0), Some(1), Some(2)]);

        // shadowed occurrences stay readable
        let mut body = String::new();
        resolver
            .file_content_by_location(&locations[0])
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "one");

        assert_ne!(locations[0], locations[1]);
    }

    #[test]
    fn test_files_by_path_single_layer() {
        let resolver = AllLayersResolver::new(image());
        assert_eq!(resolver.files_by_path(&["/etc/app.conf"]).unwrap().len(), 1);
        assert!(resolver.files_by_path(&["/nope"]).unwrap().is_empty());
    }

    #[test]
    fn test_files_by_glob_keeps_duplicates() {
        let resolver = AllLayersResolver::new(image());
        let locations = resolver.files_by_glob(&["/?"]).unwrap();
        let paths: Vec<_> = locations.iter().map(|l| (l.real_path.as_str(), l.layer_index)).collect();
        assert_eq!(
            paths,
            vec![("/a", Some(0)), ("/a", Some(1)), ("/a", Some(2)), ("/b", Some(2))]
        );
    }

    #[test]
    fn test_relative_file_ignores_newer_layers() {
        let resolver = AllLayersResolver::new(image());
        let anchor = resolver.files_by_path(&["/etc/app.conf"]).unwrap().remove(0);

        assert!(resolver.relative_file_by_path(&anchor, "/b").is_none());

        let a = resolver.relative_file_by_path(&anchor, "/a").unwrap();
        assert_eq!(a.layer_index, Some(0));
    }

    #[test]
    fn test_ancestor_link_reaches_every_layer() {
        let image = Image::builder()
            .layer(|l| {
                l.symlink("/lib", "/usr/lib")
                    .file("/usr/lib/python3/six.egg-info/PKG-INFO", "six")
            })
            .layer(|l| l.file("/usr/lib/python3/six.egg-info/PKG-INFO", "six-new"))
            .build_shared();
        let resolver = AllLayersResolver::new(image);

        let locations = resolver
            .files_by_path(&["/lib/python3/six.egg-info/PKG-INFO"])
            .unwrap();
        let found: Vec<_> = locations
            .iter()
            .map(|l| (l.real_path.as_str(), l.layer_index))
            .collect();
        assert_eq!(
            found,
            vec![
                ("/usr/lib/python3/six.egg-info/PKG-INFO", Some(0)),
                ("/usr/lib/python3/six.egg-info/PKG-INFO", Some(1)),
            ]
        );
        assert_eq!(
            locations[1].virtual_path.as_deref(),
            Some("/lib/python3/six.egg-info/PKG-INFO")
        );
        assert!(resolver.has_path("/lib/python3"));
    }

    #[test]
    fn test_has_path_any_layer() {
        let resolver = AllLayersResolver::new(image());
        assert!(resolver.has_path("/b"));
        assert!(resolver.has_path("a"));
        assert!(!resolver.has_path("/c"));
    }
}
